use crate::error::{AppError, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;

/// Target used to find the interface that faces the internet. Nothing is sent to it.
pub const PUBLIC_TARGET_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8));

/// Local address the OS would use to reach `target`.
pub async fn source_ip(target: IpAddr) -> Result<IpAddr> {
    let bind: SocketAddr = match target {
        IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(bind).await?;
    socket.connect((target, 80)).await?;
    Ok(socket.local_addr()?.ip())
}

/// Loopback, RFC 1918, link-local, or IPv6 unique-local.
pub fn is_local_address(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}

pub fn ensure_local(ip: IpAddr) -> Result<IpAddr> {
    if is_local_address(ip) {
        Ok(ip)
    } else {
        Err(AppError::BindAddress(ip))
    }
}
