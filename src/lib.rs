pub mod config;
pub mod decode;
pub mod device;
pub mod error;
pub mod forward;
pub mod listener;
pub mod net;
pub mod registry;
pub mod relay;
pub mod route;
pub mod sensor;
pub mod server;
pub mod throttle;

// Re-export commonly used items
pub use config::Config;
pub use decode::{DecodedRequest, Readings};
pub use device::{MacAddr, Upstream};
pub use error::{AppError, Result};
pub use listener::{ChannelListener, PushData, PushListener};
pub use registry::{DeviceConfig, DeviceRegistry};
pub use relay::{create_router, RelayState};
pub use sensor::{SensorHub, SensorUpdate};
pub use server::NestProxy;
pub use throttle::Throttle;
