use crate::decode::Decoding;
use axum::http::Method;
use chrono::{DateTime, Utc};

/// Push endpoints a Wibeee meter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Receiver,
    ReceiverAvg,
    ReceiverLeap,
    ReceiverAvgPost,
    ReceiverJson,
}

impl Route {
    pub const ALL: [Route; 5] = [
        Route::Receiver,
        Route::ReceiverAvg,
        Route::ReceiverLeap,
        Route::ReceiverAvgPost,
        Route::ReceiverJson,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Route::Receiver => "/Wibeee/receiver",
            Route::ReceiverAvg => "/Wibeee/receiverAvg",
            Route::ReceiverLeap => "/Wibeee/receiverLeap",
            Route::ReceiverAvgPost => "/Wibeee/receiverAvgPost",
            Route::ReceiverJson => "/Wibeee/receiverJSON",
        }
    }

    pub fn method(self) -> Method {
        match self.decoding() {
            Decoding::Query => Method::GET,
            Decoding::JsonBody => Method::POST,
        }
    }

    pub fn decoding(self) -> Decoding {
        match self {
            Route::Receiver | Route::ReceiverAvg | Route::ReceiverLeap => Decoding::Query,
            Route::ReceiverAvgPost | Route::ReceiverJson => Decoding::JsonBody,
        }
    }

    /// Body the meter expects when the proxy answers on the cloud's behalf.
    /// `now` must be the time the response is built.
    pub fn ack_body(self, now: DateTime<Utc>) -> String {
        match self {
            Route::Receiver => String::new(),
            Route::ReceiverAvg | Route::ReceiverAvgPost => "<<<WBAVG ".to_string(),
            Route::ReceiverLeap => "<<<WGRADIENT=007 ".to_string(),
            Route::ReceiverJson => format!("<<<WBJSON {}", now.timestamp()),
        }
    }
}
