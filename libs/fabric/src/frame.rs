use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use switchboard_core::{ErrorType, ResponseCode, TransportHeaders};

/// Identity exchanged during the init handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitParams {
    pub version: u16,
    pub host_port: String,
    pub process_name: String,
}

/// Outbound call, correlated by `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    pub id: u32,
    pub ttl_ms: u32,
    pub service: String,
    pub endpoint: String,
    pub headers: HashMap<String, String>,
    pub transport_headers: TransportHeaders,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResponse {
    pub id: u32,
    pub code: ResponseCode,
    pub headers: HashMap<String, String>,
    pub transport_headers: TransportHeaders,
    pub body: Vec<u8>,
}

/// Protocol-level failure for the call `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub id: u32,
    pub kind: ErrorType,
    pub message: String,
}

/// Every message exchanged on a connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    InitRequest(InitParams),
    InitResponse(InitParams),
    CallRequest(CallRequest),
    CallResponse(CallResponse),
    Error(ErrorFrame),
}

impl Frame {
    /// Correlation id, for frames that belong to a call
    pub fn id(&self) -> Option<u32> {
        match self {
            Frame::CallRequest(req) => Some(req.id),
            Frame::CallResponse(res) => Some(res.id),
            Frame::Error(err) => Some(err.id),
            Frame::InitRequest(_) | Frame::InitResponse(_) => None,
        }
    }
}
