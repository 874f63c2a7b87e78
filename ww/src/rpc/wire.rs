//! Frames exchanged between a client connection and a server session.
//!
//! Every request carries an id chosen by the client; the response (or a
//! `Cancel` sent by the client) refers to the same id.

use serde::{Deserialize, Serialize};

use super::RpcError;
use crate::datum::Datum;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub id: u64,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Body {
    Request(Request),
    /// The client released the call before it resolved
    Cancel,
    Response(Response),
}

/// Paths travel in their textual form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    Ls { path: String },
    Load { path: String },
    Store { path: String, value: Datum },
    Spawn { path: String, args: Vec<Datum> },
}

impl Request {
    pub fn path(&self) -> &str {
        match self {
            Request::Ls { path }
            | Request::Load { path }
            | Request::Store { path, .. }
            | Request::Spawn { path, .. } => path,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Request::Ls { .. } => "ls",
            Request::Load { .. } => "load",
            Request::Store { .. } => "store",
            Request::Spawn { .. } => "spawn",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Children(Vec<String>),
    Value(Datum),
    Stored,
    Spawned(String),
    Error(String),
}

pub fn encode(frame: &Frame) -> Result<Vec<u8>, RpcError> {
    bincode::serialize(frame).map_err(|e| RpcError::Codec(e.to_string()))
}

pub fn decode(bytes: &[u8]) -> Result<Frame, RpcError> {
    bincode::deserialize(bytes).map_err(|e| RpcError::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_frames_are_rejected() {
        let bytes = encode(&Frame {
            id: 9,
            body: Body::Request(Request::Store {
                path: "/a".to_string(),
                value: Datum::Vector(vec![Datum::Integer(1), Datum::Path("/b".to_string())]),
            }),
        })
        .unwrap();
        assert!(matches!(decode(&bytes[..bytes.len() - 1]), Err(RpcError::Codec(_))));
        assert_eq!(decode(&bytes).unwrap().id, 9);
    }
}
