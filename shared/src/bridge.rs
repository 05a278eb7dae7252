//! JSON boundary for hosts that are not written in Rust.
//!
//! A thin layer over crux's `BridgeWithSerializer`. The host sends a JSON
//! `Event` and gets back the effect requests it must run, each tagged with a
//! `uuid`. Outputs go back through `handle_response` with that `uuid`.
//! Payloads are checked here first so that a malformed message surfaces as
//! a `BridgeError` instead of a panic inside the core.

use std::collections::HashMap;

use crux_core::bridge::{BridgeWithSerializer, Request};
use crux_core::Core;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::capabilities::{Capabilities, Effect, GatewayResult};
use crate::{App, Event};

pub const MAX_EVENT_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("payload too large: {size} bytes, max {max}")]
    TooLarge { size: usize, max: usize },

    #[error("failed to decode payload: {0}")]
    Decode(String),

    #[error("failed to encode output: {0}")]
    Encode(String),

    #[error("no pending request with that uuid")]
    UnknownRequest,
}

/// Effects the host answers with a value. Render, analytics and page
/// effects are notifications and are never answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Awaiting {
    Http,
    Timer,
    PaymentPopup,
}

impl Awaiting {
    fn from_effect(effect: &Value) -> Option<Self> {
        let tag = effect.as_object()?.keys().next()?;
        match tag.as_str() {
            "Http" => Some(Awaiting::Http),
            "Timer" => Some(Awaiting::Timer),
            "PaymentPopup" => Some(Awaiting::PaymentPopup),
            _ => None,
        }
    }

    fn check(self, output: &Value) -> Result<(), serde_json::Error> {
        match self {
            Awaiting::Http => crux_http::protocol::HttpResult::deserialize(output).map(drop),
            Awaiting::Timer => <()>::deserialize(output),
            Awaiting::PaymentPopup => GatewayResult::deserialize(output).map(drop),
        }
    }
}

pub struct Bridge {
    inner: BridgeWithSerializer<Effect, App>,
    awaiting: HashMap<Vec<u8>, Awaiting>,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Bridge {
    pub fn new() -> Self {
        Self {
            inner: BridgeWithSerializer::new(Core::new::<Capabilities>()),
            awaiting: HashMap::new(),
        }
    }

    pub fn process_event(&mut self, bytes: &[u8]) -> Result<Vec<u8>, BridgeError> {
        let value = parse(bytes)?;
        Event::deserialize(&value).map_err(|e| BridgeError::Decode(e.to_string()))?;

        let mut out = Vec::new();
        self.inner
            .process_event(value, &mut serde_json::Serializer::new(&mut out));
        self.track(&out)?;
        Ok(out)
    }

    pub fn handle_response(&mut self, uuid: &[u8], bytes: &[u8]) -> Result<Vec<u8>, BridgeError> {
        let value = parse(bytes)?;
        let awaiting = self
            .awaiting
            .get(uuid)
            .copied()
            .ok_or(BridgeError::UnknownRequest)?;
        awaiting
            .check(&value)
            .map_err(|e| BridgeError::Decode(e.to_string()))?;
        self.awaiting.remove(uuid);

        let mut out = Vec::new();
        self.inner
            .handle_response(uuid, value, &mut serde_json::Serializer::new(&mut out));
        self.track(&out)?;
        Ok(out)
    }

    pub fn view(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.inner.view(&mut serde_json::Serializer::new(&mut out));
        out
    }

    /// Number of requests the host still owes an answer for.
    pub fn pending(&self) -> usize {
        self.awaiting.len()
    }

    fn track(&mut self, out: &[u8]) -> Result<(), BridgeError> {
        let requests: Vec<Request<Value>> =
            serde_json::from_slice(out).map_err(|e| BridgeError::Encode(e.to_string()))?;
        for request in requests {
            if let Some(awaiting) = Awaiting::from_effect(&request.effect) {
                debug!(?awaiting, "host owes a response");
                self.awaiting.insert(request.uuid, awaiting);
            }
        }
        Ok(())
    }
}

fn parse(bytes: &[u8]) -> Result<Value, BridgeError> {
    if bytes.len() > MAX_EVENT_BYTES {
        return Err(BridgeError::TooLarge {
            size: bytes.len(),
            max: MAX_EVENT_BYTES,
        });
    }
    serde_json::from_slice(bytes).map_err(|e| BridgeError::Decode(e.to_string()))
}
