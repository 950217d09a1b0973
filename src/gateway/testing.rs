//! Scripted in-memory gateway for tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::GatewayError;

use super::RemoteGateway;

/// A request observed by [`ScriptedGateway`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub service: String,
    pub action: String,
    pub params: Value,
}

type Script = HashMap<(String, String), VecDeque<Result<Value, GatewayError>>>;

/// Replays queued responses per `(service, action)` and records every call.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, service: &str, action: &str, response: Result<Value, GatewayError>) {
        self.script
            .lock()
            .expect("script lock")
            .entry((service.to_string(), action.to_string()))
            .or_default()
            .push_back(response);
    }

    pub fn push_ok(&self, service: &str, action: &str, response: Value) {
        self.push(service, action, Ok(response));
    }

    pub fn push_err(&self, service: &str, action: &str, error: GatewayError) {
        self.push(service, action, Err(error));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn calls_to(&self, action: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.action == action)
            .collect()
    }
}

#[async_trait]
impl RemoteGateway for ScriptedGateway {
    async fn request(
        &self,
        service: &str,
        action: &str,
        params: Value,
    ) -> Result<Value, GatewayError> {
        self.calls.lock().expect("calls lock").push(RecordedCall {
            service: service.to_string(),
            action: action.to_string(),
            params,
        });

        self.script
            .lock()
            .expect("script lock")
            .get_mut(&(service.to_string(), action.to_string()))
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(GatewayError::new(format!(
                    "no scripted response for {service}.{action}"
                )))
            })
    }
}
