//! Scripted in-memory `PortalSession` for tests.
//!
//! Responses are queued per path. The last queued response for a path is
//! sticky: it keeps being returned once the queue is down to one entry.
//! Unscripted paths answer 404.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{PortalSession, RawResponse};
use crate::error::PortalError;

#[derive(Debug, Clone)]
enum Scripted {
    Response(RawResponse),
    TransportFailure(String),
}

#[derive(Default)]
pub(crate) struct ScriptedPortal {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    dead: Mutex<bool>,
}

impl ScriptedPortal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, path: &str, response: RawResponse) {
        self.push(path, Scripted::Response(response));
    }

    pub(crate) fn respond_json(&self, path: &str, body: serde_json::Value) {
        self.respond(path, RawResponse::ok(body.to_string()));
    }

    pub(crate) fn fail(&self, path: &str, message: &str) {
        self.push(path, Scripted::TransportFailure(message.to_string()));
    }

    pub(crate) fn delay(&self, path: &str, delay: Duration) {
        self.delays.lock().insert(path.to_string(), delay);
    }

    pub(crate) fn set_alive(&self, alive: bool) {
        *self.dead.lock() = !alive;
    }

    /// Number of calls made to `path`.
    pub(crate) fn calls(&self, path: &str) -> usize {
        self.calls.lock().iter().filter(|(p, _)| p == path).count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    /// Query params of the most recent call to `path`.
    pub(crate) fn last_params(&self, path: &str) -> Option<Vec<(String, String)>> {
        self.calls
            .lock()
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, params)| params.clone())
    }

    fn push(&self, path: &str, scripted: Scripted) {
        self.scripts
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(scripted);
    }

    fn next(&self, path: &str) -> Option<Scripted> {
        let mut scripts = self.scripts.lock();
        let queue = scripts.get_mut(path)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl PortalSession for ScriptedPortal {
    async fn fetch(&self, path: &str, params: &[(&str, &str)]) -> Result<RawResponse, PortalError> {
        self.calls.lock().push((
            path.to_string(),
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));

        let delay = self.delays.lock().get(path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.next(path) {
            Some(Scripted::Response(resp)) => Ok(resp),
            Some(Scripted::TransportFailure(msg)) => Err(PortalError::Transport(msg)),
            None => Ok(RawResponse::with_status(404, "not scripted")),
        }
    }

    async fn is_alive(&self) -> bool {
        !*self.dead.lock()
    }
}
