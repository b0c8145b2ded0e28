//! Scripted transport used by unit tests.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, VenusError};
use crate::transport::Transport;

/// What the fake device does for one exchange.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// Reply immediately with these bytes.
    Reply(Vec<u8>),
    /// Stay silent until the attempt times out.
    Silent,
    /// Fail at the socket level.
    SocketError(io::ErrorKind),
}

impl Step {
    pub(crate) fn reply(text: &str) -> Self {
        Step::Reply(text.as_bytes().to_vec())
    }
}

#[derive(Debug, Default)]
struct Script {
    steps: VecDeque<Step>,
    requests: Vec<Vec<u8>>,
    timeouts: Vec<Duration>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                steps: steps.into(),
                ..Script::default()
            })),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.script.lock().unwrap().requests.len()
    }

    pub(crate) fn requests(&self) -> Vec<Vec<u8>> {
        self.script.lock().unwrap().requests.clone()
    }

    pub(crate) fn timeouts(&self) -> Vec<Duration> {
        self.script.lock().unwrap().timeouts.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn exchange(&self, payload: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        let step = {
            let mut script = self.script.lock().unwrap();
            script.requests.push(payload.to_vec());
            script.timeouts.push(timeout);
            script.steps.pop_front().unwrap_or(Step::Silent)
        };
        match step {
            Step::Reply(bytes) => Ok(bytes),
            Step::Silent => {
                tokio::time::sleep(timeout).await;
                Err(VenusError::Timeout)
            }
            Step::SocketError(kind) => Err(VenusError::Io(io::Error::from(kind))),
        }
    }
}
