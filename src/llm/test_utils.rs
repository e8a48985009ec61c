//! Shared test utilities for code that drives an [`AiClient`].

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::llm::client::AiClient;
use crate::llm::message::Message;

/// One recorded call: the messages and the model they were sent to.
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub(crate) messages: Vec<Message>,
    pub(crate) model: String,
}

/// Mock AI client with a pre-programmed queue of responses.
///
/// Responses are returned in FIFO order. When the queue is exhausted,
/// subsequent calls return `Err("no more mock responses")`.
///
/// Every call is recorded so tests can inspect what was dispatched. Use
/// [`call_handle`](Self::call_handle) to keep a view on the recordings after
/// the client has been borrowed by a runner.
pub(crate) struct ConfigurableMockAiClient {
    responses: Arc<Mutex<VecDeque<Result<String>>>>,
    recorded_calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ConfigurableMockAiClient {
    /// Creates a new mock client that will return the given responses in order.
    pub(crate) fn new(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            recorded_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns a handle for inspecting which calls were made.
    pub(crate) fn call_handle(&self) -> CallRecordHandle {
        CallRecordHandle {
            recorded_calls: self.recorded_calls.clone(),
        }
    }

    /// Returns the number of unconsumed responses remaining in the queue.
    pub(crate) fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

/// Shared handle to a mock client's recorded calls.
pub(crate) struct CallRecordHandle {
    recorded_calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl CallRecordHandle {
    /// Returns all recorded calls in order.
    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.recorded_calls.lock().unwrap().clone()
    }

    /// Returns the number of AI requests that were made.
    pub(crate) fn request_count(&self) -> usize {
        self.recorded_calls.lock().unwrap().len()
    }
}

impl AiClient for ConfigurableMockAiClient {
    fn send_messages<'a>(
        &'a self,
        messages: &'a [Message],
        model: &'a str,
        _max_tokens: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        let responses = self.responses.clone();
        let recorded = self.recorded_calls.clone();
        let call = RecordedCall {
            messages: messages.to_vec(),
            model: model.to_string(),
        };
        Box::pin(async move {
            recorded.lock().unwrap().push(call);
            responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("no more mock responses")))
        })
    }
}
