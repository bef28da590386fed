//! Outbound side of the chat transport.

use std::sync::Mutex;

use async_trait::async_trait;

use lectern_core::types::{Choice, SessionId};

use crate::error::ChatError;

/// Delivers prompts, messages and files to a conversation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `text` with a set of buttons.
    async fn send_prompt(
        &self,
        session: SessionId,
        text: &str,
        choices: &[Choice],
    ) -> Result<(), ChatError>;

    async fn send_message(&self, session: SessionId, text: &str) -> Result<(), ChatError>;

    async fn send_file(
        &self,
        session: SessionId,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<(), ChatError>;
}

/// One item handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Prompt {
        session: SessionId,
        text: String,
        choices: Vec<Choice>,
    },
    Message {
        session: SessionId,
        text: String,
    },
    File {
        session: SessionId,
        file_name: String,
        bytes: Vec<u8>,
    },
}

impl Outbound {
    pub fn session(&self) -> SessionId {
        match self {
            Outbound::Prompt { session, .. }
            | Outbound::Message { session, .. }
            | Outbound::File { session, .. } => *session,
        }
    }

    /// Text of a prompt or message.
    pub fn text(&self) -> Option<&str> {
        match self {
            Outbound::Prompt { text, .. } | Outbound::Message { text, .. } => Some(text),
            Outbound::File { .. } => None,
        }
    }
}

/// In-memory transport that records everything it is asked to deliver.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Outbound>>,
    fail_messages: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose `send_message` always fails (after recording).
    pub fn failing_messages() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_messages: true,
        }
    }

    pub fn sent(&self) -> Vec<Outbound> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Texts of prompts and messages, in delivery order.
    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|o| o.text().map(str::to_string))
            .collect()
    }

    /// Delivered files as `(file_name, bytes)`.
    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.sent()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::File {
                    file_name, bytes, ..
                } => Some((file_name, bytes)),
                _ => None,
            })
            .collect()
    }

    /// The most recent item, if any.
    pub fn last(&self) -> Option<Outbound> {
        self.sent.lock().ok().and_then(|s| s.last().cloned())
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }

    fn record(&self, item: Outbound) -> Result<(), ChatError> {
        self.sent
            .lock()
            .map_err(|e| ChatError::Transport(format!("recorder lock poisoned: {}", e)))?
            .push(item);
        Ok(())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_prompt(
        &self,
        session: SessionId,
        text: &str,
        choices: &[Choice],
    ) -> Result<(), ChatError> {
        self.record(Outbound::Prompt {
            session,
            text: text.to_string(),
            choices: choices.to_vec(),
        })
    }

    async fn send_message(&self, session: SessionId, text: &str) -> Result<(), ChatError> {
        self.record(Outbound::Message {
            session,
            text: text.to_string(),
        })?;
        if self.fail_messages {
            return Err(ChatError::Transport("message delivery failed".to_string()));
        }
        Ok(())
    }

    async fn send_file(
        &self,
        session: SessionId,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<(), ChatError> {
        self.record(Outbound::File {
            session,
            file_name: file_name.to_string(),
            bytes: bytes.to_vec(),
        })
    }
}
