//! Console front-end: a line-based chat on stdin/stdout.
//!
//! Commands: `/start`, `/new`, `/add`, `/generate`, `/voice <path>`,
//! `/audio <path>`, `/quit`. Any other line is sent as text.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use lectern_chat::{ChatError, Transport};
use lectern_core::error::LecternError;
use lectern_core::types::{AudioFormat, Choice, InboundEvent, SessionId};

/// Command typed for a button.
pub fn command_for(choice: Choice) -> &'static str {
    match choice {
        Choice::NewSession => "/new",
        Choice::AddMaterial => "/add",
        Choice::Generate => "/generate",
    }
}

// =============================================================================
// Input
// =============================================================================

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Event(InboundEvent),
    Voice(PathBuf),
    Audio(PathBuf),
    Quit,
    Blank,
}

pub fn parse_line(line: &str) -> ConsoleInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ConsoleInput::Blank;
    }

    let (command, argument) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };
    match (command, argument) {
        ("/start", "") => ConsoleInput::Event(InboundEvent::Start),
        ("/new", "") => ConsoleInput::Event(InboundEvent::Button(Choice::NewSession)),
        ("/add", "") => ConsoleInput::Event(InboundEvent::Button(Choice::AddMaterial)),
        ("/generate", "") => ConsoleInput::Event(InboundEvent::Button(Choice::Generate)),
        ("/quit", "") | ("/exit", "") => ConsoleInput::Quit,
        ("/voice", path) if !path.is_empty() => ConsoleInput::Voice(PathBuf::from(path)),
        ("/audio", path) if !path.is_empty() => ConsoleInput::Audio(PathBuf::from(path)),
        _ => ConsoleInput::Event(InboundEvent::Text(line.to_string())),
    }
}

impl ConsoleInput {
    /// Turn the input into an event, reading referenced audio files.
    /// Returns `None` for blank lines and `/quit`.
    pub async fn into_event(self) -> Result<Option<InboundEvent>, LecternError> {
        match self {
            ConsoleInput::Event(event) => Ok(Some(event)),
            ConsoleInput::Voice(path) => {
                let bytes = tokio::fs::read(&path).await?;
                Ok(Some(InboundEvent::Voice(bytes)))
            }
            ConsoleInput::Audio(path) => {
                let format = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(AudioFormat::from_extension)
                    .unwrap_or(AudioFormat::Unknown);
                let bytes = tokio::fs::read(&path).await?;
                Ok(Some(InboundEvent::Audio { bytes, format }))
            }
            ConsoleInput::Quit | ConsoleInput::Blank => Ok(None),
        }
    }
}

// =============================================================================
// Output
// =============================================================================

/// Transport printing to a writer and saving files into a directory.
pub struct ConsoleTransport<W> {
    out: Mutex<W>,
    output_dir: PathBuf,
}

impl ConsoleTransport<std::io::Stdout> {
    pub fn stdout(output_dir: impl Into<PathBuf>) -> Self {
        Self::new(std::io::stdout(), output_dir)
    }
}

impl<W: Write + Send> ConsoleTransport<W> {
    pub fn new(out: W, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            out: Mutex::new(out),
            output_dir: output_dir.into(),
        }
    }

    fn write_block(&self, text: &str) -> Result<(), ChatError> {
        let mut out = self
            .out
            .lock()
            .map_err(|e| ChatError::Transport(format!("console lock poisoned: {}", e)))?;
        writeln!(out, "{}\n", text)
            .and_then(|_| out.flush())
            .map_err(|e| ChatError::Transport(format!("console write failed: {}", e)))
    }
}

#[async_trait]
impl<W: Write + Send> Transport for ConsoleTransport<W> {
    async fn send_prompt(
        &self,
        _session: SessionId,
        text: &str,
        choices: &[Choice],
    ) -> Result<(), ChatError> {
        let mut block = text.to_string();
        for choice in choices {
            block.push_str(&format!("\n  {:<10} {}", command_for(*choice), choice.label()));
        }
        self.write_block(&block)
    }

    async fn send_message(&self, _session: SessionId, text: &str) -> Result<(), ChatError> {
        self.write_block(text)
    }

    async fn send_file(
        &self,
        session: SessionId,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<(), ChatError> {
        // Final path component only.
        let name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| ChatError::Transport(format!("invalid file name: {:?}", file_name)))?;
        let path = self.output_dir.join(name);

        let io_err = |e: std::io::Error| {
            ChatError::Transport(format!("failed to write {}: {}", path.display(), e))
        };
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(io_err)?;
        tokio::fs::write(&path, bytes).await.map_err(io_err)?;

        tracing::info!(session_id = %session, path = %path.display(), bytes = bytes.len(), "Document saved");
        self.write_block(&format!("Saved {}", path.display()))
    }
}
