//! Session state machine.
//!
//! `Idle` → new session → `AwaitingRequirements` → non-empty text →
//! `CollectingMaterials` → generate → `Idle`. Every operation locks the
//! session for its whole duration, so events of one session never overlap.

use std::sync::Arc;

use lectern_core::types::{
    AudioFormat, Choice, InboundEvent, Material, MaterialKind, Session, SessionId, Stage,
};
use lectern_llm::TextGenerator;
use lectern_whisper::TranscriptionService;

use crate::error::ChatError;
use crate::ingest::IngestionPipeline;
use crate::messages;
use crate::orchestrator::{DocumentOrchestrator, GenerationReport};
use crate::store::SessionStore;
use crate::transport::Transport;

/// Raw payload of a material submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterialInput {
    Text(String),
    Voice(Vec<u8>),
    Audio { bytes: Vec<u8>, format: AudioFormat },
}

impl MaterialInput {
    pub fn kind(&self) -> MaterialKind {
        match self {
            MaterialInput::Text(_) => MaterialKind::Text,
            MaterialInput::Voice(_) => MaterialKind::Voice,
            MaterialInput::Audio { .. } => MaterialKind::Audio,
        }
    }
}

/// Routes inbound events and drives the workflow of each session.
pub struct SessionMachine<S, G> {
    store: Arc<SessionStore>,
    ingestion: IngestionPipeline<S>,
    orchestrator: DocumentOrchestrator<G>,
    transport: Arc<dyn Transport>,
}

impl<S, G> SessionMachine<S, G>
where
    S: TranscriptionService,
    G: TextGenerator,
{
    pub fn new(
        store: Arc<SessionStore>,
        ingestion: IngestionPipeline<S>,
        orchestrator: DocumentOrchestrator<G>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            store,
            ingestion,
            orchestrator,
            transport,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn ingestion(&self) -> &IngestionPipeline<S> {
        &self.ingestion
    }

    pub fn orchestrator(&self) -> &DocumentOrchestrator<G> {
        &self.orchestrator
    }

    // =========================================================================
    // Event routing
    // =========================================================================

    /// Handle one inbound event to completion.
    ///
    /// Errors already reported to the user are logged and swallowed; only
    /// store and transport failures are returned.
    pub async fn handle_event(&self, id: SessionId, event: InboundEvent) -> Result<(), ChatError> {
        let handle = self.store.handle(id)?;
        let mut session = handle.lock().await;
        let stage = session.stage;
        let kind = event.kind();
        tracing::debug!(session_id = %id, stage = %stage, event = kind, "Inbound event");

        let result = match (stage, event) {
            (_, InboundEvent::Start) => self.greet(id).await,
            (_, InboundEvent::Button(Choice::NewSession)) => self.do_start(&mut session).await,
            (Stage::AwaitingRequirements, InboundEvent::Text(text)) => {
                self.do_submit_requirements(&mut session, &text).await
            }
            (Stage::CollectingMaterials, InboundEvent::Text(text)) => self
                .do_submit_material(&mut session, MaterialInput::Text(text))
                .await
                .map(|_| ()),
            (Stage::CollectingMaterials, InboundEvent::Voice(bytes)) => self
                .do_submit_material(&mut session, MaterialInput::Voice(bytes))
                .await
                .map(|_| ()),
            (Stage::CollectingMaterials, InboundEvent::Audio { bytes, format }) => self
                .do_submit_material(&mut session, MaterialInput::Audio { bytes, format })
                .await
                .map(|_| ()),
            (Stage::CollectingMaterials, InboundEvent::Button(Choice::AddMaterial)) => {
                self.transport.send_message(id, messages::SEND_MATERIAL).await
            }
            (Stage::CollectingMaterials, InboundEvent::Button(Choice::Generate)) => self
                .do_trigger_generation(&mut session)
                .await
                .map(|_| ()),
            (stage, _) => {
                abandon(&mut session, kind);
                Err(ChatError::UnexpectedEvent { stage, event: kind })
            }
        };

        match result {
            Err(e) if e.is_user_facing() => {
                tracing::info!(session_id = %id, event = kind, error = %e, "Event rejected");
                Ok(())
            }
            other => other,
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Reset the session and ask for requirements.
    pub async fn start_session(&self, id: SessionId) -> Result<(), ChatError> {
        let handle = self.store.handle(id)?;
        let mut session = handle.lock().await;
        self.do_start(&mut session).await
    }

    /// Store the main requirements and open material collection.
    pub async fn submit_requirements(&self, id: SessionId, text: &str) -> Result<(), ChatError> {
        let handle = self.store.handle(id)?;
        let mut session = handle.lock().await;
        self.do_submit_requirements(&mut session, text).await
    }

    /// Ingest one material and append it to the session.
    pub async fn submit_material(
        &self,
        id: SessionId,
        input: MaterialInput,
    ) -> Result<Material, ChatError> {
        let handle = self.store.handle(id)?;
        let mut session = handle.lock().await;
        self.do_submit_material(&mut session, input).await
    }

    /// Generate the document and clear the session, whatever the outcome.
    pub async fn trigger_generation(&self, id: SessionId) -> Result<GenerationReport, ChatError> {
        let handle = self.store.handle(id)?;
        let mut session = handle.lock().await;
        self.do_trigger_generation(&mut session).await
    }

    async fn greet(&self, id: SessionId) -> Result<(), ChatError> {
        let text = messages::greeting(self.orchestrator.spec());
        self.transport
            .send_prompt(id, &text, &[Choice::NewSession])
            .await
    }

    async fn do_start(&self, session: &mut Session) -> Result<(), ChatError> {
        session.reset();
        session.stage = Stage::AwaitingRequirements;
        tracing::info!(session_id = %session.id, "Session started");

        let text = messages::request_requirements(self.orchestrator.spec());
        self.transport.send_message(session.id, &text).await
    }

    async fn do_submit_requirements(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<(), ChatError> {
        if session.stage != Stage::AwaitingRequirements {
            return Err(reject(session, "requirements"));
        }

        let requirements = text.trim();
        if requirements.is_empty() {
            self.transport
                .send_message(session.id, messages::EMPTY_INPUT)
                .await?;
            let again = messages::request_requirements(self.orchestrator.spec());
            self.transport.send_message(session.id, &again).await?;
            return Err(ChatError::EmptyInput);
        }

        session.requirements = Some(requirements.to_string());
        session.stage = Stage::CollectingMaterials;
        tracing::info!(
            session_id = %session.id,
            chars = requirements.chars().count(),
            "Requirements stored"
        );

        self.transport
            .send_prompt(
                session.id,
                messages::REQUIREMENTS_SAVED,
                &[Choice::AddMaterial, Choice::Generate],
            )
            .await
    }

    async fn do_submit_material(
        &self,
        session: &mut Session,
        input: MaterialInput,
    ) -> Result<Material, ChatError> {
        if session.stage != Stage::CollectingMaterials {
            return Err(reject(session, "material"));
        }

        let kind = input.kind();
        let ingested = match input {
            MaterialInput::Text(text) => self.ingestion.ingest_text(&text),
            MaterialInput::Voice(bytes) => {
                self.ingestion
                    .ingest_audio(MaterialKind::Voice, &bytes, AudioFormat::Ogg)
                    .await
            }
            MaterialInput::Audio { bytes, format } => {
                self.ingestion
                    .ingest_audio(MaterialKind::Audio, &bytes, format)
                    .await
            }
        };

        let material = match ingested {
            Ok(material) => material,
            Err(e) => {
                tracing::warn!(session_id = %session.id, kind = %kind, error = %e, "Material rejected");
                let notice = match &e {
                    ChatError::EmptyInput => Some(messages::EMPTY_INPUT.to_string()),
                    ChatError::Transcription(reason) => Some(messages::transcription_failed(reason)),
                    _ => None,
                };
                if let Some(notice) = notice {
                    self.transport.send_message(session.id, &notice).await?;
                }
                return Err(e);
            }
        };

        session.materials.push(material.clone());
        tracing::info!(
            session_id = %session.id,
            kind = %kind,
            count = session.materials.len(),
            "Material added"
        );

        if kind != MaterialKind::Text {
            self.transport
                .send_message(session.id, &messages::transcription_echo(&material.content))
                .await?;
        }
        self.transport
            .send_prompt(
                session.id,
                messages::MATERIAL_ADDED,
                &[Choice::AddMaterial, Choice::Generate],
            )
            .await?;

        Ok(material)
    }

    async fn do_trigger_generation(
        &self,
        session: &mut Session,
    ) -> Result<GenerationReport, ChatError> {
        let Some(requirements) = session.requirements.clone() else {
            session.reset();
            tracing::warn!(session_id = %session.id, "Generation requested without requirements");
            self.transport
                .send_prompt(
                    session.id,
                    messages::MISSING_REQUIREMENTS,
                    &[Choice::NewSession],
                )
                .await?;
            return Err(ChatError::MissingRequirements);
        };
        if session.stage != Stage::CollectingMaterials {
            return Err(reject(session, "generate"));
        }

        let report = self
            .orchestrator
            .run(
                session.id,
                &requirements,
                &session.materials,
                self.transport.as_ref(),
            )
            .await;

        session.reset();
        tracing::info!(session_id = %session.id, "Session cleared after generation");
        Ok(report)
    }
}

/// Unhandled event: the conversation drops back to `Idle`, data untouched.
fn abandon(session: &mut Session, event: &'static str) {
    tracing::debug!(
        session_id = %session.id,
        stage = %session.stage,
        event,
        "Event not handled in this stage, returning to idle"
    );
    session.stage = Stage::Idle;
}

fn reject(session: &mut Session, event: &'static str) -> ChatError {
    let stage = session.stage;
    abandon(session, event);
    ChatError::UnexpectedEvent { stage, event }
}
