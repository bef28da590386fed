//! Document generation orchestrator.
//!
//! Drives one generation call per segment of the `DocumentSpec`, delivers
//! each outcome as soon as it is known, and assembles the final Markdown
//! document. Generator failures stay local to their segment.

use futures::stream::{self, Stream, StreamExt};

use lectern_core::config::LecternConfig;
use lectern_core::types::{Choice, DocumentSpec, Material, SessionId};
use lectern_llm::{GenerationRequest, TextGenerator};

use crate::chunk::split_for_transport;
use crate::error::ChatError;
use crate::messages;
use crate::transport::Transport;

/// Result of one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOutcome {
    Generated {
        index: usize,
        name: String,
        body: String,
    },
    Failed {
        index: usize,
        name: String,
        reason: String,
    },
}

impl SegmentOutcome {
    /// 1-based position in the document.
    pub fn index(&self) -> usize {
        match self {
            SegmentOutcome::Generated { index, .. } | SegmentOutcome::Failed { index, .. } => {
                *index
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SegmentOutcome::Generated { name, .. } | SegmentOutcome::Failed { name, .. } => name,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, SegmentOutcome::Generated { .. })
    }

    /// The failure of this segment, if it failed.
    pub fn error(&self) -> Option<ChatError> {
        match self {
            SegmentOutcome::Failed {
                index,
                name,
                reason,
            } => Some(ChatError::GenerationSegment {
                segment: *index,
                name: name.clone(),
                reason: reason.clone(),
            }),
            SegmentOutcome::Generated { .. } => None,
        }
    }
}

/// The assembled artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    pub file_name: String,
    pub content: String,
}

/// Everything a generation run produced.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    /// One outcome per segment, in document order.
    pub outcomes: Vec<SegmentOutcome>,
    pub document: GeneratedDocument,
}

impl GenerationReport {
    pub fn failed(&self) -> impl Iterator<Item = &SegmentOutcome> {
        self.outcomes.iter().filter(|o| !o.is_generated())
    }

    pub fn generated_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_generated()).count()
    }
}

/// Knobs of a generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub system_role: String,
    pub max_output: u32,
    pub temperature: f32,
    /// Longest message the transport accepts, in characters.
    pub message_limit: usize,
    /// Keep a marker under the heading of failed segments.
    pub mark_failed_segments: bool,
}

impl GenerationSettings {
    pub fn from_config(config: &LecternConfig) -> Self {
        Self {
            system_role: config.generation.system_role.clone(),
            max_output: config.generation.max_output_tokens,
            temperature: config.generation.temperature,
            message_limit: config.transport.message_limit,
            mark_failed_segments: config.document.mark_failed_segments,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from_config(&LecternConfig::default())
    }
}

/// Turns requirements and materials into a segmented document.
pub struct DocumentOrchestrator<G> {
    generator: G,
    spec: DocumentSpec,
    settings: GenerationSettings,
}

impl<G: TextGenerator> DocumentOrchestrator<G> {
    pub fn new(generator: G, spec: DocumentSpec, settings: GenerationSettings) -> Self {
        Self {
            generator,
            spec,
            settings,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn spec(&self) -> &DocumentSpec {
        &self.spec
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Lazy stream of segment outcomes, one generation call per item, in
    /// declaration order. Nothing is requested until the stream is polled.
    pub fn segments<'a>(
        &'a self,
        requirements: &'a str,
        materials: &'a [Material],
    ) -> impl Stream<Item = SegmentOutcome> + Send + 'a {
        stream::iter(self.spec.segments.iter().enumerate()).then(move |(position, name)| {
            let index = position + 1;
            let request = GenerationRequest {
                system_role: self.settings.system_role.clone(),
                prompt: messages::segment_prompt(&self.spec, requirements, materials, index),
                max_output: self.settings.max_output,
                temperature: self.settings.temperature,
            };
            async move {
                match self.generator.generate(&request).await {
                    Ok(body) => SegmentOutcome::Generated {
                        index,
                        name: name.clone(),
                        body,
                    },
                    Err(e) => SegmentOutcome::Failed {
                        index,
                        name: name.clone(),
                        reason: e.to_string(),
                    },
                }
            }
        })
    }

    /// Generate, deliver and assemble the whole document.
    ///
    /// Delivery failures are logged and do not stop the run; every segment
    /// is attempted exactly once.
    pub async fn run(
        &self,
        session: SessionId,
        requirements: &str,
        materials: &[Material],
        transport: &dyn Transport,
    ) -> GenerationReport {
        tracing::info!(
            session_id = %session,
            segments = self.spec.len(),
            materials = materials.len(),
            "Document generation started"
        );
        if let Err(e) = transport
            .send_message(session, messages::GENERATION_STARTED)
            .await
        {
            tracing::warn!(session_id = %session, error = %e, "Failed to announce generation");
        }

        let mut outcomes = Vec::with_capacity(self.spec.len());
        let mut content = String::new();

        let mut segments = std::pin::pin!(self.segments(requirements, materials));
        while let Some(outcome) = segments.next().await {
            self.deliver(session, &outcome, transport).await;
            self.append(&mut content, &outcome);
            outcomes.push(outcome);
        }

        let document = GeneratedDocument {
            file_name: self.spec.file_name.clone(),
            content,
        };

        if let Err(e) = transport
            .send_file(session, &document.file_name, document.content.as_bytes())
            .await
        {
            tracing::warn!(session_id = %session, error = %e, "Failed to deliver document");
        }
        if let Err(e) = transport
            .send_prompt(
                session,
                &messages::document_ready(&self.spec),
                &[Choice::NewSession],
            )
            .await
        {
            tracing::warn!(session_id = %session, error = %e, "Failed to send completion prompt");
        }

        let report = GenerationReport { outcomes, document };
        tracing::info!(
            session_id = %session,
            generated = report.generated_count(),
            failed = report.failed().count(),
            bytes = report.document.content.len(),
            "Document generation finished"
        );
        report
    }

    async fn deliver(
        &self,
        session: SessionId,
        outcome: &SegmentOutcome,
        transport: &dyn Transport,
    ) {
        if let Some(error) = outcome.error() {
            tracing::warn!(
                session_id = %session,
                segment = outcome.index(),
                error = %error,
                "Segment generation failed"
            );
        }

        let texts = match outcome {
            SegmentOutcome::Generated { index, name, body } => {
                tracing::info!(
                    session_id = %session,
                    segment = index,
                    chars = body.chars().count(),
                    "Segment generated"
                );
                self.segment_messages(messages::segment_heading(*index, name), body)
            }
            SegmentOutcome::Failed {
                index,
                name,
                reason,
            } => vec![messages::segment_failed(*index, name, reason)],
        };
        if texts.len() > 1 {
            tracing::debug!(
                session_id = %session,
                segment = outcome.index(),
                messages = texts.len(),
                "Segment split for delivery"
            );
        }

        for text in &texts {
            if let Err(e) = transport.send_message(session, text).await {
                tracing::warn!(
                    session_id = %session,
                    segment = outcome.index(),
                    error = %e,
                    "Failed to deliver segment"
                );
            }
        }
    }

    /// Heading and body in one message when they fit the transport limit,
    /// otherwise the heading first and the body in chunks after it.
    fn segment_messages(&self, heading: String, body: &str) -> Vec<String> {
        let limit = self.settings.message_limit;
        let combined = format!("{}\n\n{}", heading, body);
        if limit == 0 || combined.chars().count() <= limit {
            return vec![combined];
        }

        let mut parts = split_for_transport(&heading, limit);
        parts.extend(split_for_transport(body, limit));
        parts
    }

    fn append(&self, content: &mut String, outcome: &SegmentOutcome) {
        match outcome {
            SegmentOutcome::Generated { name, body, .. } => {
                content.push_str(&format!("## {}\n\n{}\n\n", name, body));
            }
            SegmentOutcome::Failed { name, .. } if self.settings.mark_failed_segments => {
                content.push_str(&format!(
                    "## {}\n\n{}\n\n",
                    name,
                    messages::FAILED_SEGMENT_MARKER
                ));
            }
            SegmentOutcome::Failed { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Outbound, RecordingTransport};
    use lectern_core::types::MaterialKind;
    use lectern_llm::MockTextGenerator;

    fn orchestrator(generator: MockTextGenerator) -> DocumentOrchestrator<MockTextGenerator> {
        DocumentOrchestrator::new(
            generator,
            DocumentSpec::default(),
            GenerationSettings::default(),
        )
    }

    fn materials() -> Vec<Material> {
        vec![Material::new(MaterialKind::Text, "Use Python examples")]
    }

    #[tokio::test]
    async fn test_all_segments_succeed() {
        let orch = orchestrator(MockTextGenerator::new("Body text."));
        let transport = RecordingTransport::new();

        let report = orch
            .run(SessionId(1), "Explain recursion", &materials(), &transport)
            .await;

        assert_eq!(report.outcomes.len(), 5);
        assert_eq!(report.generated_count(), 5);
        let headings: Vec<&str> = report
            .document
            .content
            .lines()
            .filter(|l| l.starts_with("## "))
            .collect();
        assert_eq!(
            headings,
            vec![
                "## Introduction",
                "## Main part 1",
                "## Main part 2",
                "## Conclusion",
                "## Additional notes"
            ]
        );
        assert!(report
            .document
            .content
            .starts_with("## Introduction\n\nBody text.\n\n## Main part 1"));

        let files = transport.files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, "lecture_script.md");
        assert_eq!(files[0].1, report.document.content.as_bytes());

        let texts = transport.texts();
        assert_eq!(texts[0], messages::GENERATION_STARTED);
        assert_eq!(texts[1], "Part 1 — Introduction:\n\nBody text.");
        assert!(matches!(
            transport.last(),
            Some(Outbound::Prompt { ref choices, .. }) if choices == &vec![Choice::NewSession]
        ));
    }

    #[tokio::test]
    async fn test_failed_segment_is_omitted_and_reported() {
        let orch = orchestrator(MockTextGenerator::new("ok").failing_on([3]));
        let transport = RecordingTransport::new();

        let report = orch.run(SessionId(1), "r", &[], &transport).await;

        assert_eq!(report.outcomes.len(), 5);
        let failed: Vec<usize> = report.failed().map(|o| o.index()).collect();
        assert_eq!(failed, vec![3]);
        assert!(!report.document.content.contains("## Main part 2"));
        assert!(report.document.content.contains("## Conclusion"));

        let notices: Vec<String> = transport
            .texts()
            .into_iter()
            .filter(|t| t.starts_with("Failed to generate"))
            .collect();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("part 3 (Main part 2)"));
        assert_eq!(transport.files().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_segment_marker() {
        let settings = GenerationSettings {
            mark_failed_segments: true,
            ..GenerationSettings::default()
        };
        let orch = DocumentOrchestrator::new(
            MockTextGenerator::new("ok").failing_on([2]),
            DocumentSpec::default(),
            settings,
        );
        let transport = RecordingTransport::new();
        let report = orch.run(SessionId(1), "r", &[], &transport).await;

        assert!(report.document.content.contains(&format!(
            "## Main part 1\n\n{}\n\n",
            messages::FAILED_SEGMENT_MARKER
        )));
        assert_eq!(report.document.content.matches("## ").count(), 5);
    }

    #[tokio::test]
    async fn test_all_segments_fail_still_delivers_file() {
        let orch = orchestrator(MockTextGenerator::new("x").failing_on(1..=5));
        let transport = RecordingTransport::new();
        let report = orch.run(SessionId(1), "r", &[], &transport).await;

        assert_eq!(report.outcomes.len(), 5);
        assert_eq!(report.generated_count(), 0);
        assert!(report.document.content.is_empty());
        assert_eq!(transport.files().len(), 1);
    }

    fn single_segment(limit: usize, body: &str) -> DocumentOrchestrator<MockTextGenerator> {
        let settings = GenerationSettings {
            message_limit: limit,
            ..GenerationSettings::default()
        };
        let spec = DocumentSpec {
            segments: vec!["Only".to_string()],
            ..DocumentSpec::default()
        };
        DocumentOrchestrator::new(MockTextGenerator::new(body), spec, settings)
    }

    #[tokio::test]
    async fn test_long_segment_is_chunked() {
        let body = "abcdefghijklmnopqrstuvwxyz".repeat(2);
        let orch = single_segment(30, &body);
        let transport = RecordingTransport::new();
        orch.run(SessionId(1), "r", &[], &transport).await;

        let texts = transport.texts();
        // started notice, heading, 2 chunks, completion prompt
        assert_eq!(texts[1], "Part 1 — Only:");
        let chunks = &texts[2..texts.len() - 1];
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= 30));
        assert_eq!(chunks.concat(), body);
    }

    #[tokio::test]
    async fn test_body_at_limit_keeps_every_message_within_limit() {
        let body = "x".repeat(40);
        let orch = single_segment(40, &body);
        let transport = RecordingTransport::new();
        let report = orch.run(SessionId(1), "r", &[], &transport).await;

        let texts = transport.texts();
        let segment = &texts[1..texts.len() - 1];
        assert_eq!(segment, ["Part 1 — Only:".to_string(), body.clone()]);
        assert!(segment.iter().all(|t| t.chars().count() <= 40));
        assert!(report.document.content.contains(&body));
    }

    #[test]
    fn test_failed_outcome_carries_segment_error() {
        let failed = SegmentOutcome::Failed {
            index: 3,
            name: "Main part 2".to_string(),
            reason: "HTTP 500: boom".to_string(),
        };
        let error = failed.error().unwrap();
        assert!(error.is_user_facing());
        assert_eq!(error.to_string(), "part 3 (Main part 2) failed: HTTP 500: boom");

        let generated = SegmentOutcome::Generated {
            index: 1,
            name: "Introduction".to_string(),
            body: "ok".to_string(),
        };
        assert!(generated.error().is_none());
    }

    #[tokio::test]
    async fn test_stream_is_lazy_and_ordered() {
        let orch = orchestrator(MockTextGenerator::scripted(["a", "b", "c", "d", "e"]));
        let materials = materials();
        let mut segments = std::pin::pin!(orch.segments("Explain recursion", &materials));
        assert!(orch.generator().requests().is_empty());

        let first = segments.next().await.unwrap();
        assert_eq!(first.index(), 1);
        assert_eq!(orch.generator().requests().len(), 1);

        let mut rest = Vec::new();
        while let Some(outcome) = segments.next().await {
            rest.push(outcome.name().to_string());
        }
        assert_eq!(
            rest,
            vec!["Main part 1", "Main part 2", "Conclusion", "Additional notes"]
        );

        let requests = orch.generator().requests();
        assert_eq!(requests.len(), 5);
        assert!(requests[4].prompt.contains("only part 5, 'Additional notes'"));
        assert_eq!(requests[0].system_role, GenerationSettings::default().system_role);
    }

    #[tokio::test]
    async fn test_delivery_failures_do_not_abort() {
        let orch = orchestrator(MockTextGenerator::new("ok"));
        let transport = RecordingTransport::failing_messages();
        let report = orch.run(SessionId(1), "r", &[], &transport).await;
        assert_eq!(report.generated_count(), 5);
        assert_eq!(transport.files().len(), 1);
    }
}
