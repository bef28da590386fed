//! User-facing texts and the per-segment generation prompt.

use lectern_core::types::{DocumentSpec, Material};

pub const REQUIREMENTS_SAVED: &str =
    "Requirements saved. Add supplementary materials or start generation.";
pub const SEND_MATERIAL: &str = "Send text, a voice message or an audio file.";
pub const MATERIAL_ADDED: &str = "Material added. Add more or start generation.";
pub const EMPTY_INPUT: &str = "The message is empty. Please send some text.";
pub const MISSING_REQUIREMENTS: &str =
    "Requirements are missing. Create a new script to provide them.";
pub const GENERATION_STARTED: &str = "Starting generation…";
pub const NO_MATERIALS: &str = "No materials.";

/// Inline text recorded under the heading of a failed segment.
pub const FAILED_SEGMENT_MARKER: &str = "_This part could not be generated._";

pub fn greeting(spec: &DocumentSpec) -> String {
    format!(
        "Hello! I help prepare a {} from your requirements and materials. \
         Press the button below to begin.",
        spec.title
    )
}

pub fn request_requirements(spec: &DocumentSpec) -> String {
    format!("Describe the main requirements for the {}.", spec.title)
}

pub fn transcription_echo(text: &str) -> String {
    format!("Transcription: \"{}\"", text)
}

pub fn transcription_failed(reason: &str) -> String {
    format!("Could not transcribe the audio: {}", reason)
}

/// Heading of a delivered segment, `index` is 1-based.
pub fn segment_heading(index: usize, name: &str) -> String {
    format!("Part {} — {}:", index, name)
}

pub fn segment_failed(index: usize, name: &str, reason: &str) -> String {
    format!("Failed to generate part {} ({}): {}", index, name, reason)
}

pub fn document_ready(spec: &DocumentSpec) -> String {
    let mut title = spec.title.clone();
    if let Some(first) = title.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    format!("{} is ready! Press the button to create a new one.", title)
}

/// Prompt asking for segment `index` (1-based) only.
pub fn segment_prompt(
    spec: &DocumentSpec,
    requirements: &str,
    materials: &[Material],
    index: usize,
) -> String {
    let name = spec
        .segments
        .get(index.saturating_sub(1))
        .map(String::as_str)
        .unwrap_or_default();
    let materials = if materials.is_empty() {
        NO_MATERIALS.to_string()
    } else {
        materials
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Generate a {title} divided into {count} equal parts: {list}.\n\
         Main requirements: {requirements}\n\
         Additional materials:\n{materials}\n\
         Right now I need only part {index}, '{name}'. \
         Make the text structured and logical.",
        title = spec.title,
        count = spec.len(),
        list = spec.segments.join(", "),
    )
}
