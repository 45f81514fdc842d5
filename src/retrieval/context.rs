//! Rendering retrieved segments into prompt context.
//!
//! The layout the answer model sees: the video's metadata block, then a
//! speech section, then a visual section. Line order within a section is
//! whatever the strategy produced (centroid order for summary and
//! timestamps, relevance-ranked for query). Empty sections are omitted.

use crate::metadata_store::VideoMetadata;
use crate::segment_store::Segment;

/// Format seconds as `m:ss`.
fn clock(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// One context line for a speech span.
pub fn speech_line(segment: &Segment) -> String {
    format!(
        "At {} - {}: {}",
        clock(segment.start_secs),
        clock(segment.end_secs),
        segment.text
    )
}

/// One context line for a visual scene. Frames are near-instant, so only the
/// start time is shown.
pub fn visual_line(segment: &Segment) -> String {
    format!("At {}: {}", clock(segment.start_secs), segment.text)
}

/// Assemble the full context block for one video.
pub fn build_context(
    metadata: Option<&VideoMetadata>,
    speech: &[Segment],
    visual: &[Segment],
) -> String {
    let mut sections = Vec::new();

    if let Some(metadata) = metadata {
        sections.push(metadata.prompt_context());
    }

    if !speech.is_empty() {
        let lines: Vec<String> = speech.iter().map(speech_line).collect();
        sections.push(format!("Relevant Speech:\n{}", lines.join("\n")));
    }

    if !visual.is_empty() {
        let lines: Vec<String> = visual.iter().map(visual_line).collect();
        sections.push(format!("Relevant Visual Scenes:\n{}", lines.join("\n")));
    }

    sections.join("\n\n")
}
