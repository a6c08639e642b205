//! Prompt construction for prose and scene descriptions.

use storyreel_core::{OutlineSlice, StyleTag, TextRequest};
use storyreel_error::{BuilderError, StoryreelResult};

const PROSE_SYSTEM: &str = "You are a novelist writing one chapter of a serialized, \
illustrated story that will be narrated aloud. Write vivid, concrete prose in plain \
paragraphs. Output only the chapter text, without headings, titles or commentary.";

const SPLIT_SYSTEM: &str = "You are a storyboard artist. For each numbered narration \
passage you receive, describe one still image that illustrates it. Output ONLY valid JSON.";

/// Request for one chapter's prose.
///
/// `previous_tail` is the end of the previous chapter, included so the story
/// continues coherently.
pub fn prose_request(
    slice: &OutlineSlice,
    previous_tail: Option<&str>,
    requirement: Option<&str>,
) -> StoryreelResult<TextRequest> {
    let mut prompt = format!("Story outline:\n{}\n\n", slice.premise());
    if let Some(beat) = slice.beat() {
        prompt.push_str(&format!(
            "Events of chapter {}:\n{}\n\n",
            slice.chapter(),
            beat
        ));
    }
    if let Some(tail) = previous_tail.map(str::trim).filter(|t| !t.is_empty()) {
        prompt.push_str(&format!(
            "The previous chapter ended with:\n\"\"\"\n{}\n\"\"\"\n\n",
            tail
        ));
    }
    if let Some(requirement) = requirement {
        prompt.push_str(&format!("Requirements: {}\n\n", requirement));
    }
    prompt.push_str(&format!("Write chapter {} now.", slice.chapter()));

    Ok(TextRequest::builder()
        .prompt(prompt)
        .system(Some(PROSE_SYSTEM.to_string()))
        .build()
        .map_err(|e| BuilderError::new("prose", e))?)
}

/// Request for visual descriptions of `passages`, one per scene.
pub fn split_request(
    passages: &[&str],
    default_style: StyleTag,
    requirement: Option<&str>,
) -> StoryreelResult<TextRequest> {
    let mut prompt = format!(
        "There are exactly {} passages. Return a JSON array with exactly {} objects, \
in order, each shaped as {{\"scene\": <number>, \"description\": <one-sentence visual \
description>, \"style\": \"anime\" or \"realistic\"}}. Use \"{}\" unless a passage \
clearly calls for the other style.\n",
        passages.len(),
        passages.len(),
        default_style
    );
    if let Some(requirement) = requirement {
        prompt.push_str(&format!("Visual requirements: {}\n", requirement));
    }
    prompt.push('\n');
    for (i, passage) in passages.iter().enumerate() {
        prompt.push_str(&format!("Passage {}:\n{}\n\n", i + 1, passage.trim()));
    }

    Ok(TextRequest::builder()
        .prompt(prompt)
        .system(Some(SPLIT_SYSTEM.to_string()))
        .temperature(Some(0.4_f32))
        .build()
        .map_err(|e| BuilderError::new("scene split", e))?)
}

/// Last `max_chars` characters of `prose`, starting at a word boundary when possible.
pub fn prose_tail(prose: &str, max_chars: usize) -> &str {
    let total = prose.chars().count();
    if total <= max_chars {
        return prose;
    }
    let start = prose
        .char_indices()
        .nth(total - max_chars)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let tail = &prose[start..];
    match tail.find(char::is_whitespace) {
        Some(space) if space < tail.len() / 2 => tail[space..].trim_start(),
        _ => tail,
    }
}
