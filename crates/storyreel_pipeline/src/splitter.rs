//! Scene splitting: prose to an ordered list of scene descriptors.

use crate::extraction::{extract_json, parse_json};
use crate::prompts::split_request;
use crate::segment::{Granularity, char_len, segment};
use crate::subtitle::normalize_narration;
use serde::Deserialize;
use std::str::FromStr;
use storyreel_core::{NarrationSpan, SceneCount, SceneDescriptor, StyleTag};
use storyreel_error::{
    ConsistencyError, ConsistencyErrorKind, GenerationError, GenerationErrorKind, StoryreelResult,
};
use storyreel_interface::TextGenerator;
use tracing::{debug, instrument, warn};

/// Partition `prose` into `count` contiguous spans of roughly equal length.
///
/// Cuts fall on the coarsest boundaries that yield at least `count` pieces:
/// sentences, then clauses, then words, then characters. The spans tile the prose
/// exactly. When the prose has fewer characters than `count`, trailing spans are
/// empty.
///
/// # Examples
///
/// ```
/// use storyreel_pipeline::partition_prose;
///
/// let prose = "One. Two. Three. Four. Five. Six.";
/// let spans = partition_prose(prose, 5);
/// assert_eq!(spans.len(), 5);
/// let rebuilt: String = spans.iter().map(|s| &prose[*s.start()..*s.end()]).collect();
/// assert_eq!(rebuilt, prose);
/// ```
pub fn partition_prose(prose: &str, count: u32) -> Vec<NarrationSpan> {
    let scenes = count.max(1) as usize;
    let units = Granularity::ALL
        .iter()
        .map(|granularity| segment(prose, *granularity))
        .find(|units| units.len() >= scenes)
        .unwrap_or_else(|| segment(prose, Granularity::Char));
    let n = units.len();

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0usize);
    for unit in &units {
        let last = prefix.last().copied().unwrap_or(0);
        prefix.push(last + char_len(prose, unit));
    }
    let total = prefix[n];

    let mut cuts = Vec::with_capacity(scenes + 1);
    cuts.push(0usize);
    for g in 1..scenes {
        if n < scenes {
            cuts.push(g.min(n));
            continue;
        }
        let prev = cuts.last().copied().unwrap_or(0);
        // Keep at least one unit for this group and for each group after it.
        let lo = prev + 1;
        let hi = n - (scenes - g);
        let target = total * g / scenes;
        let mut k = lo + prefix[lo..=hi].partition_point(|&p| p < target);
        if k > hi {
            k = hi;
        } else if k > lo && target - prefix[k - 1] <= prefix[k] - target {
            k -= 1;
        }
        cuts.push(k);
    }
    cuts.push(n);

    let boundary = |k: usize| if k == 0 { 0 } else { units[k - 1].end };
    cuts.windows(2)
        .map(|w| NarrationSpan::new(boundary(w[0]), boundary(w[1])))
        .collect()
}

/// Build a scene's image prompt from its parts.
///
/// Deterministic: the same narration, description, style and requirement always
/// produce the same prompt.
pub fn compose_visual_prompt(
    narration: &str,
    description: &str,
    style: StyleTag,
    requirement: Option<&str>,
) -> String {
    let mut parts = Vec::with_capacity(4);
    let description = description.trim().trim_end_matches('.');
    if !description.is_empty() {
        parts.push(description.to_string());
    }
    let narration = normalize_narration(narration);
    if !narration.is_empty() {
        let excerpt: String = narration.chars().take(160).collect();
        parts.push(format!("Scene: {}", excerpt.trim_end_matches('.')));
    }
    parts.push(style.prompt_suffix().to_string());
    if let Some(requirement) = requirement.map(str::trim).filter(|r| !r.is_empty()) {
        parts.push(requirement.to_string());
    }
    parts.join(". ")
}

#[derive(Debug, Deserialize)]
struct SceneVisual {
    #[serde(default, alias = "visual", alias = "prompt", alias = "visual_prompt")]
    description: String,
    #[serde(default)]
    style: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SplitPayload {
    List(Vec<SceneVisual>),
    Wrapped { scenes: Vec<SceneVisual> },
}

impl SplitPayload {
    fn into_scenes(self) -> Vec<SceneVisual> {
        match self {
            SplitPayload::List(scenes) | SplitPayload::Wrapped { scenes } => scenes,
        }
    }
}

/// Turns chapter prose into exactly `S` scene descriptors.
///
/// Narration is partitioned locally; the text backend only describes what each
/// passage looks like. A backend answer with the wrong number of descriptions is
/// a `SplitCountMismatch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneSplitter {
    default_style: StyleTag,
    requirement: Option<String>,
}

impl SceneSplitter {
    /// Create a splitter.
    pub fn new(default_style: StyleTag, requirement: Option<String>) -> Self {
        Self {
            default_style,
            requirement,
        }
    }

    /// Split `prose` into `count` scenes using `text` for the visual descriptions.
    ///
    /// # Errors
    ///
    /// Backend errors as reported, `MalformedResponse` for unparseable answers and
    /// `SplitCountMismatch` when the answer has the wrong number of scenes.
    #[instrument(skip(self, text, prose), fields(prose_len = prose.len(), count = count.get()))]
    pub async fn split(
        &self,
        text: &dyn TextGenerator,
        prose: &str,
        count: SceneCount,
    ) -> StoryreelResult<Vec<SceneDescriptor>> {
        if prose.trim().is_empty() {
            return Err(GenerationError::new(GenerationErrorKind::InvalidInput(
                "cannot split empty prose".to_string(),
            ))
            .into());
        }

        let spans = partition_prose(prose, count.get());
        let passages: Vec<&str> = spans.iter().map(|s| &prose[*s.start()..*s.end()]).collect();
        let request = split_request(&passages, self.default_style, self.requirement.as_deref())?;
        let response = text.generate_text(&request).await?;
        self.parse(prose, &spans, response.text())
    }

    /// Combine the partition with a backend answer.
    pub fn parse(
        &self,
        prose: &str,
        spans: &[NarrationSpan],
        response: &str,
    ) -> StoryreelResult<Vec<SceneDescriptor>> {
        let json = extract_json(response)?;
        let visuals = parse_json::<SplitPayload>(&json)?.into_scenes();

        if visuals.len() != spans.len() {
            warn!(
                expected = spans.len(),
                actual = visuals.len(),
                "Backend returned the wrong number of scenes"
            );
            return Err(ConsistencyError::new(ConsistencyErrorKind::SplitCountMismatch {
                expected: spans.len() as u32,
                actual: visuals.len() as u32,
            })
            .into());
        }

        let descriptors = spans
            .iter()
            .zip(visuals)
            .enumerate()
            .map(|(i, (span, visual))| {
                let narration = &prose[*span.start()..*span.end()];
                let style = visual
                    .style
                    .as_deref()
                    .and_then(|s| StyleTag::from_str(s.trim()).ok())
                    .unwrap_or(self.default_style);
                let prompt = compose_visual_prompt(
                    narration,
                    &visual.description,
                    style,
                    self.requirement.as_deref(),
                );
                SceneDescriptor::new(i as u32 + 1, narration, *span, prompt, style)
            })
            .collect::<Vec<_>>();

        debug!(scenes = descriptors.len(), "Split prose into scenes");
        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rebuild(prose: &str, spans: &[NarrationSpan]) -> String {
        spans.iter().map(|s| &prose[*s.start()..*s.end()]).collect()
    }

    #[test]
    fn test_prefers_sentence_boundaries() {
        let prose = "Mira woke. She packed her bag. The road was long. Night fell. She slept.";
        let spans = partition_prose(prose, 5);
        let pieces: Vec<&str> = spans.iter().map(|s| &prose[*s.start()..*s.end()]).collect();
        assert_eq!(pieces[0], "Mira woke. ");
        assert_eq!(pieces[4], "She slept.");
    }

    #[test]
    fn test_short_prose_leaves_empty_tail() {
        let spans = partition_prose("abc", 5);
        assert_eq!(spans.len(), 5);
        assert_eq!(rebuild("abc", &spans), "abc");
        assert!(spans[3].is_empty() && spans[4].is_empty());
        assert!(!spans[0].is_empty());
    }

    #[test]
    fn test_balanced_lengths() {
        let prose = "Short. ".repeat(50);
        let spans = partition_prose(&prose, 10);
        assert!(spans.iter().all(|s| s.len() == 35));
    }

    #[test]
    fn test_parse_wrong_count() {
        let splitter = SceneSplitter::new(StyleTag::Anime, None);
        let prose = "One. Two. Three. Four. Five.";
        let spans = partition_prose(prose, 5);
        let err = splitter
            .parse(prose, &spans, r#"[{"description": "a"}, {"description": "b"}]"#)
            .unwrap_err();
        assert!(matches!(
            err.as_consistency().map(|e| &e.kind),
            Some(ConsistencyErrorKind::SplitCountMismatch { expected: 5, actual: 2 })
        ));
    }

    #[test]
    fn test_parse_styles_and_prompts() {
        let splitter = SceneSplitter::new(StyleTag::Anime, Some("muted palette".to_string()));
        let prose = "One. Two. Three. Four. Five.";
        let spans = partition_prose(prose, 5);
        let answer = r#"```json
{"scenes": [
  {"scene": 1, "description": "a gate", "style": "Realistic"},
  {"scene": 2, "description": "a road"},
  {"scene": 3, "visual": "a tower", "style": "watercolor"},
  {"scene": 4, "description": "a river"},
  {"scene": 5, "description": ""}
]}
```"#;
        let scenes = splitter.parse(prose, &spans, answer).unwrap();
        assert_eq!(*scenes[0].style(), StyleTag::Realistic);
        assert_eq!(*scenes[2].style(), StyleTag::Anime);
        assert!(scenes[2].visual_prompt().starts_with("a tower. Scene: Three"));
        assert!(scenes[4].visual_prompt().starts_with("Scene: Five"));
        assert!(scenes.iter().all(|s| s.visual_prompt().ends_with("muted palette")));
        assert_eq!(scenes[1].narration(), "Two. ");
    }
}
