//! Subtitle timing from narration text and measured audio duration.

use crate::segment::{Granularity, segment};
use storyreel_core::{CaptionLine, SubtitleTrack};
use storyreel_error::{ConsistencyError, ConsistencyErrorKind};

/// Strip control characters and collapse whitespace runs into single spaces.
///
/// # Examples
///
/// ```
/// use storyreel_pipeline::normalize_narration;
///
/// assert_eq!(normalize_narration("  Mira\n\tleft\u{0007}  at dawn. "), "Mira left at dawn.");
/// ```
pub fn normalize_narration(text: &str) -> String {
    text.split(|c: char| c.is_whitespace())
        .map(|word| word.chars().filter(|c| !c.is_control()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Break normalized narration into caption lines.
///
/// Sentences become lines; a sentence longer than `max_line_chars` is split at
/// clause breaks, and a clause still too long is wrapped at word boundaries.
pub fn segment_lines(text: &str, max_line_chars: usize) -> Vec<String> {
    let max = max_line_chars.max(1);
    let mut lines = Vec::new();

    for sentence in segment(text, Granularity::Sentence) {
        let sentence = &text[sentence];
        if sentence.trim().chars().count() <= max {
            push_trimmed(&mut lines, sentence);
            continue;
        }
        for clause in segment(sentence, Granularity::Clause) {
            let clause = &sentence[clause];
            if clause.trim().chars().count() <= max {
                push_trimmed(&mut lines, clause);
            } else {
                wrap_words(&mut lines, clause, max);
            }
        }
    }
    lines
}

fn push_trimmed(lines: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        lines.push(piece.to_string());
    }
}

fn wrap_words(lines: &mut Vec<String>, clause: &str, max: usize) {
    let mut current = String::new();
    for word in clause.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
}

/// Derives per-line caption timing for one scene.
///
/// Duration is shared out by character weight with integer arithmetic: with
/// cumulative character counts `c_i` and total `C`, line `i` spans
/// `[floor(D * c_i / C), floor(D * c_{i+1} / C))` and the last line ends at `D`.
/// Output is deterministic for a given input.
///
/// # Examples
///
/// ```
/// use storyreel_pipeline::SubtitleTimer;
///
/// let timer = SubtitleTimer::new(42);
/// let track = timer.time(1, "Mira ran. Then she stopped.", 3000).unwrap();
/// assert_eq!(track.lines().len(), 2);
/// assert_eq!(track.end_ms(), 3000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubtitleTimer {
    max_line_chars: usize,
}

impl SubtitleTimer {
    /// Create a timer that wraps lines at `max_line_chars`.
    pub fn new(max_line_chars: usize) -> Self {
        Self {
            max_line_chars: max_line_chars.max(1),
        }
    }

    /// Time `narration` against `duration_ms` of audio for `scene`.
    ///
    /// # Errors
    ///
    /// `EmptyNarration` when nothing remains after normalization,
    /// `NonPositiveDuration` when `duration_ms` is zero.
    #[track_caller]
    pub fn time(
        &self,
        scene: u32,
        narration: &str,
        duration_ms: u64,
    ) -> Result<SubtitleTrack, ConsistencyError> {
        let text = normalize_narration(narration);
        let lines = segment_lines(&text, self.max_line_chars);
        if lines.is_empty() {
            return Err(ConsistencyError::new(ConsistencyErrorKind::EmptyNarration));
        }
        if duration_ms == 0 {
            return Err(ConsistencyError::new(
                ConsistencyErrorKind::NonPositiveDuration(scene),
            ));
        }

        let weights: Vec<u128> = lines
            .iter()
            .map(|line| line.chars().count().max(1) as u128)
            .collect();
        let total: u128 = weights.iter().sum();
        let duration = u128::from(duration_ms);
        let last = lines.len() - 1;

        let mut cumulative = 0u128;
        let captions = lines
            .into_iter()
            .zip(weights)
            .enumerate()
            .map(|(i, (line, weight))| {
                let start = duration * cumulative / total;
                cumulative += weight;
                let end = if i == last {
                    duration
                } else {
                    duration * cumulative / total
                };
                // Both bounds are at most `duration_ms`, so they fit in u64.
                CaptionLine::new(start as u64, end as u64, line)
            })
            .collect();

        Ok(SubtitleTrack::new(captions))
    }
}
