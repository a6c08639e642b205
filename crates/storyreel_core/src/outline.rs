//! Story outline and per-chapter slicing.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Immutable story outline plus an optional style requirement.
///
/// Outlines may carry chapter markers (`Chapter 2: ...` or `第2章 ...`). Text before the
/// first marker is the premise shared by every chapter.
///
/// # Examples
///
/// ```
/// use storyreel_core::Outline;
///
/// let outline = Outline::new("A mage seeks a staff.\nChapter 1: She leaves home.\nChapter 2: The tower.");
/// let slice = outline.slice(2);
/// assert_eq!(slice.premise(), "A mage seeks a staff.");
/// assert_eq!(slice.beat(), Some("The tower."));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct Outline {
    text: String,
    requirement: Option<String>,
}

/// The part of an outline relevant to one chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct OutlineSlice {
    /// Chapter index (1-based)
    chapter: u32,
    /// Shared premise, or the whole outline when it has no chapter markers
    #[getter(skip)]
    premise: String,
    /// Beat written for this chapter, if the outline has one
    #[getter(skip)]
    beat: Option<String>,
    /// Style requirement carried over from the outline
    requirement: Option<String>,
}

impl OutlineSlice {
    /// Beat for this chapter.
    pub fn beat(&self) -> Option<&str> {
        self.beat.as_deref()
    }

    /// Premise text.
    pub fn premise(&self) -> &str {
        &self.premise
    }
}

impl Outline {
    /// Create an outline without a requirement.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into().trim().to_string(),
            requirement: None,
        }
    }

    /// Attach a style requirement (for example "dark fantasy, no gore").
    pub fn with_requirement(mut self, requirement: impl Into<String>) -> Self {
        let requirement = requirement.into();
        let trimmed = requirement.trim();
        self.requirement = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// Whether the outline has any content.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Slice the outline for chapter `chapter`.
    pub fn slice(&self, chapter: u32) -> OutlineSlice {
        let mut premise = Vec::new();
        let mut beats: Vec<(u32, Vec<&str>)> = Vec::new();

        for line in self.text.lines() {
            match parse_marker(line) {
                Some((number, rest)) => {
                    let mut body = Vec::new();
                    if !rest.is_empty() {
                        body.push(rest);
                    }
                    beats.push((number, body));
                }
                None => match beats.last_mut() {
                    Some((_, body)) => body.push(line.trim()),
                    None => premise.push(line.trim()),
                },
            }
        }

        let premise = if beats.is_empty() {
            self.text.clone()
        } else {
            join_lines(&premise)
        };
        let beat = beats
            .into_iter()
            .find(|(number, _)| *number == chapter)
            .map(|(_, body)| join_lines(&body))
            .filter(|beat| !beat.is_empty());

        OutlineSlice {
            chapter,
            premise,
            beat,
            requirement: self.requirement.clone(),
        }
    }
}

fn join_lines(lines: &[&str]) -> String {
    lines
        .iter()
        .filter(|line| !line.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Recognize `Chapter N[:.-]` and `第N章` at the start of a line.
static CHAPTER_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?i:chapter)\s*(\d+)|第\s*(\d+)\s*章)")
        .expect("Valid chapter marker regex")
});

fn parse_marker(line: &str) -> Option<(u32, &str)> {
    let line = line.trim();
    let captures = CHAPTER_MARKER.captures(line)?;
    let number = captures
        .get(1)
        .or_else(|| captures.get(2))?
        .as_str()
        .parse()
        .ok()?;
    let end = captures.get(0)?.end();
    Some((number, strip_separator(&line[end..])))
}

fn strip_separator(text: &str) -> &str {
    text.trim_start_matches([':', '：', '.', '-', ' ', '\u{3000}']).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outline_without_markers_is_whole_context() {
        let outline = Outline::new("A determined young mage vows to retrieve a lost staff");
        let slice = outline.slice(3);
        assert_eq!(
            slice.premise(),
            "A determined young mage vows to retrieve a lost staff"
        );
        assert_eq!(slice.beat(), None);
        assert_eq!(*slice.chapter(), 3);
    }

    #[test]
    fn test_cjk_markers() {
        let outline = Outline::new("少女踏上旅途。\n第1章：离开村庄\n第2章 进入森林\n遇到狼群");
        assert_eq!(outline.slice(1).beat(), Some("离开村庄"));
        assert_eq!(outline.slice(2).beat(), Some("进入森林\n遇到狼群"));
        assert_eq!(outline.slice(3).beat(), None);
        assert_eq!(outline.slice(3).premise(), "少女踏上旅途。");
    }

    #[test]
    fn test_requirement_is_trimmed() {
        let outline = Outline::new("x").with_requirement("  ");
        assert_eq!(outline.requirement(), &None);
        let outline = Outline::new("x").with_requirement(" dark fantasy ");
        assert_eq!(outline.slice(1).requirement(), &Some("dark fantasy".to_string()));
    }

    #[test]
    fn test_marker_requires_number() {
        assert!(parse_marker("Chapters are long").is_none());
        assert_eq!(parse_marker("CHAPTER 12 - The end"), Some((12, "The end")));
    }
}
