//! Caption lines and SubRip rendering.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use storyreel_error::{StorageError, StorageErrorKind};

/// One caption line, timed in milliseconds relative to the start of its track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct CaptionLine {
    start_ms: u64,
    end_ms: u64,
    text: String,
}

impl CaptionLine {
    /// Create a caption line.
    pub fn new(start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
        }
    }

    /// Length of the line on screen.
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Ordered caption lines for a scene or a whole chapter.
///
/// # Examples
///
/// ```
/// use storyreel_core::{CaptionLine, SubtitleTrack};
///
/// let track = SubtitleTrack::new(vec![
///     CaptionLine::new(0, 1200, "The staff was gone."),
///     CaptionLine::new(1200, 2500, "Mira swore to find it."),
/// ]);
/// let srt = track.to_srt();
/// assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:01,200\nThe staff was gone.\n"));
/// assert_eq!(SubtitleTrack::from_srt(&srt).unwrap(), track);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    lines: Vec<CaptionLine>,
}

impl SubtitleTrack {
    /// Create a track from lines.
    pub fn new(lines: Vec<CaptionLine>) -> Self {
        Self { lines }
    }

    /// An empty track, used for scenes without narration.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The caption lines in order.
    pub fn lines(&self) -> &[CaptionLine] {
        &self.lines
    }

    /// Whether the track has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// End of the last line, or zero for an empty track.
    pub fn end_ms(&self) -> u64 {
        self.lines.last().map(|line| line.end_ms).unwrap_or(0)
    }

    /// Copy of the track with every line shifted by `offset_ms`.
    pub fn offset(&self, offset_ms: u64) -> Self {
        Self {
            lines: self
                .lines
                .iter()
                .map(|line| CaptionLine {
                    start_ms: line.start_ms.saturating_add(offset_ms),
                    end_ms: line.end_ms.saturating_add(offset_ms),
                    text: line.text.clone(),
                })
                .collect(),
        }
    }

    /// Concatenate scene tracks placed at the given offsets into one track.
    pub fn merge<'a>(parts: impl IntoIterator<Item = (u64, &'a SubtitleTrack)>) -> Self {
        let lines = parts
            .into_iter()
            .flat_map(|(offset, track)| track.offset(offset).lines)
            .collect();
        Self { lines }
    }

    /// Whether lines are ordered, non-overlapping and inside `[0, duration_ms]`.
    pub fn is_well_formed(&self, duration_ms: u64) -> bool {
        let mut cursor = 0;
        for line in &self.lines {
            if line.start_ms < cursor || line.end_ms < line.start_ms || line.end_ms > duration_ms {
                return false;
            }
            cursor = line.end_ms;
        }
        true
    }

    /// Render as SubRip text.
    pub fn to_srt(&self) -> String {
        let mut out = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            // Writing into a String cannot fail.
            let _ = writeln!(out, "{}", i + 1);
            let _ = writeln!(
                out,
                "{} --> {}",
                format_srt_time(line.start_ms),
                format_srt_time(line.end_ms)
            );
            let _ = writeln!(out, "{}", line.text);
            out.push('\n');
        }
        out
    }

    /// Parse SubRip text.
    ///
    /// # Errors
    ///
    /// Returns a `FileRead` storage error if a cue is malformed.
    #[track_caller]
    pub fn from_srt(text: &str) -> Result<Self, StorageError> {
        let malformed = |detail: String| {
            StorageError::new(StorageErrorKind::FileRead(format!("malformed SRT: {}", detail)))
        };

        let normalized = text.replace("\r\n", "\n");
        let mut lines = Vec::new();
        for block in normalized.split("\n\n") {
            let mut rows = block.lines().filter(|row| !row.trim().is_empty());
            let Some(first) = rows.next() else {
                continue;
            };
            // The sequence number is optional in practice; accept cues that start with timing.
            let timing = if first.contains("-->") {
                first
            } else {
                rows.next()
                    .ok_or_else(|| malformed(format!("cue '{}' has no timing", first)))?
            };
            let (start, end) = timing
                .split_once("-->")
                .ok_or_else(|| malformed(format!("bad timing line '{}'", timing)))?;
            let start_ms = parse_srt_time(start.trim())
                .ok_or_else(|| malformed(format!("bad timestamp '{}'", start.trim())))?;
            let end_ms = parse_srt_time(end.trim())
                .ok_or_else(|| malformed(format!("bad timestamp '{}'", end.trim())))?;
            let text = rows.collect::<Vec<_>>().join("\n");
            lines.push(CaptionLine {
                start_ms,
                end_ms,
                text,
            });
        }
        Ok(Self { lines })
    }
}

/// Format milliseconds as `HH:MM:SS,mmm`.
///
/// # Examples
///
/// ```
/// use storyreel_core::format_srt_time;
///
/// assert_eq!(format_srt_time(3_723_045), "01:02:03,045");
/// ```
pub fn format_srt_time(total_ms: u64) -> String {
    let ms = total_ms % 1000;
    let total_sec = total_ms / 1000;
    let s = total_sec % 60;
    let total_min = total_sec / 60;
    let m = total_min % 60;
    let h = total_min / 60;
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

/// Parse `HH:MM:SS,mmm` (a `.` separator is also accepted) into milliseconds.
pub fn parse_srt_time(text: &str) -> Option<u64> {
    let (clock, millis) = text.split_once([',', '.'])?;
    let mut fields = clock.split(':');
    let h: u64 = fields.next()?.parse().ok()?;
    let m: u64 = fields.next()?.parse().ok()?;
    let s: u64 = fields.next()?.parse().ok()?;
    if fields.next().is_some() || m >= 60 || s >= 60 || millis.len() != 3 {
        return None;
    }
    let ms: u64 = millis.parse().ok()?;
    Some(((h * 60 + m) * 60 + s) * 1000 + ms)
}
