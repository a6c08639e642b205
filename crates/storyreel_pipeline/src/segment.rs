//! Sentence, clause and word segmentation over byte ranges.
//!
//! Every function here returns ranges that tile the input exactly: concatenating
//! the slices in order gives back the original text.

use std::ops::Range;

/// Granularity of a segmentation pass, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Granularity {
    /// Ends after `. ! ? 。 ！ ？`
    Sentence,
    /// Sentences further split after `, ; : ， ； ：`
    Clause,
    /// Clauses further split after whitespace
    Word,
    /// Single characters
    Char,
}

impl Granularity {
    /// Every granularity, coarsest first.
    pub const ALL: [Granularity; 4] = [
        Granularity::Sentence,
        Granularity::Clause,
        Granularity::Word,
        Granularity::Char,
    ];
}

/// Sentence terminators, Latin and CJK.
pub fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '。' | '！' | '？' | '…')
}

/// Clause separators, Latin and CJK.
pub fn is_clause_break(c: char) -> bool {
    matches!(c, ',' | ';' | ':' | '，' | '；' | '：' | '、')
}

fn is_closer(c: char) -> bool {
    matches!(
        c,
        '"' | '\'' | ')' | ']' | '”' | '’' | '」' | '』' | '）' | '》'
    )
}

/// Split after each run of `is_break` characters, keeping trailing closers and
/// whitespace with the preceding piece.
fn split_after(text: &str, offset: usize, is_break: fn(char) -> bool) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_break(c) {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, d)) = chars.peek() {
            if is_break(d) || is_closer(d) {
                end = j + d.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        while let Some(&(j, d)) = chars.peek() {
            if d.is_whitespace() {
                end = j + d.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        ranges.push(offset + start..offset + end);
        start = end;
    }

    if start < text.len() {
        ranges.push(offset + start..offset + text.len());
    }
    ranges
}

fn chars(text: &str, offset: usize) -> Vec<Range<usize>> {
    text.char_indices()
        .map(|(i, c)| offset + i..offset + i + c.len_utf8())
        .collect()
}

/// Segment `text` at `granularity`.
///
/// Finer granularities refine coarser ones, so every sentence boundary is also a
/// clause boundary and so on.
///
/// # Examples
///
/// ```
/// use storyreel_pipeline::{Granularity, segment};
///
/// let text = "Mira ran. The gate, old and grey, creaked!";
/// let sentences: Vec<&str> = segment(text, Granularity::Sentence)
///     .into_iter()
///     .map(|r| &text[r])
///     .collect();
/// assert_eq!(sentences, vec!["Mira ran. ", "The gate, old and grey, creaked!"]);
/// ```
pub fn segment(text: &str, granularity: Granularity) -> Vec<Range<usize>> {
    match granularity {
        Granularity::Sentence => split_after(text, 0, is_sentence_end),
        Granularity::Clause => refine(text, Granularity::Sentence, is_clause_break),
        Granularity::Word => refine(text, Granularity::Clause, char::is_whitespace),
        Granularity::Char => chars(text, 0),
    }
}

fn refine(text: &str, coarser: Granularity, is_break: fn(char) -> bool) -> Vec<Range<usize>> {
    segment(text, coarser)
        .into_iter()
        .flat_map(|range| split_after(&text[range.clone()], range.start, is_break))
        .collect()
}

/// Number of characters in a range of `text`.
pub fn char_len(text: &str, range: &Range<usize>) -> usize {
    text[range.clone()].chars().count()
}
