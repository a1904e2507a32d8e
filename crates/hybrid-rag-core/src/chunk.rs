//! Recursive-boundary text splitter with overlap.
//!
//! Splits parsed document text into bounded segments that overlap by a
//! fixed number of characters. Segments are borrowed slices of the input
//! and are produced lazily.
//!
//! # Algorithm
//!
//! 1. Take a window of `size` characters starting at the current position.
//! 2. If the rest of the text fits in the window, emit it and stop.
//! 3. Otherwise cut after the last paragraph break (`\n\n`) in the window,
//!    else the last line break, else the last sentence end (`. `), else the
//!    last space. A boundary inside the first `overlap + 1` characters is
//!    ignored so every step makes progress.
//! 4. With no usable boundary, an unbroken word longer than `size` that
//!    crosses the window edge is kept whole; anything else is cut at exactly
//!    `size` characters.
//! 5. The next segment starts `overlap` characters before the cut.
//!
//! Lengths are counted in characters and every cut lands on a UTF-8
//! boundary. Dropping each segment's [`Segment::overlap`] prefix and
//! concatenating reproduces the input exactly.
//!
//! # Example
//!
//! ```rust
//! use hybrid_rag_core::chunk::TextSplitter;
//!
//! let splitter = TextSplitter::new(400, 50).unwrap();
//! let segments: Vec<_> = splitter.split("Hello world.\n\nSecond paragraph.").collect();
//! assert_eq!(segments.len(), 1);
//! assert_eq!(segments[0].overlap, 0);
//! ```

use crate::error::{Error, Result};

/// Boundaries in order of preference.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Splitter configuration: window `size` and `overlap`, both in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    size: usize,
    overlap: usize,
}

impl TextSplitter {
    /// Requires `size > 0` and `overlap < size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 || overlap >= size {
            return Err(Error::InvalidChunking { size, overlap });
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Lazily split `text`. Empty input yields no segments.
    pub fn split<'a>(&self, text: &'a str) -> Segments<'a> {
        Segments {
            text,
            size: self.size,
            overlap: self.overlap,
            next: (!text.is_empty()).then_some((0, 0)),
        }
    }
}

/// One segment of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    /// Byte offset of `text` within the input.
    pub start: usize,
    /// Leading characters shared with the previous segment (0 for the first).
    pub overlap: usize,
}

impl<'a> Segment<'a> {
    /// The part of this segment not already covered by its predecessor.
    pub fn fresh(&self) -> &'a str {
        let skip = self
            .text
            .char_indices()
            .nth(self.overlap)
            .map_or(self.text.len(), |(i, _)| i);
        &self.text[skip..]
    }
}

/// Iterator returned by [`TextSplitter::split`].
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    text: &'a str,
    size: usize,
    overlap: usize,
    /// Byte start of the next segment and the overlap it carries.
    next: Option<(usize, usize)>,
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Segment<'a>> {
        let (start, shared) = self.next.take()?;
        let rest = &self.text[start..];

        let end = match char_offset(rest, self.size) {
            None => self.text.len(),
            Some(window) => self.cut(start, start + window),
        };

        if end < self.text.len() {
            self.next = Some((back_chars(self.text, end, self.overlap), self.overlap));
        }

        Some(Segment {
            text: &self.text[start..end],
            start,
            overlap: shared,
        })
    }
}

impl Segments<'_> {
    /// Choose the end of the segment starting at `start` whose full window
    /// ends at `window_end`.
    fn cut(&self, start: usize, window_end: usize) -> usize {
        let rest = &self.text[start..];
        let min_end = start + char_offset(rest, self.overlap + 1).unwrap_or(rest.len());
        let window = &self.text[start..window_end];

        for sep in SEPARATORS {
            if let Some(i) = window.rfind(sep) {
                let brk = start + i + sep.len();
                if brk >= min_end {
                    return brk;
                }
            }
        }

        self.long_word_end(window_end).unwrap_or(window_end)
    }

    /// If an unbroken word longer than `size` straddles `window_end`, the end
    /// of that word (plus its trailing whitespace character).
    fn long_word_end(&self, window_end: usize) -> Option<usize> {
        let before = &self.text[..window_end];
        let after = &self.text[window_end..];

        let splits_word = matches!(before.chars().next_back(), Some(c) if !c.is_whitespace())
            && matches!(after.chars().next(), Some(c) if !c.is_whitespace());
        if !splits_word {
            return None;
        }

        let word_start = before
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map_or(0, |(i, c)| i + c.len_utf8());
        let word_end = after
            .find(char::is_whitespace)
            .map_or(self.text.len(), |i| window_end + i);

        if self.text[word_start..word_end].chars().count() <= self.size {
            return None;
        }

        Some(
            self.text[word_end..]
                .chars()
                .next()
                .map_or(word_end, |c| word_end + c.len_utf8()),
        )
    }
}

/// Byte offset of the `n`-th character of `s`, or `None` if `s` has at most `n` characters.
fn char_offset(s: &str, n: usize) -> Option<usize> {
    s.char_indices().nth(n).map(|(i, _)| i)
}

/// Byte offset `n` characters before `end`.
fn back_chars(text: &str, end: usize, n: usize) -> usize {
    if n == 0 {
        return end;
    }
    text[..end]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map_or(0, |(i, _)| i)
}
