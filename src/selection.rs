//! Line selections and the `HUNK[:LINES]` syntax used to write them.
//!
//! Lines are addressed by position: a [`LineHandle`] names the hunk index and
//! the line index within that hunk of a [`FilePatch`]. Handles stay valid for
//! as long as the patch they were taken from, and two equal handles always
//! name the same line.
//!
//! # Syntax
//!
//! The command line accepts selections as `HUNK` or `HUNK:LINES` where:
//! - `HUNK` is a 1-based hunk number; alone it selects the whole hunk
//! - `LINES` is a comma-separated list of 1-based line numbers within the hunk
//!
//! # Line Reference Types
//!
//! - `N` - Line N of the hunk
//! - `N..M` - Lines N through M (inclusive)
//!
//! # Examples
//!
//! ```
//! use line_stager::selection::{parse_selection, LineRef};
//! use std::num::NonZeroU32;
//!
//! let whole = parse_selection("2").unwrap();
//! assert_eq!(whole.hunk, NonZeroU32::new(2).unwrap());
//! assert!(whole.lines.is_empty());
//!
//! let partial = parse_selection("1:2..4,7").unwrap();
//! assert_eq!(partial.lines, vec![
//!     LineRef::Range(NonZeroU32::new(2).unwrap(), NonZeroU32::new(4).unwrap()),
//!     LineRef::Single(NonZeroU32::new(7).unwrap()),
//! ]);
//! ```

use crate::patch::{FilePatch, PatchError};
use error_set::error_set;
use std::collections::BTreeSet;
use std::num::NonZeroU32;

error_set! {
    /// Errors from parsing `HUNK[:LINES]` syntax
    SelectionError := {
        /// Hunk number before the colon is empty or whitespace
        #[display("Invalid selection '{input}': hunk number cannot be empty")]
        EmptyHunk { input: String },
        /// A colon was given without any line references after it
        #[display("No line references provided in '{input}'")]
        EmptyRefs { input: String },
        /// Number could not be parsed as a valid non-zero u32
        #[display("Invalid number '{value}'")]
        InvalidNumber { value: String },
        /// Range has start greater than end
        #[display("Invalid range {start}..{end}: start must be <= end")]
        InvalidRange { start: u32, end: u32 },
    }
}

/// Position of a line inside a [`FilePatch`] (0-based hunk and line index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineHandle {
    pub hunk: usize,
    pub line: usize,
}

impl LineHandle {
    pub fn new(hunk: usize, line: usize) -> Self {
        Self { hunk, line }
    }
}

/// An ordered set of selected lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    handles: BTreeSet<LineHandle>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handle, returning whether it was newly inserted
    pub fn insert(&mut self, handle: LineHandle) -> bool {
        self.handles.insert(handle)
    }

    pub fn contains(&self, handle: LineHandle) -> bool {
        self.handles.contains(&handle)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = LineHandle> + '_ {
        self.handles.iter().copied()
    }
}

impl FromIterator<LineHandle> for Selection {
    fn from_iter<T: IntoIterator<Item = LineHandle>>(iter: T) -> Self {
        Self {
            handles: iter.into_iter().collect(),
        }
    }
}

impl Extend<LineHandle> for Selection {
    fn extend<T: IntoIterator<Item = LineHandle>>(&mut self, iter: T) {
        self.handles.extend(iter);
    }
}

/// A reference to lines of one hunk, 1-based
#[derive(Debug, Clone, PartialEq)]
pub enum LineRef {
    /// A single line
    Single(NonZeroU32),
    /// Line range (inclusive start and end)
    Range(NonZeroU32, NonZeroU32),
}

impl LineRef {
    fn contains(&self, number: u32) -> bool {
        match self {
            LineRef::Single(n) => n.get() == number,
            LineRef::Range(start, end) => start.get() <= number && number <= end.get(),
        }
    }
}

/// Parsed `HUNK[:LINES]` selection.
///
/// An empty `lines` list selects every line of the hunk.
#[derive(Debug, Clone, PartialEq)]
pub struct HunkRef {
    /// 1-based hunk number
    pub hunk: NonZeroU32,
    /// Line references within the hunk
    pub lines: Vec<LineRef>,
}

impl HunkRef {
    /// Resolve against a patch into 0-based line handles.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::HunkNotFound`] when the hunk does not exist and
    /// [`PatchError::LineNotFound`] when a referenced line is past the end of
    /// the hunk.
    pub fn resolve(&self, patch: &FilePatch) -> Result<Selection, PatchError> {
        let hunk_index = self.hunk.get() as usize - 1;
        let hunk = patch.hunk(hunk_index)?;

        if self.lines.is_empty() {
            return patch.select_hunk(hunk_index);
        }

        let line_count = hunk.lines().len();
        for line_ref in &self.lines {
            let last = match line_ref {
                LineRef::Single(n) => n.get() as usize,
                LineRef::Range(_, end) => end.get() as usize,
            };
            if last > line_count {
                return Err(PatchError::LineNotFound {
                    hunk: hunk_index,
                    line: last - 1,
                });
            }
        }

        Ok((0..line_count)
            .filter(|&i| self.lines.iter().any(|r| r.contains(i as u32 + 1)))
            .map(|i| LineHandle::new(hunk_index, i))
            .collect())
    }
}

/// Parse a `HUNK[:LINES]` string into structured data.
///
/// # Examples
///
/// ```
/// use line_stager::selection::{parse_selection, LineRef};
/// use std::num::NonZeroU32;
///
/// let selection = parse_selection("3:5").unwrap();
/// assert_eq!(selection.hunk, NonZeroU32::new(3).unwrap());
/// assert_eq!(selection.lines, vec![LineRef::Single(NonZeroU32::new(5).unwrap())]);
/// ```
///
/// # Errors
///
/// Returns [`SelectionError`] if:
/// - The hunk number is empty
/// - A colon is present but no line references follow
/// - Numbers are invalid or zero
/// - A range is inverted
pub fn parse_selection(input: &str) -> Result<HunkRef, SelectionError> {
    let (hunk_part, lines_part) = match input.split_once(':') {
        Some((hunk, lines)) => (hunk, Some(lines)),
        None => (input, None),
    };

    let hunk_part = hunk_part.trim();
    if hunk_part.is_empty() {
        return Err(SelectionError::EmptyHunk {
            input: input.to_string(),
        });
    }

    let lines = match lines_part {
        Some(lines) => {
            let refs = parse_line_refs(lines)?;
            if refs.is_empty() {
                return Err(SelectionError::EmptyRefs {
                    input: input.to_string(),
                });
            }
            refs
        }
        None => Vec::new(),
    };

    Ok(HunkRef {
        hunk: parse_number(hunk_part)?,
        lines,
    })
}

/// Parse the line references part (after the colon)
/// Examples: "3", "1..4", "1,3..5"
fn parse_line_refs(input: &str) -> Result<Vec<LineRef>, SelectionError> {
    input
        .split(',')
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .map(parse_single_ref)
        .collect()
}

/// Parse a single line reference (number or range)
fn parse_single_ref(input: &str) -> Result<LineRef, SelectionError> {
    if let Some((start_str, end_str)) = input.split_once("..") {
        let start = parse_number(start_str)?;
        let end = parse_number(end_str)?;
        if start > end {
            return Err(SelectionError::InvalidRange {
                start: start.get(),
                end: end.get(),
            });
        }
        Ok(LineRef::Range(start, end))
    } else {
        Ok(LineRef::Single(parse_number(input)?))
    }
}

fn parse_number(input: &str) -> Result<NonZeroU32, SelectionError> {
    input
        .trim()
        .parse::<NonZeroU32>()
        .map_err(|_| SelectionError::InvalidNumber {
            value: input.to_string(),
        })
}
