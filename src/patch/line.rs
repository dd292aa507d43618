use crate::PatchError;
use std::fmt;
use std::str::FromStr;

/// Text carried by a [`LineStatus::NoNewline`] marker line.
pub const NO_NEWLINE_TEXT: &str = "No newline at end of file";

/// How a line participates in a hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineStatus {
    Added,
    Deleted,
    Unchanged,
    /// `\ No newline at end of file` marker for the preceding line
    NoNewline,
}

impl LineStatus {
    /// Prefix character used in unified-diff text
    pub fn origin(self) -> char {
        match self {
            LineStatus::Added => '+',
            LineStatus::Deleted => '-',
            LineStatus::Unchanged => ' ',
            LineStatus::NoNewline => '\\',
        }
    }

    /// Decode a unified-diff prefix character
    pub fn from_origin(origin: char) -> Option<Self> {
        match origin {
            '+' => Some(LineStatus::Added),
            '-' => Some(LineStatus::Deleted),
            ' ' => Some(LineStatus::Unchanged),
            '\\' => Some(LineStatus::NoNewline),
            _ => None,
        }
    }

    /// Status seen from the opposite side of the change
    pub fn invert(self) -> Self {
        match self {
            LineStatus::Added => LineStatus::Deleted,
            LineStatus::Deleted => LineStatus::Added,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineStatus::Added => "added",
            LineStatus::Deleted => "deleted",
            LineStatus::Unchanged => "unchanged",
            LineStatus::NoNewline => "nonewline",
        }
    }
}

impl FromStr for LineStatus {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "added" => Ok(LineStatus::Added),
            "deleted" => Ok(LineStatus::Deleted),
            "unchanged" => Ok(LineStatus::Unchanged),
            "nonewline" => Ok(LineStatus::NoNewline),
            _ => Err(PatchError::UnknownLineStatus {
                status: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for LineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single line of a hunk.
///
/// Line numbers are `None` on the side where the line does not exist: added
/// lines have no old number, deleted lines no new number, and no-newline
/// markers have neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    text: String,
    status: LineStatus,
    old_line_number: Option<u32>,
    new_line_number: Option<u32>,
}

impl Line {
    pub fn new(
        text: impl Into<String>,
        status: LineStatus,
        old_line_number: Option<u32>,
        new_line_number: Option<u32>,
    ) -> Self {
        Self {
            text: text.into(),
            status,
            old_line_number,
            new_line_number,
        }
    }

    pub fn added(text: impl Into<String>, new_line_number: u32) -> Self {
        Self::new(text, LineStatus::Added, None, Some(new_line_number))
    }

    pub fn deleted(text: impl Into<String>, old_line_number: u32) -> Self {
        Self::new(text, LineStatus::Deleted, Some(old_line_number), None)
    }

    pub fn unchanged(text: impl Into<String>, old_line_number: u32, new_line_number: u32) -> Self {
        Self::new(
            text,
            LineStatus::Unchanged,
            Some(old_line_number),
            Some(new_line_number),
        )
    }

    /// The `\ No newline at end of file` marker
    pub fn no_newline() -> Self {
        Self::new(NO_NEWLINE_TEXT, LineStatus::NoNewline, None, None)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn status(&self) -> LineStatus {
        self.status
    }

    pub fn old_line_number(&self) -> Option<u32> {
        self.old_line_number
    }

    pub fn new_line_number(&self) -> Option<u32> {
        self.new_line_number
    }

    pub fn origin(&self) -> char {
        self.status.origin()
    }

    /// Whether the line is an addition or a deletion
    #[must_use]
    pub fn is_changed(&self) -> bool {
        matches!(self.status, LineStatus::Added | LineStatus::Deleted)
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: LineStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_old_line_number(mut self, old_line_number: Option<u32>) -> Self {
        self.old_line_number = old_line_number;
        self
    }

    #[must_use]
    pub fn with_new_line_number(mut self, new_line_number: Option<u32>) -> Self {
        self.new_line_number = new_line_number;
        self
    }

    /// The same line as seen by the reverse patch: additions become deletions
    /// and the old/new line numbers trade places.
    #[must_use]
    pub fn invert(&self) -> Self {
        Self {
            text: self.text.clone(),
            status: self.status.invert(),
            old_line_number: self.new_line_number,
            new_line_number: self.old_line_number,
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.status == LineStatus::NoNewline {
            write!(f, "{} {}", self.origin(), self.text)
        } else {
            write!(f, "{}{}", self.origin(), self.text)
        }
    }
}
