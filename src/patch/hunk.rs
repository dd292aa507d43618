use super::{ParseError, split_lines};
use super::line::{Line, LineStatus};
use nom::{
    IResult, Parser,
    bytes::complete::tag,
    character::complete::{char, u32 as row},
    combinator::{opt, rest},
    sequence::preceded,
};
use std::fmt;
use std::iter::Peekable;

/// A single hunk of a file patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    old_start_row: u32,
    new_start_row: u32,
    old_row_count: u32,
    new_row_count: u32,
    section_heading: String,
    lines: Vec<Line>,
}

/// Coordinates from an `@@ -a,b +c,d @@ heading` line
#[derive(Debug, PartialEq, Eq)]
struct HunkHeader<'a> {
    old_start: u32,
    old_count: u32,
    new_start: u32,
    new_count: u32,
    heading: &'a str,
}

impl Hunk {
    /// Build a hunk from explicit coordinates.
    ///
    /// Row counts are taken as given: `old_row_count` should equal the number of
    /// unchanged and deleted lines, `new_row_count` the number of unchanged and
    /// added lines. See [`Hunk::has_consistent_counts`].
    pub fn new(
        old_start_row: u32,
        new_start_row: u32,
        old_row_count: u32,
        new_row_count: u32,
        section_heading: impl Into<String>,
        lines: Vec<Line>,
    ) -> Self {
        Self {
            old_start_row,
            new_start_row,
            old_row_count,
            new_row_count,
            section_heading: section_heading.into(),
            lines,
        }
    }

    /// Parse one hunk (header line followed by its body).
    ///
    /// The body must contain exactly the number of old and new lines announced
    /// by the header. Line numbers are assigned from the header start rows.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut lines = split_lines(text).peekable();
        let hunk = Self::parse_lines(&mut lines)?;

        match lines.next() {
            Some(extra) => Err(ParseError::UnexpectedLine {
                line: extra.to_string(),
            }),
            None => Ok(hunk),
        }
    }

    /// Parse a hunk from a stream of diff lines, consuming only its own lines.
    pub(crate) fn parse_lines<'a, I>(lines: &mut Peekable<I>) -> Result<Self, ParseError>
    where
        I: Iterator<Item = &'a str>,
    {
        let header_line = lines.next().ok_or(ParseError::MissingHunkHeader)?;
        let header = parse_header(header_line)?;

        let mut old_left = header.old_count;
        let mut new_left = header.new_count;
        let mut old_number = header.old_start;
        let mut new_number = header.new_start;
        let mut body: Vec<Line> = Vec::new();

        while let Some(&raw) = lines.peek() {
            // Marker for the line right before it, possibly after the counts ran out
            if let Some(marker) = raw.strip_prefix('\\') {
                if body.is_empty() {
                    return Err(ParseError::UnexpectedLine {
                        line: raw.to_string(),
                    });
                }
                lines.next();
                let text = marker.strip_prefix(' ').unwrap_or(marker);
                body.push(Line::new(text, LineStatus::NoNewline, None, None));
                continue;
            }

            if old_left == 0 && new_left == 0 {
                break;
            }
            lines.next();

            // Some tools strip the single space of an empty context line
            let (status, content) = match raw.chars().next() {
                None => (LineStatus::Unchanged, ""),
                Some(origin) => {
                    let status = LineStatus::from_origin(origin).ok_or_else(|| {
                        ParseError::UnknownLineOrigin {
                            line: raw.to_string(),
                        }
                    })?;
                    (status, &raw[origin.len_utf8()..])
                }
            };

            let overflow = match status {
                LineStatus::Added => new_left == 0,
                LineStatus::Deleted => old_left == 0,
                _ => old_left == 0 || new_left == 0,
            };
            if overflow {
                return Err(ParseError::CountMismatch {
                    header: header_line.to_string(),
                });
            }

            match status {
                LineStatus::Added => {
                    body.push(Line::added(content, new_number));
                    new_number += 1;
                    new_left -= 1;
                }
                LineStatus::Deleted => {
                    body.push(Line::deleted(content, old_number));
                    old_number += 1;
                    old_left -= 1;
                }
                LineStatus::Unchanged => {
                    body.push(Line::unchanged(content, old_number, new_number));
                    old_number += 1;
                    new_number += 1;
                    old_left -= 1;
                    new_left -= 1;
                }
                // handled above
                LineStatus::NoNewline => {}
            }
        }

        if old_left != 0 || new_left != 0 {
            return Err(ParseError::CountMismatch {
                header: header_line.to_string(),
            });
        }

        log::trace!(
            "parsed hunk -{},{} +{},{} with {} lines",
            header.old_start,
            header.old_count,
            header.new_start,
            header.new_count,
            body.len()
        );

        Ok(Self::new(
            header.old_start,
            header.new_start,
            header.old_count,
            header.new_count,
            header.heading,
            body,
        ))
    }

    pub fn old_start_row(&self) -> u32 {
        self.old_start_row
    }

    pub fn new_start_row(&self) -> u32 {
        self.new_start_row
    }

    pub fn old_row_count(&self) -> u32 {
        self.old_row_count
    }

    pub fn new_row_count(&self) -> u32 {
        self.new_row_count
    }

    pub fn section_heading(&self) -> &str {
        &self.section_heading
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Number of added and deleted lines
    pub fn changed_line_count(&self) -> usize {
        self.lines.iter().filter(|line| line.is_changed()).count()
    }

    /// `@@ -oldStart,oldCount +newStart,newCount @@`
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start_row, self.old_row_count, self.new_start_row, self.new_row_count
        )
    }

    /// Check the row counts against the lines actually present
    #[must_use]
    pub fn has_consistent_counts(&self) -> bool {
        let (old, new) = self
            .lines
            .iter()
            .fold((0u32, 0u32), |(old, new), line| match line.status() {
                LineStatus::Unchanged => (old + 1, new + 1),
                LineStatus::Deleted => (old + 1, new),
                LineStatus::Added => (old, new + 1),
                LineStatus::NoNewline => (old, new),
            });
        old == self.old_row_count && new == self.new_row_count
    }

    /// Build the hunk that undoes this one.
    ///
    /// Every line is inverted and the old/new coordinates swap. Inverted
    /// additions are held back until the next context line so that within
    /// each change run the deletions come first. A marker travels with the
    /// line it follows.
    #[must_use]
    pub fn invert(&self) -> Self {
        let mut lines = Vec::with_capacity(self.lines.len());
        let mut pending_additions = Vec::new();
        let mut last_held_back = false;

        for line in &self.lines {
            let inverted = line.invert();
            match inverted.status() {
                LineStatus::Added => {
                    pending_additions.push(inverted);
                    last_held_back = true;
                }
                LineStatus::Deleted => {
                    lines.push(inverted);
                    last_held_back = false;
                }
                LineStatus::Unchanged => {
                    lines.append(&mut pending_additions);
                    lines.push(inverted);
                    last_held_back = false;
                }
                LineStatus::NoNewline if last_held_back => pending_additions.push(inverted),
                LineStatus::NoNewline => lines.push(inverted),
            }
        }
        lines.append(&mut pending_additions);

        Self {
            old_start_row: self.new_start_row,
            new_start_row: self.old_start_row,
            old_row_count: self.new_row_count,
            new_row_count: self.old_row_count,
            section_heading: self.section_heading.clone(),
            lines,
        }
    }
}

/// Parse `start[,count]`, where a missing count means one line
fn range(input: &str) -> IResult<&str, (u32, u32)> {
    (row, opt(preceded(char(','), row)))
        .map(|(start, count): (u32, Option<u32>)| (start, count.unwrap_or(1)))
        .parse(input)
}

fn header(input: &str) -> IResult<&str, HunkHeader<'_>> {
    (
        preceded(tag("@@ -"), range),
        preceded(tag(" +"), range),
        preceded(tag(" @@"), rest),
    )
        .map(
            |((old_start, old_count), (new_start, new_count), heading)| HunkHeader {
                old_start,
                old_count,
                new_start,
                new_count,
                heading,
            },
        )
        .parse(input)
}

fn parse_header(line: &str) -> Result<HunkHeader<'_>, ParseError> {
    let invalid = || ParseError::InvalidHunkHeader {
        line: line.to_string(),
    };
    let (_, parsed) = header(line).map_err(|_| invalid())?;

    // every row of the body must be numberable
    if parsed.old_start.checked_add(parsed.old_count).is_none()
        || parsed.new_start.checked_add(parsed.new_count).is_none()
    {
        return Err(invalid());
    }

    Ok(HunkHeader {
        heading: parsed.heading.strip_prefix(' ').unwrap_or(parsed.heading),
        ..parsed
    })
}

impl fmt::Display for Hunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header())?;
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
