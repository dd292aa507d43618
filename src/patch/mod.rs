pub mod file;
pub mod full;
pub mod hunk;
pub mod line;
mod quote;

use error_set::error_set;

pub use file::{FilePatch, FileStatus};
pub use full::Diff;
pub use hunk::Hunk;
pub use line::{Line, LineStatus};

error_set! {
    /// Errors from the patch model and its indexing helpers
    PatchError := {
        #[display("Unknown file status '{status}'")]
        UnknownFileStatus { status: String },
        #[display("Unknown line status '{status}'")]
        UnknownLineStatus { status: String },
        #[display("Hunk {hunk} not found: patch has {count} hunks")]
        HunkNotFound { hunk: usize, count: usize },
        #[display("Line {line} not found in hunk {hunk}")]
        LineNotFound { hunk: usize, line: usize },
        /// A path is missing for a status that requires it
        #[display("A {status} file patch is missing its {side} path")]
        MissingPath { status: FileStatus, side: &'static str },
        /// Hunk row counts disagree with its lines
        #[display("Hunk {hunk} row counts do not match its lines")]
        InconsistentHunk { hunk: usize },
    }

    /// Errors from parsing unified-diff text
    ParseError := {
        #[display("Expected a hunk header")]
        MissingHunkHeader,
        #[display("Invalid hunk header '{line}'")]
        InvalidHunkHeader { line: String },
        /// Hunk body does not hold the number of lines its header announces
        #[display("Hunk body does not match header '{header}'")]
        CountMismatch { header: String },
        #[display("Unknown line origin in '{line}'")]
        UnknownLineOrigin { line: String },
        #[display("Unexpected line '{line}'")]
        UnexpectedLine { line: String },
        #[display("No file path found in diff section '{section}'")]
        MissingFilePath { section: String },
        PatchError(PatchError),
    }
}

/// Split diff text on `\n` only, so a `\r` stays part of its line
pub(crate) fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive('\n')
        .map(|line| line.strip_suffix('\n').unwrap_or(line))
}

/// Format a file patch for user display with hunk and line numbers.
///
/// Numbers are 1-based and match the selection syntax accepted by
/// [`crate::selection::parse_selection`].
///
/// Example output:
/// ```text
/// a.txt:
///   [1] @@ -1,1 +1,3 @@
///     1:	+line-1
///     2:	+line-2
///     3:	 line-3
/// ```
pub fn format_patch(patch: &FilePatch) -> String {
    let mut result = String::new();

    result.push_str(patch.path().unwrap_or("/dev/null"));
    result.push_str(":\n");

    for (hunk_index, hunk) in patch.hunks().iter().enumerate() {
        result.push_str(&format!("  [{}] {}\n", hunk_index + 1, hunk.header()));

        for (line_index, line) in hunk.lines().iter().enumerate() {
            if line.status() == LineStatus::NoNewline {
                result.push_str(&format!("        {}\n", line));
            } else {
                result.push_str(&format!("    {}:\t{}\n", line_index + 1, line));
            }
        }

        result.push('\n');
    }

    // Remove trailing newline if present
    if result.ends_with("\n\n") {
        result.pop();
    }

    result
}
