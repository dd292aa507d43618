use super::hunk::Hunk;
use super::line::{Line, LineStatus};
use super::quote::{quote, unquote};
use super::{ParseError, PatchError, split_lines};
use crate::selection::{LineHandle, Selection};
use std::fmt;
use std::str::FromStr;

/// What happened to the file as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileStatus {
    Modified,
    Added,
    Deleted,
}

impl FileStatus {
    /// Status of the reverse change
    pub fn invert(self) -> Self {
        match self {
            FileStatus::Modified => FileStatus::Modified,
            FileStatus::Added => FileStatus::Deleted,
            FileStatus::Deleted => FileStatus::Added,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Modified => "modified",
            FileStatus::Added => "added",
            FileStatus::Deleted => "deleted",
        }
    }
}

impl FromStr for FileStatus {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "modified" => Ok(FileStatus::Modified),
            "added" => Ok(FileStatus::Added),
            "deleted" => Ok(FileStatus::Deleted),
            _ => Err(PatchError::UnknownFileStatus {
                status: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All hunks of one file, plus where the file lives before and after.
///
/// A `None` old path means the file did not exist before the change, a `None`
/// new path means it no longer exists afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    old_path: Option<String>,
    new_path: Option<String>,
    status: FileStatus,
    hunks: Vec<Hunk>,
    changed_line_count: usize,
}

impl FilePatch {
    pub fn new(
        old_path: Option<String>,
        new_path: Option<String>,
        status: FileStatus,
        hunks: Vec<Hunk>,
    ) -> Self {
        let changed_line_count = hunks.iter().map(Hunk::changed_line_count).sum();
        Self {
            old_path,
            new_path,
            status,
            hunks,
            changed_line_count,
        }
    }

    /// Parse a single-file section of `git diff` output.
    ///
    /// Accepts the `diff --git` line and extended headers (`new file mode`,
    /// `deleted file mode`, `rename from`/`rename to`, `index`, ...), the
    /// `---`/`+++` path lines, and any number of hunks. A section without hunks
    /// (binary or mode-only change) yields a patch with no hunks.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when a hunk is malformed, no path can be found,
    /// or the paths contradict the file status.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut lines = split_lines(text).peekable();
        let section = split_lines(text).next().unwrap_or_default().to_string();

        let mut git_paths: (Option<String>, Option<String>) = (None, None);
        let mut old_path: Option<Option<String>> = None;
        let mut new_path: Option<Option<String>> = None;
        let mut status = None;

        while let Some(&line) = lines.peek() {
            if line.starts_with("@@ ") {
                break;
            }
            lines.next();

            if let Some(paths) = line.strip_prefix("diff --git ") {
                git_paths = split_git_paths(paths);
            } else if line.starts_with("new file mode") {
                status = Some(FileStatus::Added);
            } else if line.starts_with("deleted file mode") {
                status = Some(FileStatus::Deleted);
            } else if let Some(path) = line.strip_prefix("rename from ") {
                git_paths.0 = Some(plain_path(path));
            } else if let Some(path) = line.strip_prefix("rename to ") {
                git_paths.1 = Some(plain_path(path));
            } else if let Some(path) = line.strip_prefix("--- ") {
                old_path = Some(header_path(path, "a/"));
            } else if let Some(path) = line.strip_prefix("+++ ") {
                new_path = Some(header_path(path, "b/"));
            }
            // index, mode, similarity and binary lines carry nothing we need
        }

        let mut old_path = old_path.unwrap_or(git_paths.0);
        let mut new_path = new_path.unwrap_or(git_paths.1);

        let status = match status {
            Some(status) => status,
            None => match (&old_path, &new_path) {
                (None, Some(_)) => FileStatus::Added,
                (Some(_), None) => FileStatus::Deleted,
                _ => FileStatus::Modified,
            },
        };
        match status {
            FileStatus::Added => old_path = None,
            FileStatus::Deleted => new_path = None,
            FileStatus::Modified => {}
        }

        if old_path.is_none() && new_path.is_none() {
            return Err(ParseError::MissingFilePath { section });
        }

        let mut hunks = Vec::new();
        while let Some(&line) = lines.peek() {
            if line.starts_with("@@ ") {
                hunks.push(Hunk::parse_lines(&mut lines)?);
            } else if line.is_empty() {
                lines.next();
            } else {
                return Err(ParseError::UnexpectedLine {
                    line: line.to_string(),
                });
            }
        }

        let patch = Self::new(old_path, new_path, status, hunks);
        patch.validate()?;

        log::trace!(
            "parsed {} patch for {} with {} hunks",
            patch.status,
            patch.path().unwrap_or_default(),
            patch.hunks.len()
        );

        Ok(patch)
    }

    pub fn old_path(&self) -> Option<&str> {
        self.old_path.as_deref()
    }

    pub fn new_path(&self) -> Option<&str> {
        self.new_path.as_deref()
    }

    /// Old path if the file existed before, otherwise the new path
    pub fn path(&self) -> Option<&str> {
        self.old_path().or(self.new_path())
    }

    pub fn status(&self) -> FileStatus {
        self.status
    }

    pub fn hunks(&self) -> &[Hunk] {
        &self.hunks
    }

    /// Number of added and deleted lines across all hunks
    pub fn changed_line_count(&self) -> usize {
        self.changed_line_count
    }

    /// Look up a hunk by 0-based index
    pub fn hunk(&self, index: usize) -> Result<&Hunk, PatchError> {
        self.hunks.get(index).ok_or(PatchError::HunkNotFound {
            hunk: index,
            count: self.hunks.len(),
        })
    }

    /// Look up the line a handle points at
    pub fn line(&self, handle: LineHandle) -> Result<&Line, PatchError> {
        self.hunk(handle.hunk)?
            .lines()
            .get(handle.line)
            .ok_or(PatchError::LineNotFound {
                hunk: handle.hunk,
                line: handle.line,
            })
    }

    /// Handles of every line, in order
    pub fn handles(&self) -> impl Iterator<Item = LineHandle> + '_ {
        self.hunks.iter().enumerate().flat_map(|(hunk_index, hunk)| {
            (0..hunk.lines().len()).map(move |line_index| LineHandle::new(hunk_index, line_index))
        })
    }

    /// Handles of every added or deleted line
    pub fn changed_handles(&self) -> impl Iterator<Item = LineHandle> + '_ {
        self.handles()
            .filter(|&handle| self.line(handle).is_ok_and(Line::is_changed))
    }

    /// Select every line of one hunk
    pub fn select_hunk(&self, index: usize) -> Result<Selection, PatchError> {
        let hunk = self.hunk(index)?;
        Ok((0..hunk.lines().len())
            .map(|line_index| LineHandle::new(index, line_index))
            .collect())
    }

    /// Check the path/status pairing and every hunk's row counts
    pub fn validate(&self) -> Result<(), PatchError> {
        let missing = match (self.status, &self.old_path, &self.new_path) {
            (FileStatus::Modified | FileStatus::Deleted, None, _) => Some("old"),
            (FileStatus::Modified | FileStatus::Added, _, None) => Some("new"),
            _ => None,
        };
        if let Some(side) = missing {
            return Err(PatchError::MissingPath {
                status: self.status,
                side,
            });
        }

        match self.hunks.iter().position(|hunk| !hunk.has_consistent_counts()) {
            Some(hunk) => Err(PatchError::InconsistentHunk { hunk }),
            None => Ok(()),
        }
    }

    pub fn stage_patch_for_hunk(&self, index: usize) -> Result<FilePatch, PatchError> {
        Ok(self.stage_patch_for_lines(&self.select_hunk(index)?))
    }

    pub fn unstage_patch_for_hunk(&self, index: usize) -> Result<FilePatch, PatchError> {
        Ok(self.unstage_patch_for_lines(&self.select_hunk(index)?))
    }

    /// Derive the patch that stages only the selected lines.
    ///
    /// The result applies to the old side of this patch (the index). Selected
    /// changes are kept; an unselected deletion turns into context because
    /// the line stays in the index; an unselected addition disappears. New-side
    /// line numbers are renumbered and the drift in row counts is carried
    /// into the start row of every later hunk. Hunks without selected lines
    /// are left out.
    ///
    /// Handles that do not point into this patch are ignored.
    #[must_use]
    pub fn stage_patch_for_lines(&self, selection: &Selection) -> FilePatch {
        if self.selects_every_change(selection) {
            log::debug!("staging every change of {}", self.display_path());
            return self.clone();
        }

        let mut delta: i64 = 0;
        let mut hunks = Vec::new();

        for (hunk_index, hunk) in self.hunks.iter().enumerate() {
            let new_start_row = shift(hunk.new_start_row().max(1), delta);
            let mut new_line_number = new_start_row;
            let mut lines = Vec::with_capacity(hunk.lines().len());
            let mut contains_selected_lines = false;

            // the source line before a marker decides whether the marker survives
            let mut keep_marker = true;
            let mut readded = None;

            for (line_index, line) in hunk.lines().iter().enumerate() {
                let selected = selection.contains(LineHandle::new(hunk_index, line_index));

                match (line.status(), selected) {
                    (LineStatus::NoNewline, _) => {
                        if keep_marker {
                            lines.push(
                                line.clone()
                                    .with_old_line_number(None)
                                    .with_new_line_number(None),
                            );
                        }
                        lines.extend(readded.take());
                    }
                    (LineStatus::Deleted, true) => {
                        contains_selected_lines = true;
                        keep_marker = true;
                        lines.push(line.clone());
                    }
                    (LineStatus::Added | LineStatus::Unchanged, true) => {
                        contains_selected_lines = true;
                        keep_marker = true;
                        lines.push(line.clone().with_new_line_number(Some(new_line_number)));
                        new_line_number = new_line_number.saturating_add(1);
                    }
                    (LineStatus::Deleted, false)
                        if owns_marker(hunk, line_index)
                            && hunk.lines()[line_index + 1..].iter().enumerate().any(
                                |(offset, later)| {
                                    later.status() == LineStatus::Added
                                        && selection.contains(LineHandle::new(
                                            hunk_index,
                                            line_index + 1 + offset,
                                        ))
                                },
                            ) =>
                    {
                        // the kept last line gains a newline: delete it and add it back
                        keep_marker = true;
                        lines.push(line.clone());
                        readded = Some(
                            line.clone()
                                .with_status(LineStatus::Added)
                                .with_old_line_number(None)
                                .with_new_line_number(Some(new_line_number)),
                        );
                        new_line_number = new_line_number.saturating_add(1);
                    }
                    (LineStatus::Deleted, false) => {
                        keep_marker = true;
                        lines.push(
                            line.clone()
                                .with_status(LineStatus::Unchanged)
                                .with_new_line_number(Some(new_line_number)),
                        );
                        new_line_number = new_line_number.saturating_add(1);
                    }
                    (LineStatus::Unchanged, false) => {
                        keep_marker = true;
                        lines.push(line.clone().with_new_line_number(Some(new_line_number)));
                        new_line_number = new_line_number.saturating_add(1);
                    }
                    (LineStatus::Added, false) => keep_marker = false,
                }
            }

            let new_row_count = new_line_number - new_start_row;
            if contains_selected_lines {
                let staged = Hunk::new(
                    hunk.old_start_row(),
                    new_start_row,
                    hunk.old_row_count(),
                    new_row_count,
                    hunk.section_heading(),
                    lines,
                );
                debug_assert!(
                    !hunk.has_consistent_counts() || staged.has_consistent_counts(),
                    "staged hunk {hunk_index} lost its row-count invariant"
                );
                hunks.push(staged);
            }
            delta += i64::from(new_row_count) - i64::from(hunk.new_row_count());
        }

        log::debug!(
            "staging {} of {} changed lines in {}: {} hunks",
            self.selected_change_count(selection),
            self.changed_line_count,
            self.display_path(),
            hunks.len()
        );

        FilePatch::new(
            self.old_path.clone(),
            self.new_path.clone().or_else(|| self.old_path.clone()),
            self.status,
            hunks,
        )
    }

    /// Derive the patch that unstages only the selected lines.
    ///
    /// Mirror image of [`FilePatch::stage_patch_for_lines`] on the old side:
    /// an unselected addition stays as context, an unselected deletion
    /// disappears, and old-side line numbers are renumbered. The result is
    /// inverted with [`FilePatch::unstage_patch`] so that it applies to the
    /// new side of this patch (the index).
    #[must_use]
    pub fn unstage_patch_for_lines(&self, selection: &Selection) -> FilePatch {
        if self.selects_every_change(selection) {
            log::debug!("unstaging every change of {}", self.display_path());
            return self.unstage_patch();
        }

        let mut delta: i64 = 0;
        let mut hunks = Vec::new();

        for (hunk_index, hunk) in self.hunks.iter().enumerate() {
            let old_start_row = shift(hunk.old_start_row().max(1), delta);
            let mut old_line_number = old_start_row;
            let mut lines = Vec::with_capacity(hunk.lines().len());
            let mut contains_selected_lines = false;

            let mut keep_marker = true;

            for (line_index, line) in hunk.lines().iter().enumerate() {
                let selected = selection.contains(LineHandle::new(hunk_index, line_index));

                match (line.status(), selected) {
                    (LineStatus::NoNewline, _) => {
                        if keep_marker {
                            lines.push(
                                line.clone()
                                    .with_old_line_number(None)
                                    .with_new_line_number(None),
                            );
                        }
                    }
                    (LineStatus::Added, true) => {
                        contains_selected_lines = true;
                        keep_marker = true;
                        lines.push(line.clone());
                    }
                    (LineStatus::Deleted | LineStatus::Unchanged, true) => {
                        contains_selected_lines = true;
                        // an old-side row kept after this one means it is no longer last
                        keep_marker = line.status() != LineStatus::Deleted
                            || !owns_marker(hunk, line_index)
                            || !hunk.lines()[line_index + 1..].iter().enumerate().any(
                                |(offset, later)| {
                                    later.status() == LineStatus::Added
                                        && !selection.contains(LineHandle::new(
                                            hunk_index,
                                            line_index + 1 + offset,
                                        ))
                                },
                            );
                        lines.push(line.clone().with_old_line_number(Some(old_line_number)));
                        old_line_number = old_line_number.saturating_add(1);
                    }
                    (LineStatus::Added, false) => {
                        keep_marker = true;
                        lines.push(
                            line.clone()
                                .with_status(LineStatus::Unchanged)
                                .with_old_line_number(Some(old_line_number)),
                        );
                        old_line_number = old_line_number.saturating_add(1);
                    }
                    (LineStatus::Unchanged, false) => {
                        keep_marker = true;
                        lines.push(line.clone().with_old_line_number(Some(old_line_number)));
                        old_line_number = old_line_number.saturating_add(1);
                    }
                    (LineStatus::Deleted, false) => keep_marker = false,
                }
            }

            let old_row_count = old_line_number - old_start_row;
            if contains_selected_lines {
                let unstaged = Hunk::new(
                    old_start_row,
                    hunk.new_start_row(),
                    old_row_count,
                    hunk.new_row_count(),
                    hunk.section_heading(),
                    lines,
                );
                debug_assert!(
                    !hunk.has_consistent_counts() || unstaged.has_consistent_counts(),
                    "unstaged hunk {hunk_index} lost its row-count invariant"
                );
                hunks.push(unstaged);
            }
            delta += i64::from(old_row_count) - i64::from(hunk.old_row_count());
        }

        log::debug!(
            "unstaging {} of {} changed lines in {}: {} hunks",
            self.selected_change_count(selection),
            self.changed_line_count,
            self.display_path(),
            hunks.len()
        );

        FilePatch::new(
            self.old_path.clone().or_else(|| self.new_path.clone()),
            self.new_path.clone(),
            self.status,
            hunks,
        )
        .unstage_patch()
    }

    /// The patch that undoes this one: paths swap, added and deleted trade
    /// places, and every hunk is inverted.
    #[must_use]
    pub fn unstage_patch(&self) -> FilePatch {
        FilePatch::new(
            self.new_path.clone(),
            self.old_path.clone(),
            self.status.invert(),
            self.hunks.iter().map(Hunk::invert).collect(),
        )
    }

    /// `--- a/<old>` and `+++ b/<new>` lines, `/dev/null` for a missing side
    pub fn header_string(&self) -> String {
        let old = match &self.old_path {
            Some(path) => quote(&format!("a/{}", to_git_path_sep(path))).into_owned(),
            None => "/dev/null".to_string(),
        };
        let new = match &self.new_path {
            Some(path) => quote(&format!("b/{}", to_git_path_sep(path))).into_owned(),
            None => "/dev/null".to_string(),
        };
        format!("--- {old}\n+++ {new}\n")
    }

    fn selected_change_count(&self, selection: &Selection) -> usize {
        selection
            .iter()
            .filter_map(|handle| self.line(handle).ok())
            .filter(|line| line.is_changed())
            .count()
    }

    fn selects_every_change(&self, selection: &Selection) -> bool {
        self.selected_change_count(selection) == self.changed_line_count
    }

    fn display_path(&self) -> &str {
        self.path().unwrap_or("/dev/null")
    }
}

/// Move a row by the accumulated drift; malformed counts saturate at zero
fn shift(row: u32, delta: i64) -> u32 {
    u32::try_from(i64::from(row) + delta).unwrap_or(0)
}

/// Whether the line at `index` is followed by a "No newline" marker
fn owns_marker(hunk: &Hunk, index: usize) -> bool {
    hunk.lines()
        .get(index + 1)
        .is_some_and(|next| next.status() == LineStatus::NoNewline)
}

fn to_git_path_sep(path: &str) -> String {
    path.replace(std::path::MAIN_SEPARATOR, "/")
}

/// Split `a/old b/new` from a `diff --git` line, either side possibly quoted
fn split_git_paths(paths: &str) -> (Option<String>, Option<String>) {
    let (old, new) = if let Some((old, rest)) = unquote(paths) {
        (old, plain_path(rest.trim_start()))
    } else if let Some(at) = paths.find(" \"") {
        // an unquoted path never contains a quote
        (paths[..at].to_string(), plain_path(&paths[at + 1..]))
    } else {
        match paths.split_once(" b/") {
            Some((old, new)) => (old.to_string(), format!("b/{new}")),
            None => return (None, None),
        }
    };
    (
        Some(strip_side_prefix(old, "a/")),
        Some(strip_side_prefix(new, "b/")),
    )
}

/// Path from a `---`/`+++` line; `/dev/null` means the side is absent
fn header_path(raw: &str, prefix: &str) -> Option<String> {
    let path = match unquote(raw) {
        Some((path, _)) => path,
        // non-git diffs append a tab and a timestamp
        None => raw.split('\t').next().unwrap_or(raw).to_string(),
    };
    if path == "/dev/null" {
        None
    } else {
        Some(strip_side_prefix(path, prefix))
    }
}

/// Decode a path that may be quoted
fn plain_path(raw: &str) -> String {
    match unquote(raw) {
        Some((path, _)) => path,
        None => raw.to_string(),
    }
}

fn strip_side_prefix(path: String, prefix: &str) -> String {
    let stripped = path.strip_prefix(prefix).map(str::to_string);
    stripped.unwrap_or(path)
}

impl fmt::Display for FilePatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for hunk in &self.hunks {
            write!(f, "{}", hunk)?;
        }
        Ok(())
    }
}
