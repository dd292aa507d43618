//! Derive partial stage and unstage patches from unified diffs.
//!
//! A [`FilePatch`] holds the hunks of one file. From a set of selected lines
//! it derives the patch that applies only those changes to the index
//! ([`FilePatch::stage_patch_for_lines`]) or removes only those changes from
//! it ([`FilePatch::unstage_patch_for_lines`]). Applying the result is left to
//! the caller, typically `git apply --cached`.

use error_set::error_set;

pub mod patch;
pub mod selection;

pub use patch::{
    Diff, FilePatch, FileStatus, Hunk, Line, LineStatus, ParseError, PatchError, format_patch,
};
pub use selection::{LineHandle, Selection, SelectionError, parse_selection};

error_set! {
    /// Top-level error for line-stager operations
    LineStagerError := {
        #[display("Diff contains no file patches")]
        EmptyDiff,
        #[display("No patch for {path} in diff")]
        NoFilePatch { path: String },
        #[display("Diff touches {count} files, pick one by path")]
        AmbiguousFile { count: usize },
        #[display("Failed to read diff: {message}")]
        Io { message: String },
        ParseError(ParseError),
        PatchError(PatchError),
        SelectionError(SelectionError),
    }
}

/// Main interface: a parsed diff plus selection-driven derivations
pub struct LineStager {
    diff: Diff,
}

impl LineStager {
    /// Parse `git diff` output
    pub fn parse(text: &str) -> Result<Self, LineStagerError> {
        Ok(Self {
            diff: Diff::parse(text)?,
        })
    }

    pub fn diff(&self) -> &Diff {
        &self.diff
    }

    /// Pick the patch for `path`, or the only patch when no path is given
    pub fn file_patch(&self, path: Option<&str>) -> Result<&FilePatch, LineStagerError> {
        match path {
            Some(path) => self.diff.file(path).ok_or(LineStagerError::NoFilePatch {
                path: path.to_string(),
            }),
            None => match self.diff.files.as_slice() {
                [] => Err(LineStagerError::EmptyDiff),
                [file] => Ok(file),
                files => Err(LineStagerError::AmbiguousFile { count: files.len() }),
            },
        }
    }

    /// Resolve `HUNK[:LINES]` selections against one file patch
    pub fn select(
        &self,
        path: Option<&str>,
        selections: &[String],
    ) -> Result<(&FilePatch, Selection), LineStagerError> {
        let patch = self.file_patch(path)?;
        let mut selection = Selection::new();
        for input in selections {
            selection.extend(parse_selection(input)?.resolve(patch)?.iter());
        }
        Ok((patch, selection))
    }

    /// Patch that stages the selected lines of one file
    ///
    /// # Examples
    /// ```
    /// # use line_stager::LineStager;
    /// let diff = "--- a/a.txt\n+++ b/a.txt\n@@ -1,2 +1,2 @@\n-one\n-two\n+ONE\n+TWO\n";
    /// let stager = LineStager::parse(diff).unwrap();
    /// let staged = stager.stage(None, &["1:1,3".to_string()]).unwrap();
    /// assert_eq!(
    ///     format!("{}{}", staged.header_string(), staged),
    ///     "--- a/a.txt\n+++ b/a.txt\n@@ -1,2 +1,2 @@\n-one\n two\n+ONE\n"
    /// );
    /// ```
    pub fn stage(
        &self,
        path: Option<&str>,
        selections: &[String],
    ) -> Result<FilePatch, LineStagerError> {
        let (patch, selection) = self.select(path, selections)?;
        Ok(patch.stage_patch_for_lines(&selection))
    }

    /// Patch that unstages the selected lines of one file
    ///
    /// The diff is read as the staged changes (`git diff --cached`).
    pub fn unstage(
        &self,
        path: Option<&str>,
        selections: &[String],
    ) -> Result<FilePatch, LineStagerError> {
        let (patch, selection) = self.select(path, selections)?;
        Ok(patch.unstage_patch_for_lines(&selection))
    }

    /// Listing with hunk and line numbers, for one file or all of them
    pub fn show(&self, path: Option<&str>) -> Result<String, LineStagerError> {
        match path {
            Some(_) => Ok(format_patch(self.file_patch(path)?)),
            None => Ok(self
                .diff
                .files
                .iter()
                .map(format_patch)
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    const TWO_FILES: &str = r#"diff --git a/a.txt b/a.txt
index 1111111..2222222 100644
--- a/a.txt
+++ b/a.txt
@@ -1,3 +1,3 @@
 keep
-old
+new
 tail
diff --git a/b.txt b/b.txt
new file mode 100644
index 0000000..3333333
--- /dev/null
+++ b/b.txt
@@ -0,0 +1,2 @@
+first
+second
"#;

    #[test]
    fn file_patch_needs_path_for_several_files() {
        let stager = LineStager::parse(TWO_FILES).unwrap();
        assert!(matches!(
            stager.file_patch(None),
            Err(LineStagerError::AmbiguousFile { count: 2 })
        ));
        assert!(matches!(
            stager.file_patch(Some("c.txt")),
            Err(LineStagerError::NoFilePatch { .. })
        ));
        assert_eq!(stager.file_patch(Some("b.txt")).unwrap().status(), FileStatus::Added);
    }

    #[test]
    fn empty_diff_has_no_file_patch() {
        let stager = LineStager::parse("").unwrap();
        assert!(matches!(
            stager.file_patch(None),
            Err(LineStagerError::EmptyDiff)
        ));
    }

    #[test]
    fn stage_part_of_new_file() {
        let stager = LineStager::parse(TWO_FILES).unwrap();
        let staged = stager
            .stage(Some("b.txt"), &["1:1".to_string()])
            .unwrap();
        assert_eq!(
            format!("{}{}", staged.header_string(), staged),
            "--- /dev/null\n+++ b/b.txt\n@@ -0,0 +1,1 @@\n+first\n"
        );
    }

    #[test]
    fn unstage_whole_hunk() {
        let stager = LineStager::parse(TWO_FILES).unwrap();
        let unstaged = stager.unstage(Some("a.txt"), &["1".to_string()]).unwrap();
        assert_eq!(
            unstaged.to_string(),
            "@@ -1,3 +1,3 @@\n keep\n-new\n+old\n tail\n"
        );
    }

    #[test]
    fn selection_errors_surface() {
        let stager = LineStager::parse(TWO_FILES).unwrap();
        assert!(matches!(
            stager.stage(Some("a.txt"), &["1:0".to_string()]),
            Err(LineStagerError::SelectionError(_))
        ));
        assert!(matches!(
            stager.stage(Some("a.txt"), &["2".to_string()]),
            Err(LineStagerError::PatchError(PatchError::HunkNotFound { .. }))
        ));
    }

    #[test]
    fn show_lists_every_file() {
        let stager = LineStager::parse(TWO_FILES).unwrap();
        insta::assert_snapshot!(stager.show(None).unwrap(), @r"
        a.txt:
          [1] @@ -1,3 +1,3 @@
            1:	 keep
            2:	-old
            3:	+new
            4:	 tail

        b.txt:
          [1] @@ -0,0 +1,2 @@
            1:	+first
            2:	+second
        ");
    }
}
