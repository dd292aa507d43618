use super::{ParseError, split_lines};
use super::file::FilePatch;

/// A complete git diff containing patches for multiple files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub files: Vec<FilePatch>,
}

impl Diff {
    /// Parse a complete `git diff` output into file patches.
    ///
    /// Sections start at each `diff --git` line. Text without any such line is
    /// read as a single plain unified diff section.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        if !split_lines(text).any(|line| line.starts_with("diff --git ")) {
            if text.trim().is_empty() {
                return Ok(Self::default());
            }
            return Ok(Diff {
                files: vec![FilePatch::parse(text)?],
            });
        }

        let mut files = Vec::new();
        let mut current_file_text = String::new();

        for line in split_lines(text) {
            if line.starts_with("diff --git ") {
                // Start of new file patch - parse previous if exists
                if !current_file_text.is_empty() {
                    files.push(FilePatch::parse(&current_file_text)?);
                }
                current_file_text = line.to_string();
                current_file_text.push('\n');
            } else if !current_file_text.is_empty() {
                current_file_text.push_str(line);
                current_file_text.push('\n');
            }
        }

        if !current_file_text.is_empty() {
            files.push(FilePatch::parse(&current_file_text)?);
        }

        log::debug!("parsed diff with {} files", files.len());

        Ok(Diff { files })
    }

    /// Find the patch touching `path` on either side
    pub fn file(&self, path: &str) -> Option<&FilePatch> {
        self.files
            .iter()
            .find(|file| file.old_path() == Some(path) || file.new_path() == Some(path))
    }
}

impl std::fmt::Display for Diff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for file_patch in &self.files {
            write!(f, "{}{}", file_patch.header_string(), file_patch)?;
        }
        Ok(())
    }
}
