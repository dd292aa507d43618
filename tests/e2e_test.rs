use git2::{Repository, Signature};
use line_stager::{FilePatch, FileStatus, LineStager};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Test fixture for a git repository
struct Fixture {
    dir: TempDir,
    repo: Repository,
}

impl Fixture {
    /// Create a new empty repo with deterministic config
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let repo = Repository::init(dir.path()).expect("Failed to init repo");

        // Deterministic config
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();

        Self { dir, repo }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file to the repo
    fn write_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// Stage a file
    fn stage_file(&self, name: &str) {
        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
    }

    /// Create a commit
    fn commit(&self, message: &str) {
        let sig = Signature::new(
            "Test User",
            "test@example.com",
            &git2::Time::new(1234567890, 0),
        )
        .unwrap();
        let tree_id = self.repo.index().unwrap().write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();

        if self.repo.head().is_ok() {
            let parent = self.repo.head().unwrap().peel_to_commit().unwrap();
            self.repo
                .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])
                .unwrap();
        } else {
            self.repo
                .commit(Some("HEAD"), &sig, &sig, message, &tree, &[])
                .unwrap();
        }
    }

    /// Run `git diff` with fixed prefixes and context, plus any extra args
    fn git_diff(&self, extra: &[&str]) -> String {
        let output = Command::new("git")
            .args(["-C", self.path().to_str().unwrap(), "diff"])
            .args(extra)
            .args([
                "--no-ext-diff", // Force standard diff, ignore external tools
                "--no-color",
                "-U3",
                "--src-prefix=a/",
                "--dst-prefix=b/",
            ])
            .output()
            .expect("Failed to run git diff");
        assert!(output.status.success(), "git diff failed");
        String::from_utf8(output.stdout).unwrap()
    }

    /// Apply a derived patch to the index through `git apply --cached`
    fn apply_cached(&self, patch: &FilePatch) {
        let text = format!("{}{}", patch.header_string(), patch);
        let mut child = Command::new("git")
            .args(["-C", self.path().to_str().unwrap(), "apply", "--cached", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to spawn git apply");
        child
            .stdin
            .take()
            .unwrap()
            .write_all(text.as_bytes())
            .unwrap();
        let output = child.wait_with_output().unwrap();
        assert!(
            output.status.success(),
            "git apply rejected patch:\n{}\n{}",
            text,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    /// Content of a file as recorded in the index, if present
    fn index_content(&self, name: &str) -> Option<String> {
        let mut index = self.repo.index().unwrap();
        index.read(true).unwrap();
        let entry = index.get_path(Path::new(name), 0)?;
        let blob = self.repo.find_blob(entry.id).unwrap();
        Some(String::from_utf8(blob.content().to_vec()).unwrap())
    }
}

/// Lines `line 1` through `line 20`, with replacements and insertions after a row
fn numbered(replace: &[(usize, &str)], insert_after: &[(usize, &str)]) -> String {
    let mut content = String::new();
    for i in 1..=20 {
        match replace.iter().find(|(row, _)| *row == i) {
            Some((_, text)) => content.push_str(text),
            None => content.push_str(&format!("line {}", i)),
        }
        content.push('\n');
        for (_, text) in insert_after.iter().filter(|(row, _)| *row == i) {
            content.push_str(text);
            content.push('\n');
        }
    }
    content
}

fn committed_fixture() -> Fixture {
    let fixture = Fixture::new();
    fixture.write_file("notes.txt", &numbered(&[], &[]));
    fixture.stage_file("notes.txt");
    fixture.commit("initial");
    fixture
}

fn selections(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn stage_second_hunk_only() {
    let fixture = committed_fixture();
    fixture.write_file(
        "notes.txt",
        &numbered(&[(2, "LINE 2"), (15, "LINE 15")], &[(2, "inserted")]),
    );

    let stager = LineStager::parse(&fixture.git_diff(&[])).unwrap();
    let patch = stager.file_patch(None).unwrap();
    assert_eq!(patch.hunks().len(), 2);

    let staged = stager.stage(None, &selections(&["2"])).unwrap();
    assert_eq!(staged.hunks().len(), 1);
    assert_eq!(staged.hunks()[0].header(), "@@ -12,7 +12,7 @@");

    fixture.apply_cached(&staged);
    assert_eq!(
        fixture.index_content("notes.txt").unwrap(),
        numbered(&[(15, "LINE 15")], &[])
    );

    // The rest is still unstaged
    let remaining = LineStager::parse(&fixture.git_diff(&[])).unwrap();
    let remaining = remaining.file_patch(None).unwrap();
    assert_eq!(remaining.hunks().len(), 1);
    assert_eq!(remaining.hunks()[0].old_start_row(), 1);
}

#[test]
fn stage_one_line_of_a_replacement() {
    let fixture = committed_fixture();
    fixture.write_file(
        "notes.txt",
        &numbered(&[(15, "LINE 15")], &[(15, "extra")]),
    );

    let stager = LineStager::parse(&fixture.git_diff(&[])).unwrap();
    // 1-3 context, 4 -line 15, 5 +LINE 15, 6 +extra
    let staged = stager.stage(Some("notes.txt"), &selections(&["1:6"])).unwrap();

    fixture.apply_cached(&staged);
    assert_eq!(
        fixture.index_content("notes.txt").unwrap(),
        numbered(&[], &[(15, "extra")])
    );
}

#[test]
fn unstage_first_hunk_only() {
    let fixture = committed_fixture();
    fixture.write_file(
        "notes.txt",
        &numbered(&[(2, "LINE 2"), (15, "LINE 15")], &[]),
    );
    fixture.stage_file("notes.txt");

    let stager = LineStager::parse(&fixture.git_diff(&["--cached"])).unwrap();
    let unstaged = stager.unstage(None, &selections(&["1"])).unwrap();
    assert_eq!(unstaged.status(), FileStatus::Modified);

    fixture.apply_cached(&unstaged);
    assert_eq!(
        fixture.index_content("notes.txt").unwrap(),
        numbered(&[(15, "LINE 15")], &[])
    );
}

#[test]
fn unstage_part_of_new_file() {
    let fixture = committed_fixture();
    fixture.write_file("new.txt", "a\nb\nc\n");
    fixture.stage_file("new.txt");

    let stager = LineStager::parse(&fixture.git_diff(&["--cached"])).unwrap();
    let patch = stager.file_patch(Some("new.txt")).unwrap();
    assert_eq!(patch.status(), FileStatus::Added);

    let unstaged = stager
        .unstage(Some("new.txt"), &selections(&["1:1,2"]))
        .unwrap();
    assert_eq!(unstaged.status(), FileStatus::Deleted);
    assert_eq!(unstaged.header_string(), "--- a/new.txt\n+++ b/new.txt\n");

    fixture.apply_cached(&unstaged);
    assert_eq!(fixture.index_content("new.txt").unwrap(), "c\n");
}

#[test]
fn unstage_all_of_new_file_removes_it() {
    let fixture = committed_fixture();
    fixture.write_file("new.txt", "a\nb\nc\n");
    fixture.stage_file("new.txt");

    let stager = LineStager::parse(&fixture.git_diff(&["--cached"])).unwrap();
    let unstaged = stager.unstage(Some("new.txt"), &selections(&["1"])).unwrap();
    assert_eq!(unstaged.header_string(), "--- a/new.txt\n+++ /dev/null\n");

    fixture.apply_cached(&unstaged);
    assert_eq!(fixture.index_content("new.txt"), None);
    assert_eq!(
        fixture.index_content("notes.txt").unwrap(),
        numbered(&[], &[])
    );
}

#[test]
fn show_numbers_match_selections() {
    let fixture = committed_fixture();
    fixture.write_file("notes.txt", &numbered(&[(15, "LINE 15")], &[]));

    let stager = LineStager::parse(&fixture.git_diff(&[])).unwrap();
    insta::assert_snapshot!(stager.show(None).unwrap(), @r"
    notes.txt:
      [1] @@ -12,7 +12,7 @@
        1:	 line 12
        2:	 line 13
        3:	 line 14
        4:	-line 15
        5:	+LINE 15
        6:	 line 16
        7:	 line 17
        8:	 line 18
    ");
}

#[test]
fn stage_part_of_crlf_file() {
    let fixture = Fixture::new();
    fixture
        .repo
        .config()
        .unwrap()
        .set_bool("core.autocrlf", false)
        .unwrap();
    fixture.write_file("dos.txt", "a\r\nb\r\nc\r\n");
    fixture.stage_file("dos.txt");
    fixture.commit("initial");
    fixture.write_file("dos.txt", "a\r\nB\r\nc\r\nD\r\n");

    let stager = LineStager::parse(&fixture.git_diff(&[])).unwrap();
    // 1 context, 2 -b, 3 +B, 4 context, 5 +D
    let staged = stager.stage(None, &selections(&["1:2,3"])).unwrap();

    fixture.apply_cached(&staged);
    assert_eq!(
        fixture.index_content("dos.txt").unwrap(),
        "a\r\nB\r\nc\r\n"
    );
}

#[test]
fn stage_file_with_quoted_name() {
    let fixture = Fixture::new();
    fixture
        .repo
        .config()
        .unwrap()
        .set_bool("core.quotePath", true)
        .unwrap();
    fixture.write_file("café.txt", "one\ntwo\n");
    fixture.stage_file("café.txt");
    fixture.commit("initial");
    fixture.write_file("café.txt", "ONE\ntwo\nthree\n");

    let diff = fixture.git_diff(&[]);
    assert!(diff.contains("\"a/caf\\303\\251.txt\""), "{diff}");

    let stager = LineStager::parse(&diff).unwrap();
    // 1 -one, 2 +ONE, 3 context, 4 +three
    let staged = stager
        .stage(Some("café.txt"), &selections(&["1:1,2"]))
        .unwrap();
    assert_eq!(
        staged.header_string(),
        "--- \"a/caf\\303\\251.txt\"\n+++ \"b/caf\\303\\251.txt\"\n"
    );

    fixture.apply_cached(&staged);
    assert_eq!(fixture.index_content("café.txt").unwrap(), "ONE\ntwo\n");
}

#[test]
fn stage_line_after_unterminated_last_line() {
    let fixture = Fixture::new();
    fixture.write_file("t.txt", "a\nx");
    fixture.stage_file("t.txt");
    fixture.commit("initial");
    fixture.write_file("t.txt", "a\ny");

    let stager = LineStager::parse(&fixture.git_diff(&[])).unwrap();
    // 1 context, 2 -x, 3 marker, 4 +y, 5 marker
    let staged = stager.stage(None, &selections(&["1:4"])).unwrap();
    fixture.apply_cached(&staged);
    assert_eq!(fixture.index_content("t.txt").unwrap(), "a\nx\ny");

    // 1 context, 2 -x, 3 marker, 4 +x, 5 +y, 6 marker
    let only_deletion = LineStager::parse(&fixture.git_diff(&["--cached"]))
        .unwrap()
        .unstage(None, &selections(&["1:2"]))
        .unwrap();
    fixture.apply_cached(&only_deletion);
    assert_eq!(fixture.index_content("t.txt").unwrap(), "a\nx\nx\ny");
}
