use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use line_stager::{FilePatch, LineStager, LineStagerError};
use std::io::{Read, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "line-stager")]
#[command(about = "Derive line-level stage and unstage patches from git diffs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the diff comes from and which file of it to use
#[derive(clap::Args)]
struct Source {
    /// Read the diff from FILE instead of stdin
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Path of the file to work on when the diff touches several files
    #[arg(short, long, value_name = "PATH")]
    file: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the patch that stages the selected lines of `git diff` output
    Stage {
        #[command(flatten)]
        source: Source,
        /// Selections as HUNK or HUNK:LINES (e.g., "2" or "1:3..5,8")
        #[arg(required = true)]
        selections: Vec<String>,
    },
    /// Print the patch that unstages the selected lines of `git diff --cached` output
    Unstage {
        #[command(flatten)]
        source: Source,
        /// Selections as HUNK or HUNK:LINES (e.g., "2" or "1:3..5,8")
        #[arg(required = true)]
        selections: Vec<String>,
    },
    /// Print the patch that reverses a whole file patch
    Invert {
        #[command(flatten)]
        source: Source,
    },
    /// List hunks and lines with the numbers used by selections
    Show {
        #[command(flatten)]
        source: Source,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Generate a man page
    Man,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Stage { source, selections } => {
            let stager = load(&source)?;
            let patch = stager.stage(source.file.as_deref(), &selections)?;
            write_patch(&mut stdout, &patch)?;
        }
        Commands::Unstage { source, selections } => {
            let stager = load(&source)?;
            let patch = stager.unstage(source.file.as_deref(), &selections)?;
            write_patch(&mut stdout, &patch)?;
        }
        Commands::Invert { source } => {
            let stager = load(&source)?;
            let patch = stager.file_patch(source.file.as_deref())?.unstage_patch();
            write_patch(&mut stdout, &patch)?;
        }
        Commands::Show { source } => {
            let stager = load(&source)?;
            write!(stdout, "{}", stager.show(source.file.as_deref())?)?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "line-stager", &mut stdout);
        }
        Commands::Man => {
            clap_mangen::Man::new(Cli::command()).render(&mut stdout)?;
        }
    }

    Ok(())
}

fn load(source: &Source) -> Result<LineStager, LineStagerError> {
    let text = match &source.input {
        Some(path) => std::fs::read_to_string(path).map_err(|e| LineStagerError::Io {
            message: format!("{}: {}", path.display(), e),
        })?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| LineStagerError::Io {
                    message: e.to_string(),
                })?;
            text
        }
    };
    LineStager::parse(&text)
}

/// Header and hunks, ready for `git apply --cached`
fn write_patch(out: &mut impl Write, patch: &FilePatch) -> std::io::Result<()> {
    if patch.hunks().is_empty() {
        log::warn!("selection produced no hunks");
        return Ok(());
    }
    write!(out, "{}{}", patch.header_string(), patch)
}
