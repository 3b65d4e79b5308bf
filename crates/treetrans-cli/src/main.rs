use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use treetrans::jobs::parse_allowed_extensions_csv;
use treetrans::{
    init_logging, load_settings, JobRecord, JobRequest, JobService, JobSource, JobStatus, LogFormat,
    UploadedFile,
};

#[derive(Parser)]
#[command(name = "treetrans", version, about = "Translate the text files of a directory tree")]
struct Cli {
    /// YAML settings file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Run a translation job",
        after_help = "Example:\n    treetrans translate --source ./docs --output docs-de --target-language German"
    )]
    Translate(TranslateArgs),
    #[command(about = "Show which translation providers are configured")]
    Providers,
}

#[derive(Args)]
struct TranslateArgs {
    /// Local directory to translate.
    #[arg(long, conflicts_with = "repo", required_unless_present = "repo")]
    source: Option<PathBuf>,

    /// Public https://github.com/<owner>/<repo> URL to clone and translate.
    #[arg(long)]
    repo: Option<String>,

    /// Output folder name or path.
    #[arg(long)]
    output: String,

    #[arg(long, default_value = "local")]
    provider: String,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    target_language: Option<String>,

    /// Comma-separated extensions, e.g. "md,txt".
    #[arg(long, default_value = "")]
    extensions: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = if cli.json_logs { LogFormat::Json } else { LogFormat::Pretty };
    if let Err(e) = init_logging(format) {
        eprintln!("warning: {e}");
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = load_settings(cli.config.as_deref()).context("failed to load settings")?;
    let service = JobService::new(settings);

    match cli.command {
        Command::Providers => {
            for status in service.translators().status() {
                println!(
                    "{:<8} {:<14} default model: {}",
                    status.name,
                    if status.configured { "configured" } else { "not configured" },
                    status.default_model
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Translate(args) => translate(&service, args).await,
    }
}

async fn translate(service: &JobService, args: TranslateArgs) -> Result<ExitCode> {
    let source = match (args.source, args.repo) {
        (Some(dir), _) => JobSource::Upload(read_directory(&dir)?),
        (None, Some(url)) => JobSource::Repository { url },
        (None, None) => bail!("either --source or --repo is required"),
    };

    let request = JobRequest {
        source,
        translator: args.provider,
        model: args.model,
        target_language: args.target_language,
        output_folder: args.output,
        allowed_extensions: parse_allowed_extensions_csv(&args.extensions)?,
    };

    let mut events = service.subscribe();
    let job = service.submit(request).await?;
    println!("Job {} queued", job.id);

    let interrupted = CancellationToken::new();
    let handler_token = interrupted.clone();
    ctrlc::set_handler(move || handler_token.cancel()).context("failed to install Ctrl-C handler")?;

    let finished = loop {
        tokio::select! {
            _ = interrupted.cancelled() => {
                eprintln!("Cancelling...");
                service.cancel(&job.id)?;
                break service.wait_for_terminal(&job.id).await?;
            }
            event = events.recv() => match event {
                Ok(record) if record.id == job.id => {
                    print_progress(&record);
                    if record.is_finished() {
                        break record;
                    }
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break service.get(&job.id)?,
            },
        }
    };

    Ok(report(service, &finished).await)
}

fn print_progress(job: &JobRecord) {
    if job.status != JobStatus::Running {
        return;
    }
    let progress = &job.progress;
    if let Some(file) = &progress.current_file {
        println!(
            "[{}/{}] {}{}",
            progress.processed_files,
            progress.total_files,
            file,
            if job.errors.iter().any(|e| &e.relative_path == file) { " (failed)" } else { "" }
        );
    }
}

async fn report(service: &JobService, job: &JobRecord) -> ExitCode {
    for error in &job.errors {
        eprintln!("  {}: {}", error.relative_path, error.message);
    }

    match job.status {
        JobStatus::Completed => {
            println!(
                "Completed: {} files, {} failed. Output in {}",
                job.progress.processed_files,
                job.progress.failed_files,
                job.output_root.display()
            );
            match service.archive_for_download(&job.id).await {
                Ok(archive) => {
                    println!("Archive: {}", archive.path.display());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("{e}");
                    ExitCode::FAILURE
                }
            }
        }
        JobStatus::Cancelled => {
            eprintln!("{}", job.last_error.as_deref().unwrap_or("Cancelled"));
            ExitCode::from(130)
        }
        _ => {
            eprintln!("Failed: {}", job.last_error.as_deref().unwrap_or("unknown error"));
            ExitCode::FAILURE
        }
    }
}

/// Loads every regular file under `dir` as an upload, keyed by its path
/// relative to `dir`'s parent so the folder name is kept.
fn read_directory(dir: &Path) -> Result<Vec<UploadedFile>> {
    let base = dir.parent().unwrap_or(dir);
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.with_context(|| format!("failed to read {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(relative) = entry.path().strip_prefix(base).ok().and_then(Path::to_str) else {
            log::warn!("Skipping {}", entry.path().display());
            continue;
        };
        let contents = std::fs::read(entry.path())
            .with_context(|| format!("failed to read {}", entry.path().display()))?;
        files.push(UploadedFile::new(relative, contents));
    }

    Ok(files)
}
