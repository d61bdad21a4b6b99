//! # photo-dedupe CLI
//!
//! Command-line interface for the scan-and-group duplicate engine.
//!
//! ## Usage
//! ```bash
//! photo-dedupe scan ~/Photos
//! photo-dedupe scan ~/Photos ~/Downloads --near-radius 3 --exact-only
//! photo-dedupe scan ~/Photos --resume --cancel-after 60
//! ```

use clap::{Parser, Subcommand};
use console::{style, Term};
use photo_dedupe::config::FeatureFlags;
use photo_dedupe::core::persistence::SqlitePersistence;
use photo_dedupe::core::pipeline::{CancellationToken, OrchestratorConfig, ScanOrchestrator};
use photo_dedupe::core::session::{Session, SessionStatus, SessionStore};
use photo_dedupe::core::{DuplicateGroup, SimilarityIndex};
use photo_dedupe::error::DuplicateFinderError;
use photo_dedupe::events::{Event, EventChannel, HashEvent, PipelineEvent, ScanEvent};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// Scan-and-group duplicate photo/video finder. Never deletes anything.
#[derive(Parser, Debug)]
#[command(name = "photo-dedupe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan one or more directories for duplicate photos and videos
    Scan {
        /// Directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Hamming radius for the near-duplicate pass
        #[arg(long)]
        near_radius: Option<u32>,

        /// Skip the near pass; report only byte-identical duplicates
        #[arg(long)]
        exact_only: bool,

        /// Resume the most recent recoverable session instead of starting fresh
        #[arg(long)]
        resume: bool,

        /// Cancel the scan after this many seconds
        #[arg(long)]
        cancel_after: Option<u64>,

        /// Database path for persisted file records and signatures
        #[arg(long)]
        db: Option<PathBuf>,

        /// JSON output instead of the human-readable summary
        #[arg(long)]
        json: bool,
    },
}

/// Exit codes per spec.md §6.
mod exit_code {
    pub const SUCCESS: u8 = 0;
    pub const USER_ERROR: u8 = 1;
    pub const IO_ERROR: u8 = 2;
    pub const CANCELLED: u8 = 3;
    pub const INTERNAL: u8 = 4;
}

/// Run the CLI, translating the outcome into a process exit code.
pub fn run() -> ExitCode {
    init_logging();
    let flags = FeatureFlags::from_env();
    tracing::debug!(?flags, "feature flags read from environment");
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scan {
            paths,
            near_radius,
            exact_only,
            resume,
            cancel_after,
            db,
            json,
        } => run_scan(paths, near_radius, exact_only, resume, cancel_after, db, json),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            Term::stderr()
                .write_line(&format!("{} {}", style("error:").red().bold(), e))
                .ok();
            ExitCode::from(classify_error(&e))
        }
    }
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn classify_error(error: &DuplicateFinderError) -> u8 {
    match error {
        DuplicateFinderError::Scan(_) => exit_code::IO_ERROR,
        DuplicateFinderError::Persistence(_) => exit_code::IO_ERROR,
        DuplicateFinderError::Config(_) => exit_code::USER_ERROR,
        _ => exit_code::INTERNAL,
    }
}

#[allow(clippy::too_many_arguments)]
fn run_scan(
    paths: Vec<PathBuf>,
    near_radius: Option<u32>,
    exact_only: bool,
    resume: bool,
    cancel_after: Option<u64>,
    db: Option<PathBuf>,
    json: bool,
) -> Result<u8, DuplicateFinderError> {
    let term = Term::stderr();
    if !json {
        term.write_line(&format!(
            "{} {}",
            style("photo-dedupe").bold().cyan(),
            style(env!("CARGO_PKG_VERSION")).dim()
        ))
        .ok();
    }

    for path in &paths {
        if !path.exists() {
            return Err(DuplicateFinderError::Config(format!(
                "path does not exist: {}",
                path.display()
            )));
        }
    }

    let checkpoint_dir = SessionStore::default_checkpoint_dir();
    let db_path = db.unwrap_or_else(|| checkpoint_dir.join("index.sqlite3"));
    let persistence: Arc<dyn photo_dedupe::core::persistence::Persistence> =
        Arc::new(SqlitePersistence::open(&db_path, checkpoint_dir.clone())?);
    let index = Arc::new(SimilarityIndex::new());

    let session = if resume {
        persistence
            .latest_session()?
            .filter(|s| s.is_recoverable())
            .map(|mut s| {
                // `can_transition_to` only allows Idle -> Scanning; resuming
                // a session that crashed mid-scan means re-entering Scanning
                // legally rather than being stuck in its terminal status.
                s.status = SessionStatus::Idle;
                s.phase = None;
                s
            })
            .unwrap_or_else(|| Session::new(paths.clone()))
    } else {
        Session::new(paths.clone())
    };

    let store = SessionStore::new(Arc::clone(&persistence), checkpoint_dir, session);
    let (events, receiver) = EventChannel::new();
    let cancel = CancellationToken::new();

    if let Some(secs) = cancel_after {
        let cancel = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            cancel.cancel();
        });
    }

    let json_for_listener = json;
    let listener = thread::spawn(move || {
        let term = Term::stderr();
        for event in receiver.iter() {
            if json_for_listener {
                continue;
            }
            report_event(&term, &event);
        }
    });

    let mut config = OrchestratorConfig::default();
    config.exact_only = exact_only;
    if let Some(radius) = near_radius {
        config.near_radius = radius;
    }

    let orchestrator = ScanOrchestrator::new(Arc::clone(&persistence), index);
    let outcome = orchestrator.run(paths, &config, &store, &events, &cancel);

    drop(events);
    listener.join().ok();

    let result = outcome?;

    if json {
        print_json_results(&result);
    } else {
        print_pretty_results(&term, &result);
    }

    if result.cancelled {
        Ok(exit_code::CANCELLED)
    } else {
        Ok(exit_code::SUCCESS)
    }
}

fn report_event(term: &Term, event: &Event) {
    match event {
        Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => {
            term.write_line(&format!("  {} {}", style("›").dim(), phase)).ok();
        }
        Event::Scan(ScanEvent::Completed { total_files }) => {
            term.write_line(&format!("  {} files found: {}", style("✓").green(), total_files))
                .ok();
        }
        Event::Hash(HashEvent::Completed {
            total_hashed,
            cache_hits,
        }) => {
            term.write_line(&format!(
                "  {} hashed {} ({} from cache)",
                style("✓").green(),
                total_hashed,
                cache_hits
            ))
            .ok();
        }
        Event::Pipeline(PipelineEvent::Error { message }) => {
            term.write_line(&format!("  {} {}", style("✗").red(), message)).ok();
        }
        _ => {}
    }
}

fn print_pretty_results(term: &Term, result: &photo_dedupe::core::pipeline::OrchestratorResult) {
    term.write_line("").ok();

    if result.cancelled {
        term.write_line(&format!("{} scan cancelled", style("⚠").yellow().bold()))
            .ok();
        return;
    }

    term.write_line(&format!("{} scan complete", style("✓").green().bold()))
        .ok();
    term.write_line("").ok();
    term.write_line(&format!(
        "  {} files scanned",
        style(result.total_files).cyan()
    ))
    .ok();
    term.write_line(&format!(
        "  {} duplicate groups found",
        style(result.groups.len()).cyan()
    ))
    .ok();

    let duplicate_count: usize = result.groups.iter().map(|g| g.duplicate_count()).sum();
    term.write_line(&format!("  {} duplicate files", style(duplicate_count).cyan()))
        .ok();

    if result.cache_hits > 0 {
        term.write_line(&format!("  {} cache hits", style(result.cache_hits).dim()))
            .ok();
    }

    for error in &result.errors {
        term.write_line(&format!("  {} {}", style("⚠").yellow(), error)).ok();
    }

    term.write_line("").ok();

    if result.groups.is_empty() {
        term.write_line("  no duplicates found").ok();
    } else {
        for (i, group) in result.groups.iter().enumerate() {
            term.write_line(&format!(
                "  {} {} members, confidence {:.2}",
                style(format!("group {}:", i + 1)).bold(),
                group.members.len(),
                group.confidence
            ))
            .ok();
        }
    }

    term.write_line("").ok();
    term.write_line(&format!(
        "{}",
        style("No files were deleted. Review groups before taking action.").dim()
    ))
    .ok();
}

fn print_json_results(result: &photo_dedupe::core::pipeline::OrchestratorResult) {
    let output = serde_json::json!({
        "total_files": result.total_files,
        "duplicate_groups": result.groups.len(),
        "duplicate_count": result.groups.iter().map(|g| g.duplicate_count()).sum::<usize>(),
        "cache_hits": result.cache_hits,
        "cancelled": result.cancelled,
        "errors": result.errors,
        "groups": result.groups.iter().map(group_to_json).collect::<Vec<_>>(),
    });

    println!("{}", serde_json::to_string_pretty(&output).unwrap());
}

fn group_to_json(group: &DuplicateGroup) -> serde_json::Value {
    serde_json::json!({
        "id": group.id.to_string(),
        "members": group.members.iter().map(Uuid::to_string).collect::<Vec<_>>(),
        "representative": group.representative.to_string(),
        "confidence": group.confidence,
    })
}
