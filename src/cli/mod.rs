//! # CLI Module
//!
//! Command-line interface for the media manager.
//!
//! ## Usage
//! ```bash
//! # One-time setup
//! mediamanager config init --media-dir ~/Media --duplicate-dir ~/Duplicates
//!
//! # Record everything already in the archive, moving duplicates aside
//! mediamanager scan ~/Media --move-duplicates
//!
//! # Copy new photos from a card into the archive
//! mediamanager import /Volumes/CARD/DCIM --workers 8
//! ```

use clap::{Parser, Subcommand};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use media_manager::config::Settings;
use media_manager::core::convert::CommandConverter;
use media_manager::core::geocode::{CachedGeocoder, NominatimGeocoder, PlaceNamer};
use media_manager::core::index::{KeyValueIndex, SqliteIndex};
use media_manager::core::metadata::MetadataResolver;
use media_manager::core::processor::{FileOutcome, FileProcessor, ProcessMode, ProcessorConfig};
use media_manager::core::walker::DirectoryWalker;
use media_manager::error::Result;
use media_manager::events::{Event, EventChannel, FileEvent, RunEvent, WalkEvent, WalkSummary};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Media Manager - organize photos and videos into a deduplicated archive
#[derive(Parser, Debug)]
#[command(name = "mediamanager")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (defaults to ~/.mediamanager.cfg.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record files in place and detect duplicates
    Scan {
        /// Directory to scan
        path: PathBuf,

        /// Move duplicates into the duplicates directory
        #[arg(long)]
        move_duplicates: bool,

        /// Worker threads per directory
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Copy new files into the archive
    Import {
        /// Directory to import from
        path: PathBuf,

        /// Worker threads per directory
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Manage the settings file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write a new settings file
    Init {
        /// Archive root
        #[arg(long)]
        media_dir: PathBuf,

        /// Where duplicates are moved
        #[arg(long)]
        duplicate_dir: PathBuf,

        /// Index database file
        #[arg(long)]
        database: Option<PathBuf>,
    },
    /// Print the current settings
    Show,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    media_manager::init_tracing(cli.verbose);

    let config_path = match cli.config {
        Some(path) => path,
        None => Settings::default_path()?,
    };

    match cli.command {
        Commands::Scan {
            path,
            move_duplicates,
            workers,
        } => run_walk(
            &config_path,
            &path,
            ProcessMode::Scan { move_duplicates },
            workers,
            cli.verbose,
        ),
        Commands::Import { path, workers } => {
            run_walk(&config_path, &path, ProcessMode::Import, workers, cli.verbose)
        }
        Commands::Config { action } => match action {
            ConfigAction::Init {
                media_dir,
                duplicate_dir,
                database,
            } => run_config_init(&config_path, media_dir, duplicate_dir, database),
            ConfigAction::Show => run_config_show(&config_path),
        },
    }
}

fn run_walk(
    config_path: &Path,
    root: &Path,
    mode: ProcessMode,
    workers: Option<usize>,
    verbose: bool,
) -> Result<()> {
    let term = Term::stderr();
    let settings = Settings::load(config_path)?;

    term.write_line(&format!(
        "{} {}",
        style("Media Manager").bold().cyan(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim()
    ))
    .ok();
    term.write_line("").ok();

    let index: Arc<dyn KeyValueIndex> = Arc::new(SqliteIndex::open(&settings.database_file)?);
    let walker = build_walker(&settings, mode, workers, index)?;

    let (sender, receiver) = EventChannel::new();

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::with_template("{spinner:.green} {pos} files {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.enable_steady_tick(Duration::from_millis(120));

    let progress_clone = progress.clone();

    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            match event {
                Event::Walk(WalkEvent::DirectoryStarted { path, .. }) => {
                    progress_clone.set_message(path.display().to_string());
                }
                Event::File(FileEvent::Processed { path, outcome }) => {
                    progress_clone.inc(1);
                    if verbose || !outcome.is_success() {
                        progress_clone.println(describe(&path, &outcome));
                    }
                }
                Event::Walk(WalkEvent::Error { path, message }) => {
                    progress_clone.println(format!(
                        "{} {}: {}",
                        style("!").yellow().bold(),
                        path.display(),
                        message
                    ));
                }
                Event::Run(RunEvent::Completed { .. }) | Event::Run(RunEvent::Error { .. }) => {
                    progress_clone.finish_and_clear();
                }
                _ => {}
            }
        }
    });

    let result = walker.run_with_events(root, &sender);

    drop(sender);
    event_thread.join().ok();
    progress.finish_and_clear();

    let summary = result?;
    print_summary(&term, mode, &summary);

    Ok(())
}

/// Wire the walker from settings
fn build_walker(
    settings: &Settings,
    mode: ProcessMode,
    workers: Option<usize>,
    index: Arc<dyn KeyValueIndex>,
) -> Result<DirectoryWalker> {
    let config = ProcessorConfig::new(
        mode,
        &settings.media_directory,
        &settings.duplicate_directory,
    )
    .skip_files(settings.skip_files.iter().cloned());

    let mut processor = FileProcessor::new(config, index.clone());

    if mode.is_import() {
        let nominatim = NominatimGeocoder::new(
            &settings.geocode_user_agent,
            settings.geocode_interval(),
        )?;
        let geocoder = CachedGeocoder::new(Arc::new(nominatim), index);

        let resolver = MetadataResolver::with_default_sources()
            .geocoder(Arc::new(geocoder))
            .place_namer(PlaceNamer::new(settings.locations.clone()));

        processor = processor
            .resolver(Arc::new(resolver))
            .converter(Arc::new(CommandConverter::new(settings.converter)));
    }

    Ok(DirectoryWalker::builder(processor)
        .max_workers(workers.unwrap_or(settings.max_workers))
        .exclude(&settings.duplicate_directory)
        .build())
}

fn describe(path: &Path, outcome: &FileOutcome) -> String {
    let marker = match outcome {
        FileOutcome::Failed { .. } => style("✗").red().bold(),
        FileOutcome::Duplicate { .. } => style("≡").yellow(),
        FileOutcome::Imported { .. } | FileOutcome::Recorded => style("✓").green(),
        _ => style("·").dim(),
    };
    format!("{} {} {}", marker, path.display(), style(outcome).dim())
}

fn print_summary(term: &Term, mode: ProcessMode, summary: &WalkSummary) {
    term.write_line(&format!(
        "{} {} Complete",
        style("✓").green().bold(),
        if mode.is_import() { "Import" } else { "Scan" }
    ))
    .ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} files processed in {:.1}s",
        style(summary.files_total()).cyan(),
        summary.duration_ms as f64 / 1000.0
    ))
    .ok();

    term.write_line(&format!(
        "  {} directories processed, {} unchanged",
        style(summary.directories_processed).cyan(),
        style(summary.directories_skipped).dim()
    ))
    .ok();

    if mode.is_import() {
        term.write_line(&format!(
            "  {} imported, {} already in the archive",
            style(summary.imported).green(),
            style(summary.unchanged).dim()
        ))
        .ok();
    } else {
        term.write_line(&format!(
            "  {} recorded, {} duplicates ({} moved)",
            style(summary.recorded).green(),
            style(summary.duplicates).yellow(),
            summary.relocated
        ))
        .ok();
    }

    if summary.directories_unreadable > 0 {
        term.write_line(&format!(
            "  {} directories could not be read",
            style(summary.directories_unreadable).yellow()
        ))
        .ok();
    }

    if summary.files_failed > 0 {
        term.write_line(&format!(
            "  {} files failed, see the log for details",
            style(summary.files_failed).red().bold()
        ))
        .ok();
    }
}

fn run_config_init(
    config_path: &Path,
    media_dir: PathBuf,
    duplicate_dir: PathBuf,
    database: Option<PathBuf>,
) -> Result<()> {
    let settings = match database {
        Some(database) => Settings::with_database(database, media_dir, duplicate_dir),
        None => Settings::new(media_dir, duplicate_dir)?,
    };
    settings.save(config_path)?;

    println!(
        "{} Wrote {}",
        style("✓").green().bold(),
        config_path.display()
    );
    Ok(())
}

fn run_config_show(config_path: &Path) -> Result<()> {
    let settings = Settings::load(config_path)?;

    println!("{}", style(config_path.display()).bold());
    println!("  database:    {}", settings.database_file.display());
    println!("  media:       {}", settings.media_directory.display());
    println!("  duplicates:  {}", settings.duplicate_directory.display());
    println!("  workers:     {}", settings.max_workers);
    println!("  skip files:  {}", settings.skip_files.join(", "));
    println!("  locations:   {}", settings.locations.len());

    if settings.database_file.exists() {
        let index = SqliteIndex::open(&settings.database_file)?;
        let stats = index.stats()?;
        println!(
            "  index:       {} files, {} directories, {} places",
            stats.content_entries, stats.directory_entries, stats.geo_entries
        );
        index.close()?;
    }

    Ok(())
}
