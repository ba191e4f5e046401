// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};

use subingest::app_config::{self, Config};
use subingest::database::{DatabaseConnection, Repository};
use subingest::file_utils::FileManager;
use subingest::{IngestionQueue, SubtitleIngestor};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a video file (or every video in a directory) and ingest its subtitles
    Add {
        /// Video file or directory to register
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Title for a single video, defaults to the file name
        #[arg(short, long)]
        title: Option<String>,

        /// Only register, do not extract subtitles
        #[arg(long)]
        no_ingest: bool,
    },

    /// Ingest the subtitles of registered videos
    Ingest {
        /// Video ids
        #[arg(value_name = "ID", required = true)]
        video_ids: Vec<i64>,
    },

    /// Show the stored subtitles of a video
    Subtitles {
        /// Video id
        #[arg(value_name = "ID")]
        video_id: i64,

        /// Only show this language code
        #[arg(short, long)]
        language: Option<String>,

        /// Only show cues containing this text (case-insensitive)
        #[arg(short, long)]
        query: Option<String>,
    },

    /// List the subtitle languages of a video
    Languages {
        /// Video id
        #[arg(value_name = "ID")]
        video_id: i64,
    },

    /// List registered videos
    Videos,

    /// Delete a video and its subtitles
    Delete {
        /// Video id
        #[arg(value_name = "ID")]
        video_id: i64,
    },

    /// Show database statistics
    Stats,

    /// Generate shell completions for subingest
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// subingest - subtitle extraction and ingestion
///
/// Extracts the embedded subtitle streams of video files and stores
/// them as searchable caption records.
#[derive(Parser, Debug)]
#[command(name = "subingest")]
#[command(version)]
#[command(about = "Extract and index embedded video subtitles")]
#[command(long_about = "subingest extracts embedded subtitle streams from video files with ffmpeg and stores their cues in SQLite.

EXAMPLES:
    subingest add movie.mkv                      # Register and ingest a video
    subingest add --no-ingest /movies/           # Register every video in a directory
    subingest ingest 1 2 3                       # Ingest registered videos
    subingest subtitles 1 --language eng         # Show English cues of video 1
    subingest subtitles 1 --query hello          # Search the cues of video 1
    subingest completions bash > subingest.bash  # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long = "config", default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");

            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install the logger with every level enabled, the global max level
    // starts at info and is updated once the config is loaded
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "subingest", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = Config::load_or_create(&cli.config_path)?;
    if let Some(log_level) = cli.log_level {
        config.log_level = log_level.into();
    }

    // Validate the configuration after loading and overriding
    config.validate().context("Configuration validation failed")?;
    log::set_max_level((&config.log_level).into());

    let repository = open_repository(&config)?;

    match cli.command {
        Commands::Add { path, title, no_ingest } => {
            let video_ids = register_videos(&repository, &path, title).await?;
            if !no_ingest {
                run_ingestion(&repository, &config, video_ids).await?;
            }
        }
        Commands::Ingest { video_ids } => {
            run_ingestion(&repository, &config, video_ids).await?;
        }
        Commands::Subtitles { video_id, language, query } => {
            show_subtitles(&repository, video_id, language.as_deref(), query.as_deref()).await?;
        }
        Commands::Languages { video_id } => {
            require_video(&repository, video_id).await?;
            for language in repository.video_languages(video_id).await? {
                println!("{}\t{}", language.code, language.name);
            }
        }
        Commands::Videos => {
            for video in repository.list_videos().await? {
                println!("{}\t{}\t{}\t{}", video.id, video.title, video.file_path, video.uploaded_at);
            }
        }
        Commands::Delete { video_id } => {
            if !repository.delete_video(video_id).await? {
                return Err(anyhow!("Video {} does not exist", video_id));
            }
            info!("Deleted video {} and its subtitles", video_id);
        }
        Commands::Stats => {
            println!("{}", repository.stats()?);
        }
        // Generated before the configuration is loaded
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn open_repository(config: &Config) -> Result<Repository> {
    match &config.database_path {
        Some(path) => Ok(Repository::new(DatabaseConnection::new(path)?)),
        None => Repository::new_default(),
    }
}

async fn require_video(repository: &Repository, video_id: i64) -> Result<()> {
    match repository.get_video(video_id).await? {
        Some(_) => Ok(()),
        None => Err(anyhow!("Video {} does not exist", video_id)),
    }
}

/// Register a video file, or every uploadable video under a directory
async fn register_videos(repository: &Repository, path: &Path, title: Option<String>) -> Result<Vec<i64>> {
    let files = if path.is_dir() {
        if title.is_some() {
            warn!("--title is ignored when registering a directory");
        }
        let files = FileManager::find_videos(path)?;
        if files.is_empty() {
            warn!("No .mp4, .mkv or .avi files found in {:?}", path);
        }
        files
    } else {
        FileManager::validate_upload(path)?;
        vec![path.to_path_buf()]
    };

    let single = files.len() == 1 && !path.is_dir();
    let mut video_ids = Vec::with_capacity(files.len());

    for file in files {
        let absolute = std::fs::canonicalize(&file)
            .with_context(|| format!("Failed to resolve path: {:?}", file))?;
        let video_title = match (&title, single) {
            (Some(title), true) => title.clone(),
            _ => FileManager::title_from_path(&absolute),
        };

        let video = repository
            .create_video(&video_title, &absolute.to_string_lossy())
            .await?;
        info!("Registered video {} ({:?})", video.id, video.file_path);
        video_ids.push(video.id);
    }

    Ok(video_ids)
}

/// Run ingestion jobs for the given videos through the worker pool
async fn run_ingestion(repository: &Repository, config: &Config, video_ids: Vec<i64>) -> Result<()> {
    if video_ids.is_empty() {
        return Ok(());
    }

    let ingestor = SubtitleIngestor::from_config(repository.clone(), config);
    let queue = IngestionQueue::start(ingestor, config.jobs.workers);

    for video_id in &video_ids {
        queue.submit(*video_id)?;
    }

    let outcomes = queue.shutdown().await;
    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => println!("{}", report),
            Err(e) => {
                error!("Job {} for video {} failed: {}", outcome.job_id, outcome.video_id, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(anyhow!("{} of {} ingestion job(s) failed", failed, outcomes.len()));
    }
    Ok(())
}

async fn show_subtitles(
    repository: &Repository,
    video_id: i64,
    language: Option<&str>,
    query: Option<&str>,
) -> Result<()> {
    require_video(repository, video_id).await?;

    let subtitles = match query {
        Some(query) => {
            let language = language.map(|l| l.trim().to_lowercase());
            repository
                .search_subtitles(video_id, query)
                .await?
                .into_iter()
                .filter(|s| language.as_ref().is_none_or(|l| &s.language_code == l))
                .collect()
        }
        None => repository.list_subtitles(video_id, language).await?,
    };

    for subtitle in subtitles {
        println!(
            "[{} --> {}] ({}) {}",
            subtitle.timestamp_start, subtitle.timestamp_end, subtitle.language_code, subtitle.content
        );
    }

    Ok(())
}
