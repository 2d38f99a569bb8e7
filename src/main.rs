mod artwork;
mod config;
mod db_manager;
mod kv_store;
mod progress;
mod rate_limit;
mod watch_log;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use artwork::cache::ArtworkCache;
use artwork::http::{JsonFetcher, UreqJsonFetcher};
use artwork::resolver::ArtworkResolver;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use config::Config;
use db_manager::DbManager;
use kv_store::{KeyValueStore, MemoryKeyValueStore};
use log::{debug, info, warn};
use progress::{parse_season_list, ProgressTracker};
use rate_limit::RequestPacer;
use watch_log::NewWatchSession;

#[derive(Debug, Parser)]
#[command(name = "mediadiary", version, about = "Artwork lookup and watch progress tracking")]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve album cover art.
    Album { artist: String, album: String },
    /// Resolve track artwork.
    Track { artist: String, track: String },
    /// Resolve an artist image.
    Artist { artist: String },
    /// Log a watched episode.
    Log {
        #[arg(long)]
        user: String,
        #[arg(long)]
        media: String,
        #[arg(long)]
        season: u32,
        #[arg(long)]
        episode: u32,
        /// Watch date as YYYY-MM-DD (defaults to today).
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        minutes: Option<u32>,
        #[arg(long)]
        note: Option<String>,
    },
    /// List logged sessions for a media item.
    Sessions {
        #[arg(long)]
        user: String,
        #[arg(long)]
        media: String,
    },
    /// Show episode progress for a series.
    Progress {
        #[arg(long)]
        user: String,
        #[arg(long)]
        media: String,
        /// Season episode counts, e.g. "1:12,2:12". Season 0 is treated as specials.
        #[arg(long)]
        seasons: String,
        /// Override the total episode count.
        #[arg(long)]
        total: Option<u32>,
    },
    /// Show artwork cache statistics.
    CacheStats,
}

fn init_logging(verbose: bool) {
    let mut clog = colog::default_builder();
    clog.filter(
        None,
        if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        },
    );
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));
}

fn open_database(config: &Config) -> Result<DbManager, Box<dyn std::error::Error>> {
    let db_path = config
        .storage
        .resolved_database_path()
        .ok_or("Could not determine a data directory; set storage.database_path")?;
    Ok(DbManager::open(&db_path)?)
}

fn open_artwork_cache(config: &Config) -> ArtworkCache {
    let store: Box<dyn KeyValueStore> = match open_database(config) {
        Ok(db) => Box::new(db),
        Err(error) => {
            warn!(
                "Artwork cache database unavailable, caching in memory only: {}",
                error
            );
            Box::new(MemoryKeyValueStore::new())
        }
    };
    ArtworkCache::load(store, config.storage.artwork_cache_key.clone())
}

fn build_resolver(config: &Config) -> ArtworkResolver {
    let artwork_config = &config.artwork;
    let fetcher: Arc<dyn JsonFetcher> = Arc::new(UreqJsonFetcher::new(
        Duration::from_millis(artwork_config.request_timeout_ms),
        artwork_config.user_agent.clone(),
    ));
    let pacer = Arc::new(RequestPacer::new(Duration::from_millis(
        artwork_config.min_request_interval_ms,
    )));
    debug!(
        "Artwork requests paced at {}ms",
        pacer.min_interval().as_millis()
    );
    ArtworkResolver::with_default_providers(
        artwork_config,
        fetcher,
        pacer,
        open_artwork_cache(config),
    )
}

fn print_resolved(url: Option<String>) {
    if let Some(url) = url {
        println!("{url}");
    }
}

fn run(cli: Cli, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Album { artist, album } => {
            print_resolved(build_resolver(&config).resolve_album_image(&artist, &album));
        }
        Command::Track { artist, track } => {
            print_resolved(build_resolver(&config).resolve_track_image(&artist, &track));
        }
        Command::Artist { artist } => {
            print_resolved(build_resolver(&config).resolve_artist_image(&artist));
        }
        Command::Log {
            user,
            media,
            season,
            episode,
            date,
            minutes,
            note,
        } => {
            let db = open_database(&config)?;
            let session = db.log_watch_session(NewWatchSession {
                user_id: user,
                media_id: media,
                season_number: season,
                episode_number: episode,
                watched_on: date.unwrap_or_else(|| Local::now().date_naive()),
                minutes,
                note,
            })?;
            info!(
                "Logged S{:02}E{:02} of {} on {}",
                session.season_number, session.episode_number, session.media_id, session.watched_on
            );
            println!("{}", session.id);
        }
        Command::Sessions { user, media } => {
            let db = open_database(&config)?;
            for session in db.watch_sessions_for_media(&user, &media)? {
                println!(
                    "{}\tS{:02}E{:02}\t{}\t{}",
                    session.watched_on,
                    session.season_number,
                    session.episode_number,
                    session
                        .minutes
                        .map(|minutes| format!("{minutes}m"))
                        .unwrap_or_default(),
                    session.note.unwrap_or_default()
                );
            }
        }
        Command::Progress {
            user,
            media,
            seasons,
            total,
        } => {
            let seasons = parse_season_list(&seasons)?;
            let mut tracker = ProgressTracker::new();
            tracker.register_series(&media, &seasons);
            if let Some(total) = total {
                tracker.set_total(&media, total);
            }
            let db = open_database(&config)?;
            let sessions = db.watch_sessions_for_media(&user, &media)?;
            let progress = tracker.progress_for(&media, &sessions);
            println!(
                "{}/{} ({}%)",
                progress.completed, progress.total, progress.percent
            );
        }
        Command::CacheStats => {
            let cache = open_artwork_cache(&config);
            if cache.is_empty() {
                println!("artwork cache is empty");
                return Ok(());
            }
            println!(
                "{} entries ({} negative)",
                cache.len(),
                cache.negative_len()
            );
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .or_else(config::default_config_path)
        .ok_or("Could not determine a config directory; pass --config")?;
    let config = config::load_or_create_config(&config_path);

    run(cli, config)
}
