//! postsync - compose once, publish to X, Tumblr and Threads

mod output;

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use libpostsync::logging::LoggingConfig;
use libpostsync::{Config, Draft, Platform, PostSyncError, PostSyncService, PublishOutcome};
use tracing::{debug, warn};

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "postsync")]
#[command(version, about = "Compose a post once and publish it to several platforms")]
#[command(after_help = r#"EXAMPLES:
    postsync login tumblr alice app-password
    postsync post "New print in the shop" --image ~/shots/print.png --tag art
    postsync post "Launch day" --retries 2 --format json
    postsync history --limit 5
    postsync tags ph

EXIT CODES:
    0 - Success
    1 - Error, or some platforms still failing after retries
    2 - Authentication error
    3 - Invalid input
    4 - Store migration failed"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database path (overrides the config file)
    #[arg(long, global = true, env = "POSTSYNC_DB", value_name = "PATH")]
    db: Option<String>,

    /// Config file path
    #[arg(long, global = true, env = "POSTSYNC_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show schema version and platform connections
    Status,

    /// Connect a platform and store its token
    Login {
        /// Platform (x, tumblr, threads)
        platform: String,

        username: String,

        /// Password or app password (read from stdin when omitted)
        credential: Option<String>,
    },

    /// Trim images, then publish to every connected platform
    Post {
        content: String,

        /// Image path or file:// URI (repeatable, order is kept)
        #[arg(short, long = "image", value_name = "URI")]
        images: Vec<String>,

        /// Tag (repeatable)
        #[arg(short, long = "tag", value_name = "TAG")]
        tags: Vec<String>,

        /// Skip border trimming
        #[arg(long)]
        no_trim: bool,

        /// Extra rounds for platforms that failed
        #[arg(long, default_value = "0", value_name = "N")]
        retries: u32,
    },

    /// Save a draft without publishing
    Draft {
        content: String,

        #[arg(short, long = "image", value_name = "URI")]
        images: Vec<String>,

        #[arg(short, long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },

    /// List stored posts, newest first
    History {
        #[arg(short, long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Suggest previously used tags matching a query
    Tags { query: String },

    /// Remove dark side borders from images
    Trim {
        #[arg(required = true, value_name = "URI")]
        uris: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<PostSyncError>()
                .map(PostSyncError::exit_code)
                .unwrap_or(1);
            std::process::exit(code);
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) if path.exists() => Config::load_from_path(path)?,
        Some(path) => {
            debug!("Config {} not found, using defaults", path.display());
            Config::default()
        }
        None => Config::load_or_default()?,
    };
    if let Some(db) = &cli.db {
        config.database.path = db.clone();
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<i32> {
    let format: OutputFormat = cli.format.parse().map_err(anyhow::Error::msg)?;
    let config = load_config(&cli)?;
    let service = PostSyncService::from_config(config).await?;

    let code = match cli.command {
        Commands::Status => {
            let version = service.store().schema_version().await?;
            let connections = service.connections().await?;
            output::status(format, version, &connections)?;
            0
        }

        Commands::Login {
            platform,
            username,
            credential,
        } => {
            let platform: Platform = platform.parse()?;
            let credential = match credential {
                Some(credential) => credential,
                None => read_stdin_line().context("Failed to read credential from stdin")?,
            };
            service.login(platform, &username, &credential).await?;
            output::message(format, &format!("Connected to {} as {}", platform, username))?;
            0
        }

        Commands::Post {
            content,
            images,
            tags,
            no_trim,
            retries,
        } => {
            let images = if no_trim || images.is_empty() {
                images
            } else {
                service.trimmer().process_list(&images).await?
            };
            let draft = Draft::new(content).with_images(images).with_tags(tags);
            let connected = service.connected_platforms().await?;

            let mut session = service.session(draft);
            let mut outcome = session.publish(&connected).await?;
            let mut round = 0;
            while !outcome.is_complete() && round < retries {
                round += 1;
                warn!("Retrying failed platforms (attempt {} of {})", round, retries);
                outcome = session.publish(&connected).await?;
            }

            output::outcome(format, &outcome)?;
            match outcome {
                PublishOutcome::Partial { .. } => 1,
                _ => 0,
            }
        }

        Commands::Draft {
            content,
            images,
            tags,
        } => {
            let draft = Draft::new(content).with_images(images).with_tags(tags);
            service.drafts().save(&draft).await?;
            output::message(format, "Draft saved")?;
            0
        }

        Commands::History { limit } => {
            let posts = service.history(limit).await?;
            output::posts(format, &posts)?;
            0
        }

        Commands::Tags { query } => {
            let tags = service.posts().get_tag_suggestions(&query).await?;
            output::lines(format, &tags)?;
            0
        }

        Commands::Trim { uris } => {
            let trimmed = service.trimmer().process_list(&uris).await?;
            output::lines(format, &trimmed)?;
            0
        }
    };

    service.close().await;
    Ok(code)
}

fn read_stdin_line() -> Result<String> {
    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    let line = buffer.lines().next().unwrap_or_default().trim().to_string();
    Ok(line)
}
