//! `crosspoint`: browse the catalog and manage likes from the terminal.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crosspoint_client::config::{ClientConfig, API_URL_ENV, DEFAULT_API_URL};
use crosspoint_client::{CrossPoint, ExploreCategory, StaticIdentity, ToggleOutcome};
use crosspoint_core::models::{Game, ImageSize};
use crosspoint_core::{GameId, IdentityProvider, User, UserId};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "crosspoint")]
#[command(about = "CrossPoint catalog client")]
struct Cli {
    /// API origin
    #[arg(long, env = API_URL_ENV, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Bearer token for authenticated commands
    #[arg(long, env = "CROSSPOINT_TOKEN", requires = "uid")]
    token: Option<String>,

    /// User id the token belongs to
    #[arg(long, env = "CROSSPOINT_UID", requires = "token")]
    uid: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the five explore listings
    Explore {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Search the catalog
    Search {
        query: String,
        #[arg(long, default_value_t = 50)]
        page_size: usize,
        /// Extra pages to load after the first
        #[arg(long, default_value_t = 0)]
        more: usize,
    },
    /// Show one game
    Game { id: u64 },
    /// Like a game
    Like { id: u64 },
    /// Remove a like
    Unlike { id: u64 },
    /// List your playlists
    Playlists,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.with_target(false).init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn identity(cli: &Cli) -> Arc<dyn IdentityProvider> {
    match (&cli.uid, &cli.token) {
        (Some(uid), Some(token)) => Arc::new(StaticIdentity::signed_in(
            User {
                uid: UserId(uid.clone()),
                email: None,
                display_name: None,
            },
            token.clone(),
        )),
        _ => Arc::new(StaticIdentity::anonymous()),
    }
}

fn print_game(game: &Game) {
    let year = game
        .first_release_date
        .map(|ts| 1970 + ts / 31_556_952)
        .map_or_else(String::new, |y| format!(" ({y})"));
    println!("{:>8}  {}{}", game.id, game.title(), year);
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ClientConfig::from_env().with_base_url(cli.api_url.clone());
    match cli.command {
        Command::Explore { limit } => config.explore_limit = limit,
        Command::Search { page_size, .. } => config.search_page_size = page_size,
        _ => {}
    }
    let client = CrossPoint::new(config, identity(&cli));
    client.start().await.context("restoring session")?;

    let result = execute(&client, cli.command).await;
    client.shutdown().await;
    result
}

async fn execute(client: &CrossPoint, command: Command) -> Result<()> {
    match command {
        Command::Explore { .. } => {
            let data = client.explore_feed().load().await;
            for category in ExploreCategory::ALL {
                println!("== {category}");
                for game in data.games(category) {
                    print_game(game);
                }
            }
            if let Some(error) = data.error {
                eprintln!("some categories failed: {error}");
            }
        }
        Command::Search { query, more, .. } => {
            let mut pager = client.search(&query);
            let Some(mut entry) = pager.load().await else {
                bail!("search query is empty");
            };
            for _ in 0..more {
                if !pager.can_load_more() {
                    break;
                }
                match pager.load_more().await {
                    Some(next) => entry = next,
                    None => break,
                }
            }
            if let Some(error) = entry.error {
                bail!(error.message);
            }
            let page = entry.value.unwrap_or_default();
            for game in &page.results {
                print_game(game);
            }
            debug!(shown = page.results.len(), more = pager.can_load_more(), "search done");
        }
        Command::Game { id } => {
            let game = client.api().game(GameId(id)).await?;
            print_game(&game);
            if let Some(summary) = &game.summary {
                println!("\n{summary}");
            }
            let platforms = game.platform_labels();
            if !platforms.is_empty() {
                println!("\nPlatforms: {}", platforms.join(", "));
            }
            if let Some(cover) = game.cover_url(ImageSize::CoverBig) {
                println!("Cover: {cover}");
            }
        }
        Command::Like { id } => set_like(client, GameId(id), true).await?,
        Command::Unlike { id } => set_like(client, GameId(id), false).await?,
        Command::Playlists => {
            let entry = client.my_playlists().load().await;
            if let Some(error) = entry.error {
                bail!(error.message);
            }
            for playlist in entry.value.unwrap_or_default() {
                println!(
                    "{:>6}  {} ({} games{})",
                    playlist.id,
                    playlist.name.as_deref().unwrap_or("Untitled"),
                    playlist.games.len(),
                    if playlist.is_public() { "" } else { ", private" }
                );
            }
        }
    }
    Ok(())
}

async fn set_like(client: &CrossPoint, game: GameId, like: bool) -> Result<()> {
    let toggle = client.like_toggle(game).await;
    let outcome = if like { toggle.like().await } else { toggle.unlike().await };
    match outcome {
        ToggleOutcome::Committed(_) | ToggleOutcome::Ignored => {
            let state = if toggle.displayed() { "liked" } else { "not liked" };
            println!("game {game}: {state}");
            Ok(())
        }
        ToggleOutcome::SignInRequired => bail!("sign in required: pass --token and --uid"),
        ToggleOutcome::Reverted { error } => bail!(error),
        ToggleOutcome::Detached => bail!("like request abandoned"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
