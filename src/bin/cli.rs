#![forbid(unsafe_code)]

//! Terminal front-end for the ingestion and generation operations. Every
//! command prints its result as pretty JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gamestudy_academy::{
    api::AppState,
    article::{ArticleRequest, generate_article},
    config::{SettingsOverrides, load_settings},
    ingest::{AddVideoRequest, SearchSpec, add_video, advanced_search},
    telemetry::init_tracing,
};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(name = "academy-cli", about = "Run academy content operations from a terminal")]
struct Cli {
    /// Dotenv file to read before the process environment.
    #[arg(long = "env-file", global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store one video by id or URL.
    AddVideo {
        /// Video id or any watch / short / embed URL.
        video: String,
        #[arg(long)]
        game_id: Option<i64>,
    },
    /// Search the platform and store every matching video.
    Search(SearchArgs),
    /// Generate an article for a stored video.
    Generate(GenerateArgs),
}

#[derive(Debug, Args)]
struct SearchArgs {
    #[arg(long, short)]
    query: Option<String>,
    #[arg(long = "require")]
    required: Vec<String>,
    #[arg(long = "exclude")]
    excluded: Vec<String>,
    #[arg(long = "channel")]
    channels: Vec<String>,
    #[arg(long)]
    max_results: Option<u32>,
    #[arg(long)]
    game_id: Option<i64>,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    video_id: String,
    #[arg(long = "category")]
    categories: Vec<i64>,
    #[arg(long)]
    boss: Option<i64>,
    #[arg(long)]
    strategy: Option<i64>,
    #[arg(long)]
    class: Option<i64>,
    #[arg(long)]
    tip: Option<i64>,
    #[arg(long)]
    dungeon: Option<i64>,
    #[arg(long)]
    story: Option<i64>,
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("warn")?;

    let settings = load_settings(SettingsOverrides {
        env_path: cli.env_file,
        ..SettingsOverrides::default()
    })?;
    let state = AppState::from_settings(&settings)
        .await
        .context("initializing services")?;
    let store = state.store()?;

    match cli.command {
        Command::AddVideo { video, game_id } => {
            let request = if video.contains('/') {
                AddVideoRequest {
                    url: Some(video),
                    game_id,
                    ..AddVideoRequest::default()
                }
            } else {
                AddVideoRequest {
                    video_id: Some(video),
                    game_id,
                    ..AddVideoRequest::default()
                }
            };
            let added = add_video(store, state.platform()?, request, state.default_game_id).await?;
            print_json(&added)
        }
        Command::Search(args) => {
            let spec = SearchSpec {
                query: args.query,
                required_keywords: args.required,
                exclude_keywords: args.excluded,
                max_results: args.max_results,
                channels: args.channels,
                game_id: args.game_id,
            };
            let report = advanced_search(
                store,
                state.platform()?,
                &state.catalog,
                spec,
                state.default_game_id,
            )
            .await?;
            print_json(&report)
        }
        Command::Generate(args) => {
            let request = ArticleRequest {
                video_id: Some(args.video_id),
                category_id: None,
                category_ids: args.categories,
                related_boss_id: args.boss,
                related_strategy_id: args.strategy,
                related_class_id: args.class,
                related_tip_id: args.tip,
                related_dungeon_id: args.dungeon,
                related_story_id: args.story,
            };
            let outcome =
                generate_article(store, state.generator()?, &state.catalog, request).await?;
            print_json(&outcome)
        }
    }
}
