#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_ACADEMY_PORT: u16 = 8080;
pub const DEFAULT_ACADEMY_HOST: &str = "127.0.0.1";
pub const DEFAULT_SITE_URL: &str = "http://localhost:8080";
pub const DEFAULT_GAME_ID: i64 = 1;
pub const DEFAULT_IMAGES_BUCKET: &str = "images";
pub const DEFAULT_GAME_IMAGES_BUCKET: &str = "game-images";

/// Connection details for the content database. `url` is either a local file
/// path or the URL of a hosted libsql database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
}

impl DatabaseConfig {
    pub fn is_remote(&self) -> bool {
        ["libsql://", "https://", "http://"]
            .iter()
            .any(|scheme| self.url.starts_with(scheme))
    }
}

#[derive(Debug, Clone)]
pub struct YouTubeConfig {
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub url: String,
    pub service_key: String,
    pub images_bucket: String,
    pub game_images_bucket: String,
}

/// Everything the server and CLI need at startup. External service sections
/// stay `None` when their keys are missing; the operations that need them
/// answer with `ServiceUnavailable` instead.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub site_url: String,
    pub default_game_id: i64,
    pub games_file: Option<PathBuf>,
    pub admin_password: Option<String>,
    pub database: Option<DatabaseConfig>,
    pub youtube: Option<YouTubeConfig>,
    pub gemini: Option<GeminiConfig>,
    pub storage: Option<StorageConfig>,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub env_path: Option<PathBuf>,
}

pub fn load_settings(overrides: SettingsOverrides) -> Result<Settings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    Ok(build_settings(&file_vars, env_var_string, overrides))
}

fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: SettingsOverrides,
) -> Settings {
    let get = |key: &str| lookup_value(key, file_vars, &env_lookup);

    let host = overrides
        .host
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| get("ACADEMY_HOST"))
        .unwrap_or_else(|| DEFAULT_ACADEMY_HOST.to_string());
    let port = overrides
        .port
        .or_else(|| get("ACADEMY_PORT").and_then(|value| value.parse::<u16>().ok()))
        .unwrap_or(DEFAULT_ACADEMY_PORT);
    let site_url = get("ACADEMY_SITE_URL")
        .map(|value| value.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_SITE_URL.to_string());
    let default_game_id = get("DEFAULT_GAME_ID")
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(DEFAULT_GAME_ID);

    let database = get("DATABASE_URL").map(|url| DatabaseConfig {
        url,
        auth_token: get("DATABASE_AUTH_TOKEN"),
    });
    let youtube = get("YOUTUBE_API_KEY").map(|api_key| YouTubeConfig { api_key });
    let gemini = get("GEMINI_API_KEY").map(|api_key| GeminiConfig { api_key });
    let storage = match (get("STORAGE_URL"), get("STORAGE_SERVICE_KEY")) {
        (Some(url), Some(service_key)) => Some(StorageConfig {
            url: url.trim_end_matches('/').to_string(),
            service_key,
            images_bucket: get("STORAGE_IMAGES_BUCKET")
                .unwrap_or_else(|| DEFAULT_IMAGES_BUCKET.to_string()),
            game_images_bucket: get("STORAGE_GAME_IMAGES_BUCKET")
                .unwrap_or_else(|| DEFAULT_GAME_IMAGES_BUCKET.to_string()),
        }),
        _ => None,
    };

    Settings {
        host,
        port,
        site_url,
        default_game_id,
        games_file: get("GAMES_FILE").map(PathBuf::from),
        admin_password: get("ADMIN_PASSWORD"),
        database,
        youtube,
        gemini,
        storage,
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| non_blank(&value))
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).and_then(|value| non_blank(value)))
}

/// Parses a dotenv-style file. A missing file yields an empty map.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        vars.insert(key.to_string(), unquote(value_raw.trim()).to_string());
    }
    Ok(vars)
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|quote| {
            value
                .strip_prefix(*quote)
                .and_then(|inner| inner.strip_suffix(*quote))
        })
        .unwrap_or(value)
}
