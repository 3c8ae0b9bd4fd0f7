#![forbid(unsafe_code)]

//! Per-game copy and search vocabulary.
//!
//! Everything that differs between games (display name, prompt flavor text,
//! the terms a search hit must mention, SEO keywords, scoring weights) is data
//! loaded from TOML, so adding a game never touches code.

use std::{collections::HashSet, fs, path::Path};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

const BUILTIN_CATALOG: &str = include_str!("../config/games.toml");

/// Flavor text used when the game id has no catalog entry.
pub const GENERIC_FLAVOR: &str =
    "奥深いシステムと戦略性が魅力のゲーム。仕組みを理解するほどプレイが上達する。";

/// Spam-like markers rejected by every search, whatever the caller asks for.
pub const EXCLUDED_TERMS: &[&str] = &[
    "rmt",
    "代行",
    "チート",
    "cheat",
    "無料配布",
    "giveaway",
    "プレゼント企画",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeight {
    pub term: String,
    pub weight: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameProfile {
    pub id: i64,
    pub display_name: String,
    pub flavor: String,
    pub base_query: String,
    /// A search hit is kept only when its title or description contains at
    /// least one of these (case-insensitive).
    pub required_terms: Vec<String>,
    pub seo_keywords: Vec<String>,
    pub focus_terms: Vec<String>,
    #[serde(default)]
    pub scoring: Vec<ScoreWeight>,
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "game")]
    games: Vec<GameProfile>,
}

#[derive(Debug, Clone)]
pub struct GameCatalog {
    games: Vec<GameProfile>,
}

impl GameCatalog {
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_CATALOG).context("parsing built-in game catalog")
    }

    /// Reads `path` when given, otherwise the catalog compiled into the binary.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("reading game catalog {}", path.display()))?;
                Self::from_toml_str(&raw)
                    .with_context(|| format!("parsing game catalog {}", path.display()))
            }
            None => Self::builtin(),
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(raw)?;
        let mut seen = HashSet::new();
        for game in &file.games {
            if !seen.insert(game.id) {
                bail!("game id {} is declared twice", game.id);
            }
            if game.required_terms.iter().all(|term| term.trim().is_empty()) {
                bail!("game {} has no required terms", game.id);
            }
        }
        Ok(Self { games: file.games })
    }

    pub fn get(&self, id: i64) -> Option<&GameProfile> {
        self.games.iter().find(|game| game.id == id)
    }

    /// Picks the requested game, falling back to `default_id` when the id is
    /// absent or unknown.
    pub fn resolve(&self, id: Option<i64>, default_id: i64) -> Option<&GameProfile> {
        id.and_then(|id| self.get(id))
            .or_else(|| self.get(default_id))
    }

    pub fn flavor_for(&self, id: i64) -> &str {
        self.get(id)
            .map(|game| game.flavor.as_str())
            .unwrap_or(GENERIC_FLAVOR)
    }

    pub fn games(&self) -> &[GameProfile] {
        &self.games
    }
}
