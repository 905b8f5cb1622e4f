//! Steam Web API client for owned games and achievement unlocks.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::SourcePlatform;
use crate::domain::{AchievementUnlockRecord, SourceLibraryEntry};

const STEAM_API_BASE: &str = "https://api.steampowered.com";

/// Steam Web API settings
#[derive(Debug, Clone)]
pub struct SteamConfig {
    pub api_key: String,
    pub api_base: String,
}

impl SteamConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: STEAM_API_BASE.to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("STEAM_API_KEY")
            .context("STEAM_API_KEY environment variable required")?;
        Ok(Self::new(api_key))
    }
}

#[derive(Debug, Deserialize)]
struct OwnedGamesEnvelope {
    response: OwnedGamesResponse,
}

#[derive(Debug, Default, Deserialize)]
struct OwnedGamesResponse {
    #[serde(default)]
    games: Vec<OwnedGame>,
}

#[derive(Debug, Deserialize)]
struct OwnedGame {
    appid: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    playtime_forever: i64,
}

#[derive(Debug, Deserialize)]
struct PlayerStatsEnvelope {
    playerstats: PlayerStats,
}

#[derive(Debug, Deserialize)]
struct PlayerStats {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    achievements: Vec<PlayerAchievement>,
}

#[derive(Debug, Deserialize)]
struct PlayerAchievement {
    apiname: String,
    achieved: u8,
}

/// Steam Web API client
pub struct SteamClient {
    cfg: SteamConfig,
    http: Client,
}

impl SteamClient {
    pub fn new(cfg: SteamConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to construct Steam HTTP client")?;
        Ok(Self { cfg, http })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(SteamConfig::from_env()?)
    }

    fn api_url(&self, interface: &str, method: &str) -> String {
        format!("{}/{}/{}/v1/", self.cfg.api_base, interface, method)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .query(&[("key", self.cfg.api_key.as_str()), ("format", "json")])
            .query(query)
            .send()
            .await
            .with_context(|| format!("Steam request failed: {}", url))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        // GetPlayerAchievements answers 400 with a playerstats error body
        // for titles without stats, so decode before checking the status.
        match serde_json::from_str::<T>(&text) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => {
                Err(anyhow!("Steam API error (status={}): {}", status, text))
            }
            Err(err) => Err(anyhow!("failed to parse Steam payload ({err}): {text}")),
        }
    }
}

fn owned_games_to_entries(response: OwnedGamesResponse) -> Vec<SourceLibraryEntry> {
    response
        .games
        .into_iter()
        .map(|game| SourceLibraryEntry {
            external_app_id: game.appid.to_string(),
            raw_name: game.name.unwrap_or_default(),
            playtime_minutes: game.playtime_forever,
        })
        .collect()
}

fn player_stats_to_records(stats: PlayerStats) -> Result<Vec<AchievementUnlockRecord>> {
    if !stats.success {
        anyhow::bail!(
            "Steam achievements unavailable: {}",
            stats.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
    Ok(stats
        .achievements
        .into_iter()
        .map(|a| AchievementUnlockRecord {
            api_name: a.apiname,
            achieved: a.achieved != 0,
        })
        .collect())
}

#[async_trait]
impl SourcePlatform for SteamClient {
    fn name(&self) -> &str {
        "steam"
    }

    async fn list_owned_titles(&self, source_user_id: &str) -> Result<Vec<SourceLibraryEntry>> {
        let url = self.api_url("IPlayerService", "GetOwnedGames");
        let envelope: OwnedGamesEnvelope = self
            .get_json(
                &url,
                &[
                    ("steamid", source_user_id),
                    ("include_appinfo", "1"),
                    ("include_played_free_games", "1"),
                ],
            )
            .await?;
        Ok(owned_games_to_entries(envelope.response))
    }

    async fn list_achievements(
        &self,
        source_user_id: &str,
        external_app_id: &str,
    ) -> Result<Vec<AchievementUnlockRecord>> {
        let url = self.api_url("ISteamUserStats", "GetPlayerAchievements");
        let envelope: PlayerStatsEnvelope = self
            .get_json(&url, &[("steamid", source_user_id), ("appid", external_app_id)])
            .await?;
        player_stats_to_records(envelope.playerstats)
    }
}
