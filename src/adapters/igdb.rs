//! IGDB catalog client.
//!
//! Queries are Apicalypse bodies POSTed to `/v4/games`. Authentication uses a
//! Twitch client-credentials token that is cached until shortly before expiry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::CatalogClient;
use crate::domain::CanonicalCandidate;

const TWITCH_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const IGDB_GAMES_ENDPOINT: &str = "https://api.igdb.com/v4/games";
const IGDB_MAX_LIMIT: usize = 500;
const CANDIDATE_FIELDS: &str = "id,name,category,version_parent,aggregated_rating";

/// Connection settings for IGDB
#[derive(Debug, Clone)]
pub struct IgdbConfig {
    pub client_id: String,
    pub client_secret: String,
    pub games_endpoint: String,
    pub token_url: String,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl IgdbConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            games_endpoint: IGDB_GAMES_ENDPOINT.to_string(),
            token_url: TWITCH_TOKEN_URL.to_string(),
            max_retries: 3,
            backoff_ms: 1000,
        }
    }

    /// Read credentials and retry tuning from the environment
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("TWITCH_CLIENT_ID")
            .context("missing env: TWITCH_CLIENT_ID (required for IGDB)")?;
        let client_secret = std::env::var("TWITCH_CLIENT_SECRET")
            .context("missing env: TWITCH_CLIENT_SECRET (required for IGDB)")?;

        let mut cfg = Self::new(client_id, client_secret);
        if let Ok(v) = std::env::var("IGDB_MAX_RETRIES") {
            if let Ok(n) = v.parse::<u32>() {
                cfg.max_retries = n;
            }
        }
        if let Ok(v) = std::env::var("IGDB_BACKOFF_MS") {
            if let Ok(n) = v.parse::<u64>() {
                cfg.backoff_ms = n;
            }
        }
        Ok(cfg)
    }
}

#[derive(Debug, Deserialize)]
struct TwitchTokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct IgdbToken {
    access_token: String,
    expires_at: Instant,
}

/// Game record as returned for [`CANDIDATE_FIELDS`]
#[derive(Debug, Clone, Deserialize)]
struct IgdbGame {
    id: i64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    category: Option<i32>,
    #[serde(default)]
    version_parent: Option<i64>,
    #[serde(default)]
    aggregated_rating: Option<f64>,
}

/// IGDB `category` of a main game
const MAIN_GAME: i32 = 0;

/// Stand-in for a record that carries no category; never a base title
const UNKNOWN_CATEGORY: i32 = -1;

impl IgdbGame {
    /// `missing_category` fills in records the server sent without one
    fn into_candidate(self, missing_category: i32) -> Option<CanonicalCandidate> {
        Some(CanonicalCandidate {
            catalog_id: self.id,
            name: self.name?,
            category: self.category.unwrap_or(missing_category),
            version_parent_id: self.version_parent,
            aggregated_rating: self.aggregated_rating,
        })
    }
}

pub struct IgdbCatalogClient {
    cfg: IgdbConfig,
    http: Client,
    token: Arc<Mutex<Option<IgdbToken>>>,
}

impl IgdbCatalogClient {
    pub fn new(cfg: IgdbConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("shelfsync/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to construct IGDB HTTP client")?;
        Ok(Self {
            cfg,
            http,
            token: Arc::new(Mutex::new(None)),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(IgdbConfig::from_env()?)
    }

    async fn ensure_token(&self) -> Result<String> {
        {
            let guard = self.token.lock().await;
            if let Some(token) = guard.as_ref() {
                if token.expires_at > Instant::now() + Duration::from_secs(30) {
                    return Ok(token.access_token.clone());
                }
            }
        }
        let token = self.request_new_token().await?;
        let mut guard = self.token.lock().await;
        *guard = Some(token.clone());
        Ok(token.access_token)
    }

    async fn request_new_token(&self) -> Result<IgdbToken> {
        let response = self
            .http
            .post(&self.cfg.token_url)
            .query(&[
                ("client_id", self.cfg.client_id.as_str()),
                ("client_secret", self.cfg.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .context("requesting Twitch OAuth token")?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "twitch token request failed (status={}): {}",
                status,
                text
            ));
        }
        let token: TwitchTokenResponse = response
            .json()
            .await
            .context("failed to parse Twitch token response")?;
        let ttl = token.expires_in.saturating_sub(30).max(30);
        Ok(IgdbToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(ttl),
        })
    }

    async fn fetch_games(&self, body: String) -> Result<Vec<IgdbGame>> {
        let mut attempt = 0u32;
        loop {
            let token = self.ensure_token().await?;
            let response = self
                .http
                .post(&self.cfg.games_endpoint)
                .header("Client-ID", &self.cfg.client_id)
                .header("Content-Type", "text/plain")
                .header("Authorization", format!("Bearer {}", token))
                .body(body.clone())
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let text = resp.text().await?;
                        return serde_json::from_str(&text).map_err(|err| {
                            anyhow!("failed to parse IGDB payload ({err}): {text}")
                        });
                    }

                    if status == StatusCode::UNAUTHORIZED {
                        let mut guard = self.token.lock().await;
                        *guard = None;
                    }

                    let retryable = status == StatusCode::TOO_MANY_REQUESTS
                        || status == StatusCode::UNAUTHORIZED
                        || status.is_server_error();
                    if retryable && attempt < self.cfg.max_retries {
                        self.backoff(attempt).await;
                        attempt += 1;
                        continue;
                    }

                    let text = resp.text().await.unwrap_or_default();
                    return Err(anyhow!("igdb request failed (status={}): {}", status, text));
                }
                Err(err) => {
                    if attempt >= self.cfg.max_retries {
                        return Err(err).context("igdb request failed after retries");
                    }
                    self.backoff(attempt).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn backoff(&self, attempt: u32) {
        let wait = self.cfg.backoff_ms * u64::from(attempt + 1);
        debug!(attempt, wait_ms = wait, "Backing off before IGDB retry");
        tokio::time::sleep(Duration::from_millis(wait)).await;
    }

    async fn fetch_candidates(
        &self,
        body: String,
        missing_category: i32,
    ) -> Result<Vec<CanonicalCandidate>> {
        let games = self.fetch_games(body).await?;
        Ok(candidates_from(games, missing_category))
    }
}

#[async_trait]
impl CatalogClient for IgdbCatalogClient {
    fn name(&self) -> &str {
        "igdb"
    }

    async fn exact_name_batch(
        &self,
        names: &[String],
        limit: usize,
    ) -> Result<Vec<CanonicalCandidate>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        // The query itself pins category = 0
        self.fetch_candidates(build_exact_name_query(names, limit), MAIN_GAME)
            .await
    }

    async fn text_search(&self, query: &str, limit: usize) -> Result<Vec<CanonicalCandidate>> {
        self.fetch_candidates(build_search_query(query, limit), UNKNOWN_CATEGORY)
            .await
    }
}

fn candidates_from(games: Vec<IgdbGame>, missing_category: i32) -> Vec<CanonicalCandidate> {
    games
        .into_iter()
        .filter_map(|game| game.into_candidate(missing_category))
        .collect()
}

/// Quote a value for use inside an Apicalypse string literal
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn build_exact_name_query(names: &[String], limit: usize) -> String {
    let list = names
        .iter()
        .map(|name| quote(name))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "fields {CANDIDATE_FIELDS}; where name = ({list}) & category = 0 & version_parent = null; limit {};",
        limit.clamp(1, IGDB_MAX_LIMIT)
    )
}

fn build_search_query(query: &str, limit: usize) -> String {
    format!(
        "search {}; fields {CANDIDATE_FIELDS}; where version_parent = null; limit {};",
        quote(query),
        limit.clamp(1, IGDB_MAX_LIMIT)
    )
}
