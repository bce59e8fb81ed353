use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

const GOOGLE_PUBLIC_KEYS_URL: &str =
    "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";

const DEFAULT_MAX_AGE_SECS: u64 = 3600;

#[derive(Error, Debug)]
pub enum KeyFetchError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("No public key with id {0}")]
    UnknownKeyId(String),
}

#[derive(Clone)]
struct CachedKeys {
    keys: HashMap<String, String>,
    expires_at: Instant,
}

/// Fetches and caches the X.509 certificates that sign Firebase ID tokens.
///
/// The certificates rotate; the cache honours the `max-age` the endpoint
/// sends and refetches once it lapses or an unknown key id shows up.
#[derive(Clone)]
pub struct PublicKeyManager {
    client: Client,
    url: String,
    cache: Arc<RwLock<Option<CachedKeys>>>,
}

impl Default for PublicKeyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PublicKeyManager {
    pub fn new() -> Self {
        Self::with_url(GOOGLE_PUBLIC_KEYS_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            cache: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn get_key(&self, kid: &str) -> Result<String, KeyFetchError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = &*cache {
                if Instant::now() < cached.expires_at {
                    if let Some(key) = cached.keys.get(kid) {
                        return Ok(key.clone());
                    }
                }
            }
        }

        self.refresh_keys().await?;

        let cache = self.cache.read().await;
        cache
            .as_ref()
            .and_then(|cached| cached.keys.get(kid).cloned())
            .ok_or_else(|| KeyFetchError::UnknownKeyId(kid.to_string()))
    }

    async fn refresh_keys(&self) -> Result<(), KeyFetchError> {
        let response = self.client.get(&self.url).send().await?.error_for_status()?;

        let max_age = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|h| h.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(DEFAULT_MAX_AGE_SECS);

        let keys: HashMap<String, String> = response.json().await?;
        tracing::debug!(count = keys.len(), max_age, "refreshed token signing keys");

        let mut cache = self.cache.write().await;
        *cache = Some(CachedKeys {
            keys,
            expires_at: Instant::now() + Duration::from_secs(max_age),
        });

        Ok(())
    }
}

fn parse_max_age(cache_control: &str) -> Option<u64> {
    cache_control.split(',').find_map(|part| {
        part.trim()
            .strip_prefix("max-age=")
            .and_then(|v| v.parse::<u64>().ok())
    })
}
