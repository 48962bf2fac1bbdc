//! OAuth access tokens for the Google Cloud REST APIs

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

enum Source {
    Fixed(String),
    Metadata {
        client: reqwest::Client,
        cache: Mutex<Option<CachedToken>>,
    },
}

/// Supplies bearer tokens, either a fixed one or from the GCE metadata server
pub struct TokenSource {
    source: Source,
}

impl TokenSource {
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            source: Source::Fixed(token.into()),
        }
    }

    pub fn metadata(client: reqwest::Client) -> Self {
        Self {
            source: Source::Metadata {
                client,
                cache: Mutex::new(None),
            },
        }
    }

    pub async fn token(&self) -> Result<String> {
        let (client, cache) = match &self.source {
            Source::Fixed(token) => return Ok(token.clone()),
            Source::Metadata { client, cache } => (client, cache),
        };

        let mut cached = cache.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!("Fetching access token from the metadata server");
        let response = client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .context("Metadata server unreachable")?;

        if !response.status().is_success() {
            anyhow::bail!("Metadata server returned {}", response.status());
        }

        let token: MetadataToken = response
            .json()
            .await
            .context("Failed to parse metadata token")?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }
}
