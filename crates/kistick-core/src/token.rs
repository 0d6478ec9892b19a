//! Bearer-token lifecycle for the KIS Open API.
//!
//! Tokens are valid for roughly a day, so the collector caches the last
//! issued token on disk and reuses it across process invocations. The
//! authorization endpoint also rate-limits reissuance (error EGW00133
//! when a fresh token is requested again within about a minute), which
//! is why even a *forced* refresh keeps a recently issued cache entry.

use std::fmt::{self, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Duration;
use tracing::{debug, info, warn};

use crate::config::ApiCredentials;
use crate::domain::UtcDateTime;
use crate::http_client::{HttpClient, HttpError, HttpRequest};

/// Forced refreshes reuse the cached token when it was issued more
/// recently than this, keeping us clear of the reissue rate limit.
pub const REISSUE_COOLDOWN: Duration = Duration::seconds(60);

/// Token acquisition failures. No retry happens at this level; the
/// collection loop decides whether a failure is fatal for the round.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token request to {url} failed: {source}")]
    Transport { url: String, source: HttpError },

    #[error("token endpoint {url} returned status {status}: {body}")]
    Rejected { url: String, status: u16, body: String },

    #[error("no access token in response: {body}")]
    MissingToken { body: String },
}

/// A bearer token together with the local clock time it was issued.
///
/// `issued_at` is process-local, not server-asserted; it only drives the
/// reissue cooldown.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    pub token: String,
    pub issued_at: UtcDateTime,
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("token_len", &self.token.len())
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Durable storage for the one cached token.
///
/// Failures are soft on both sides: a store that cannot be read behaves
/// as empty, and a failed save is logged and otherwise ignored. Losing
/// the cache only costs an extra token request.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<CachedToken>;
    fn save(&self, token: &CachedToken);
}

/// JSON file store, one document per collector installation.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<CachedToken> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return None,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "failed to read token cache");
                return None;
            }
        };

        match serde_json::from_str::<CachedToken>(&raw) {
            Ok(cached) if cached.token.is_empty() => None,
            Ok(cached) => Some(cached),
            Err(error) => {
                warn!(path = %self.path.display(), %error, "token cache is unreadable, ignoring it");
                None
            }
        }
    }

    fn save(&self, token: &CachedToken) {
        if let Some(parent) = self.path.parent() {
            if let Err(error) = fs::create_dir_all(parent) {
                warn!(path = %self.path.display(), %error, "failed to create token cache directory");
                return;
            }
        }

        let document = match serde_json::to_string_pretty(token) {
            Ok(document) => document,
            Err(error) => {
                warn!(%error, "failed to serialize token cache");
                return;
            }
        };

        if let Err(error) = fs::write(&self.path, document) {
            warn!(path = %self.path.display(), %error, "failed to write token cache");
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default, rename = "accessToken")]
    access_token_camel: Option<String>,
    #[serde(default, rename = "ACCESS_TOKEN")]
    access_token_upper: Option<String>,
}

impl TokenResponse {
    /// The deployed endpoints disagree on the field name; accept any of
    /// the observed spellings, skipping empty values.
    fn into_token(self) -> Option<String> {
        self.access_token
            .or(self.access_token_camel)
            .or(self.access_token_upper)
            .filter(|token| !token.is_empty())
    }
}

/// Obtains a valid bearer token, applying cache reuse and the reissue
/// cooldown. Holds no in-memory state: the store is consulted on every
/// call, so separate cron invocations share one cache.
pub struct TokenProvider {
    http: Arc<dyn HttpClient>,
    store: Arc<dyn TokenStore>,
    base_url: String,
    credentials: ApiCredentials,
}

impl TokenProvider {
    pub fn new(
        http: Arc<dyn HttpClient>,
        store: Arc<dyn TokenStore>,
        base_url: impl Into<String>,
        credentials: ApiCredentials,
    ) -> Self {
        Self {
            http,
            store,
            base_url: base_url.into(),
            credentials,
        }
    }

    /// Return a usable bearer token.
    ///
    /// With `force_refresh` unset, any cached token is trusted as-is.
    /// With it set, the cache is still reused inside [`REISSUE_COOLDOWN`];
    /// otherwise a new token is requested and cached.
    pub async fn get_token(&self, force_refresh: bool) -> Result<String, TokenError> {
        let cached = self.store.load();

        if !force_refresh {
            if let Some(cached) = cached {
                return Ok(cached.token);
            }
            return self.request_new_token().await;
        }

        if let Some(cached) = cached {
            if cached.issued_at.elapsed() < REISSUE_COOLDOWN {
                debug!(
                    issued_at = %cached.issued_at,
                    "cached token is inside the reissue cooldown, reusing it"
                );
                return Ok(cached.token);
            }
        }

        self.request_new_token().await
    }

    async fn request_new_token(&self) -> Result<String, TokenError> {
        let url = format!("{}/oauth2/tokenP", self.base_url);
        let body = serde_json::json!({
            "grant_type": "client_credentials",
            "appkey": self.credentials.app_key(),
            "appsecret": self.credentials.app_secret(),
        });

        debug!(
            url = %url,
            app_secret_len = self.credentials.app_secret_len(),
            "requesting new access token"
        );

        let request = HttpRequest::post(&url)
            .with_header("content-type", "application/json; charset=utf-8")
            .with_body(body.to_string());

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|source| TokenError::Transport {
                url: url.clone(),
                source,
            })?;

        if !response.is_success() {
            return Err(TokenError::Rejected {
                url,
                status: response.status,
                body: response.body,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&response.body).unwrap_or_default();
        let Some(token) = parsed.into_token() else {
            return Err(TokenError::MissingToken {
                body: response.body,
            });
        };

        self.store.save(&CachedToken {
            token: token.clone(),
            issued_at: UtcDateTime::now(),
        });
        info!("access token issued and cached");

        Ok(token)
    }
}
