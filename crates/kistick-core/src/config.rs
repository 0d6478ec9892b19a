//! Runtime configuration, assembled once at startup and passed into the
//! components by reference. Nothing in the crate reads the environment
//! after this module has produced a [`CollectorConfig`].

use std::env;
use std::fmt::{self, Formatter};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::domain::Ticker;
use crate::ValidationError;

const REAL_BASE_URL: &str = "https://openapi.koreainvestment.com:9443";
const SANDBOX_BASE_URL: &str = "https://openapivts.koreainvestment.com:29443";

/// TR code for the current-price quote endpoint (inquire-price-2).
pub const PRICE_TR_ID: &str = "FHPST01010000";

const TOKEN_CACHE_FILE: &str = "kis_access_token.json";
const DATABASE_FILE: &str = "kistick.duckdb";

/// Delay between consecutive quote requests.
pub const DEFAULT_PACING: Duration = Duration::from_millis(400);

/// Cadence of repeated rounds in watch mode.
pub const DEFAULT_LOOP_INTERVAL: Duration = Duration::from_secs(60);

/// Default watchlist, ordered. Display names are the listed company names
/// as KIS renders them.
const DEFAULT_WATCHLIST: &[(&str, &str)] = &[
    // semiconductors
    ("005930", "삼성전자"),
    ("000660", "SK하이닉스"),
    ("000990", "DB하이텍"),
    ("042700", "한미반도체"),
    // mobility
    ("005380", "현대차"),
    ("000270", "기아"),
    ("012330", "현대모비스"),
    ("204320", "HL만도"),
    // batteries
    ("006400", "삼성SDI"),
    ("373220", "LG에너지솔루션"),
    ("096770", "SK이노베이션"),
    ("003670", "포스코퓨처엠"),
    // renewables
    ("112610", "씨에스윈드"),
    ("009830", "한화솔루션"),
    ("322000", "HD현대에너지솔루션"),
    ("100090", "SK오션플랜트"),
    // nuclear power
    ("034020", "두산에너빌리티"),
    ("052690", "한국전력기술"),
    ("298040", "효성중공업"),
    ("015760", "한국전력"),
];

/// Configuration problems detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {name}")]
    MissingVar { name: &'static str },

    #[error("invalid KIS_ENV '{value}', expected one of real, sandbox, vts")]
    InvalidEnvironment { value: String },

    #[error(transparent)]
    Ticker(#[from] ValidationError),
}

/// Which KIS deployment the collector talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Production trading host.
    Real,
    /// Mock-trading host (KIS calls it VTS).
    Sandbox,
}

impl Environment {
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        match input.trim().to_ascii_lowercase().as_str() {
            "real" => Ok(Self::Real),
            "sandbox" | "vts" => Ok(Self::Sandbox),
            _ => Err(ConfigError::InvalidEnvironment {
                value: input.to_owned(),
            }),
        }
    }

    pub const fn base_url(self) -> &'static str {
        match self {
            Self::Real => REAL_BASE_URL,
            Self::Sandbox => SANDBOX_BASE_URL,
        }
    }
}

/// App key/secret pair for the KIS Open API.
///
/// `Debug` never prints either value; diagnostics get the secret's length
/// at most.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    app_key: String,
    app_secret: String,
}

impl ApiCredentials {
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
        }
    }

    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    pub fn app_secret(&self) -> &str {
        &self.app_secret
    }

    pub fn app_secret_len(&self) -> usize {
        self.app_secret.len()
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("app_key", &"<redacted>")
            .field("app_secret_len", &self.app_secret.len())
            .finish()
    }
}

/// One watchlist row: the traded code plus the display name used in logs
/// and in the company master table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEntry {
    pub ticker: Ticker,
    pub display_name: String,
}

/// Everything the collector needs at runtime.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub credentials: ApiCredentials,
    pub environment: Environment,
    pub watchlist: Vec<WatchEntry>,
    pub dry_run: bool,
    pub home_dir: PathBuf,
    pub token_cache_path: PathBuf,
    pub db_path: PathBuf,
    pub pacing: Duration,
    pub loop_interval: Duration,
}

impl CollectorConfig {
    /// Read configuration from the process environment.
    ///
    /// | Variable | Meaning | Default |
    /// |----------|---------|---------|
    /// | `KIS_APP_KEY` / `KIS_APP_SECRET` | client credentials | required |
    /// | `KIS_ENV` | `real`, `sandbox`, or `vts` | `real` |
    /// | `DRY_RUN` | `true` disables persistence | `false` |
    /// | `KISTICK_HOME` | token cache + database directory | `~/.kistick` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let credentials = ApiCredentials::new(
            require_var("KIS_APP_KEY")?,
            require_var("KIS_APP_SECRET")?,
        );

        let environment = match optional_var("KIS_ENV") {
            Some(raw) => Environment::parse(&raw)?,
            None => Environment::Real,
        };

        let dry_run = optional_var("DRY_RUN").is_some_and(|raw| flag_enabled(&raw));
        let home_dir = resolve_home_dir();

        Ok(Self {
            credentials,
            environment,
            watchlist: default_watchlist()?,
            dry_run,
            token_cache_path: home_dir.join(TOKEN_CACHE_FILE),
            db_path: home_dir.join(DATABASE_FILE),
            home_dir,
            pacing: DEFAULT_PACING,
            loop_interval: DEFAULT_LOOP_INTERVAL,
        })
    }

    pub fn base_url(&self) -> &'static str {
        self.environment.base_url()
    }
}

/// Build the default watchlist in catalog order.
pub fn default_watchlist() -> Result<Vec<WatchEntry>, ConfigError> {
    DEFAULT_WATCHLIST
        .iter()
        .map(|(code, name)| {
            Ok(WatchEntry {
                ticker: Ticker::parse(code)?,
                display_name: (*name).to_owned(),
            })
        })
        .collect()
}

/// Default database location under the kistick home directory.
///
/// Read-only commands use this directly so they work without credentials
/// in the environment.
pub fn default_db_path() -> PathBuf {
    resolve_home_dir().join(DATABASE_FILE)
}

/// `KISTICK_HOME` if set, else `~/.kistick`, else a relative `.kistick`.
pub fn resolve_home_dir() -> PathBuf {
    if let Some(dir) = env::var_os("KISTICK_HOME") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Some(home) = env::var_os("HOME") {
        if !home.is_empty() {
            return PathBuf::from(home).join(".kistick");
        }
    }

    PathBuf::from(".kistick")
}

fn optional_var(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn require_var(name: &'static str) -> Result<String, ConfigError> {
    optional_var(name).ok_or(ConfigError::MissingVar { name })
}

fn flag_enabled(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_watchlist_is_ordered_and_complete() {
        let watchlist = default_watchlist().expect("catalog tickers are valid");
        assert_eq!(watchlist.len(), 20);
        assert_eq!(watchlist[0].ticker.as_str(), "005930");
        assert_eq!(watchlist[0].display_name, "삼성전자");
        assert_eq!(watchlist[19].ticker.as_str(), "015760");
    }

    #[test]
    fn environment_selects_base_url() {
        assert_eq!(
            Environment::parse("real").expect("parses").base_url(),
            "https://openapi.koreainvestment.com:9443"
        );
        assert_eq!(
            Environment::parse("vts").expect("parses").base_url(),
            "https://openapivts.koreainvestment.com:29443"
        );
        assert!(Environment::parse("production").is_err());
    }

    #[test]
    fn dry_run_flag_requires_literal_true() {
        assert!(flag_enabled("true"));
        assert!(flag_enabled(" TRUE "));
        assert!(!flag_enabled("1"));
        assert!(!flag_enabled("yes"));
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let credentials = ApiCredentials::new("PSabcdef", "supersecret");
        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("PSabcdef"));
        assert!(!rendered.contains("supersecret"));
        assert!(rendered.contains("app_secret_len"));
    }
}
