// Shared test doubles and fixtures for the kistick behavior suites.

use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::OffsetDateTime;

use kistick_core::{
    ApiCredentials, CachedToken, Collector, CollectorConfig, CompanyId, Environment, HttpClient,
    HttpError, HttpRequest, HttpResponse, PriceFetcher, PriceSnapshot, RunReport, SnapshotStore,
    StoreError, Ticker, TokenProvider, TokenStore, UtcDateTime, WatchEntry,
};

pub const TEST_APP_KEY: &str = "test-app-key";
pub const TEST_APP_SECRET: &str = "test-app-secret";

// =============================================================================
// Scripted HTTP transport
// =============================================================================

/// HTTP double that records every request and answers from a queue of
/// scripted responses. An exhausted queue turns into a transport error,
/// so a test that forgets a script fails loudly instead of hanging.
#[derive(Default)]
pub struct ScriptedHttpClient {
    requests: Mutex<Vec<HttpRequest>>,
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, status: u16, body: impl Into<String>) {
        self.responses
            .lock()
            .expect("responses lock")
            .push_back(Ok(HttpResponse::new(status, body)));
    }

    pub fn push_transport_error(&self, message: &str) {
        self.responses
            .lock()
            .expect("responses lock")
            .push_back(Err(HttpError::new(message)));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    /// Recorded requests whose URL contains `fragment`.
    pub fn requests_to(&self, fragment: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.url.contains(fragment))
            .collect()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests.lock().expect("requests lock").push(request);
        let scripted = self
            .responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::new("no scripted response left")));

        Box::pin(async move { scripted })
    }
}

// =============================================================================
// In-memory token cache
// =============================================================================

/// Token store double with the same soft semantics as the file store.
#[derive(Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<CachedToken>>,
}

impl MemoryTokenStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn seeded(token: &str, issued_at: UtcDateTime) -> Self {
        Self {
            slot: Mutex::new(Some(CachedToken {
                token: token.to_owned(),
                issued_at,
            })),
        }
    }

    pub fn cached(&self) -> Option<CachedToken> {
        self.slot.lock().expect("slot lock").clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<CachedToken> {
        self.slot.lock().expect("slot lock").clone()
    }

    fn save(&self, token: &CachedToken) {
        *self.slot.lock().expect("slot lock") = Some(token.clone());
    }
}

/// A cache timestamp `age` before now.
pub fn issued_ago(age: time::Duration) -> UtcDateTime {
    UtcDateTime::from_offset_datetime(OffsetDateTime::now_utc() - age)
}

pub fn issued_just_now() -> UtcDateTime {
    UtcDateTime::now()
}

// =============================================================================
// Recording persistence strategy
// =============================================================================

/// Everything a [`RecordingStore`] observed, in call order.
#[derive(Debug, Default)]
pub struct StoreLog {
    pub schema_calls: usize,
    pub begun_runs: Vec<String>,
    pub companies: Vec<(String, String)>,
    pub inserted: Vec<(CompanyId, PriceSnapshot)>,
    pub finished: Vec<RunReport>,
}

/// Persistence double that captures every call in a shared [`StoreLog`]
/// the test keeps a handle to.
#[derive(Default)]
pub struct RecordingStore {
    log: Arc<Mutex<StoreLog>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_handle(&self) -> Arc<Mutex<StoreLog>> {
        Arc::clone(&self.log)
    }
}

impl SnapshotStore for RecordingStore {
    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        self.log.lock().expect("log lock").schema_calls += 1;
        Ok(())
    }

    fn begin_run(&mut self, run_id: &str) -> Result<(), StoreError> {
        self.log
            .lock()
            .expect("log lock")
            .begun_runs
            .push(run_id.to_owned());
        Ok(())
    }

    fn resolve_or_create_company(
        &mut self,
        ticker: &Ticker,
        display_name: &str,
    ) -> Result<CompanyId, StoreError> {
        let mut log = self.log.lock().expect("log lock");
        if let Some(position) = log
            .companies
            .iter()
            .position(|(code, _)| code == ticker.as_str())
        {
            return Ok(position as CompanyId + 1);
        }

        log.companies
            .push((ticker.as_str().to_owned(), display_name.to_owned()));
        Ok(log.companies.len() as CompanyId)
    }

    fn insert_snapshot(
        &mut self,
        company_id: CompanyId,
        snapshot: &PriceSnapshot,
    ) -> Result<(), StoreError> {
        self.log
            .lock()
            .expect("log lock")
            .inserted
            .push((company_id, snapshot.clone()));
        Ok(())
    }

    fn end_run(&mut self, report: &RunReport) -> Result<(), StoreError> {
        self.log
            .lock()
            .expect("log lock")
            .finished
            .push(report.clone());
        Ok(())
    }
}

// =============================================================================
// Response bodies
// =============================================================================

pub fn token_body(token: &str) -> String {
    serde_json::json!({
        "access_token": token,
        "token_type": "Bearer",
        "expires_in": 86_400,
    })
    .to_string()
}

/// A complete quote payload with every field populated.
pub fn quote_body(date: &str, hour: &str, price: &str) -> String {
    serde_json::json!({
        "rt_cd": "0",
        "output": {
            "stck_bsop_date": date,
            "stck_cntg_hour": hour,
            "stck_prpr": price,
            "stck_oprc": "70600",
            "stck_hgpr": "71500",
            "stck_lwpr": "70100",
            "acml_vol": "12345678",
            "stck_prdy_clpr": "70500",
        }
    })
    .to_string()
}

// =============================================================================
// Collector assembly
// =============================================================================

pub fn test_config(tickers: &[(&str, &str)]) -> CollectorConfig {
    let home_dir = PathBuf::from("unused-in-tests");
    let watchlist = tickers
        .iter()
        .map(|(code, name)| WatchEntry {
            ticker: Ticker::parse(code).expect("valid test ticker"),
            display_name: (*name).to_owned(),
        })
        .collect();

    CollectorConfig {
        credentials: ApiCredentials::new(TEST_APP_KEY, TEST_APP_SECRET),
        environment: Environment::Sandbox,
        watchlist,
        dry_run: false,
        token_cache_path: home_dir.join("kis_access_token.json"),
        db_path: home_dir.join("kistick.duckdb"),
        home_dir,
        pacing: Duration::from_millis(1),
        loop_interval: Duration::from_secs(60),
    }
}

pub struct CollectorFixture {
    pub collector: Collector,
    pub http: Arc<ScriptedHttpClient>,
    pub token_cache: Arc<MemoryTokenStore>,
    pub log: Arc<Mutex<StoreLog>>,
}

/// Wire a collector to scripted doubles: HTTP transport, token cache,
/// and a recording store standing in for the warehouse.
pub fn collector_fixture(
    tickers: &[(&str, &str)],
    token_cache: Arc<MemoryTokenStore>,
) -> CollectorFixture {
    let config = Arc::new(test_config(tickers));
    let http = Arc::new(ScriptedHttpClient::new());
    let store = RecordingStore::new();
    let log = store.log_handle();

    let tokens = TokenProvider::new(
        http.clone(),
        token_cache.clone(),
        config.base_url(),
        config.credentials.clone(),
    );
    let fetcher = PriceFetcher::new(http.clone(), config.base_url(), config.credentials.clone());
    let collector = Collector::new(config, tokens, fetcher, Box::new(store));

    CollectorFixture {
        collector,
        http,
        token_cache,
        log,
    }
}
