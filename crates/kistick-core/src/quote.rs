//! Current-price quote endpoint (`inquire-price-2`) and the
//! normalization of its payload into [`PriceSnapshot`] records.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use time::format_description::BorrowedFormatItem;
use time::macros::{format_description, offset};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use tracing::debug;

use crate::config::{ApiCredentials, PRICE_TR_ID};
use crate::domain::{PriceSnapshot, Ticker};
use crate::http_client::{HttpClient, HttpError, HttpRequest};

/// Body markers the API uses when it rejects an access token. Observed
/// vocabulary varies between deployments; any match counts.
const TOKEN_INVALID_MARKERS: &[&str] =
    &["접근토큰", "기간이 만료된 token", "유효하지 않은 token"];

const TRADE_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]");
const TRADE_TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[hour][minute][second]");

/// KRX trades on KST. Quote payloads carry naive date/time fields, so
/// the fallback clock must be the exchange clock, not the host's.
const MARKET_UTC_OFFSET: UtcOffset = offset!(+9);

/// Quote fetch failures for a single ticker.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("quote request failed: {source}")]
    Transport { source: HttpError },

    #[error("quote endpoint returned status {status}: {body}")]
    Rejected {
        status: u16,
        body: String,
        token_invalid: bool,
    },

    #[error("quote response is not valid JSON: {source}")]
    Decode {
        #[from]
        source: serde_json::Error,
    },

    #[error("quote response has no output payload: {body}")]
    MissingOutput { body: String },

    #[error("quote response carries malformed {field}: '{value}'")]
    Timestamp { field: &'static str, value: String },
}

impl QuoteError {
    /// Build the rejection variant, classifying token invalidity once
    /// here instead of re-parsing formatted messages at call sites.
    pub fn rejected(status: u16, body: String) -> Self {
        let token_invalid = status == 401
            || status == 403
            || TOKEN_INVALID_MARKERS
                .iter()
                .any(|marker| body.contains(marker));

        Self::Rejected {
            status,
            body,
            token_invalid,
        }
    }

    /// True when the upstream rejection looks like an expired or invalid
    /// access token rather than any other failure.
    pub fn is_token_rejection(&self) -> bool {
        matches!(
            self,
            Self::Rejected {
                token_invalid: true,
                ..
            }
        )
    }
}

#[derive(Debug, Deserialize)]
struct QuoteEnvelope {
    #[serde(default)]
    output: Option<QuoteOutput>,
}

/// The `output` object, named exactly as the API names its fields.
/// Everything is optional text; normalization fills the gaps.
#[derive(Debug, Default, Deserialize)]
struct QuoteOutput {
    #[serde(default)]
    stck_bsop_date: Option<String>,
    #[serde(default)]
    stck_cntg_hour: Option<String>,
    #[serde(default)]
    stck_prpr: Option<String>,
    #[serde(default)]
    stck_oprc: Option<String>,
    #[serde(default)]
    stck_hgpr: Option<String>,
    #[serde(default)]
    stck_lwpr: Option<String>,
    #[serde(default)]
    acml_vol: Option<String>,
    #[serde(default)]
    stck_prdy_clpr: Option<String>,
}

/// Fetches one current-price snapshot per call. Stateless; the caller
/// supplies the bearer token so the retry protocol stays in the loop.
pub struct PriceFetcher {
    http: Arc<dyn HttpClient>,
    base_url: String,
    credentials: ApiCredentials,
}

impl PriceFetcher {
    pub fn new(
        http: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        credentials: ApiCredentials,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            credentials,
        }
    }

    /// Fetch and normalize the current-price snapshot for `ticker`.
    pub async fn fetch_snapshot(
        &self,
        ticker: &Ticker,
        token: &str,
    ) -> Result<PriceSnapshot, QuoteError> {
        let url = format!(
            "{}/uapi/domestic-stock/v1/quotations/inquire-price-2\
             ?FID_COND_MRKT_DIV_CODE=J&FID_INPUT_ISCD={}",
            self.base_url,
            urlencoding::encode(ticker.as_str()),
        );

        debug!(ticker = %ticker, url = %url, "requesting price snapshot");

        let request = HttpRequest::get(&url)
            .with_header("content-type", "application/json; charset=utf-8")
            .with_bearer(token)
            .with_header("appkey", self.credentials.app_key())
            .with_header("appsecret", self.credentials.app_secret())
            .with_header("tr_id", PRICE_TR_ID)
            .with_header("tr_cont", "N");

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|source| QuoteError::Transport { source })?;

        if !response.is_success() {
            return Err(QuoteError::rejected(response.status, response.body));
        }

        let envelope: QuoteEnvelope = serde_json::from_str(&response.body)?;
        let Some(output) = envelope.output else {
            return Err(QuoteError::MissingOutput {
                body: response.body,
            });
        };

        build_snapshot(ticker, output)
    }
}

fn build_snapshot(ticker: &Ticker, output: QuoteOutput) -> Result<PriceSnapshot, QuoteError> {
    Ok(PriceSnapshot {
        ticker: ticker.clone(),
        observed_at: observed_at(&output)?,
        current_price: text_or_zero(output.stck_prpr),
        open_price: text_or_zero(output.stck_oprc),
        high_price: text_or_zero(output.stck_hgpr),
        low_price: text_or_zero(output.stck_lwpr),
        cumulative_volume: text_or_zero(output.acml_vol),
        previous_close: text_or_zero(output.stck_prdy_clpr),
    })
}

/// Quantity fields keep their exact upstream text; missing or empty
/// fields become the literal `"0"`.
fn text_or_zero(value: Option<String>) -> String {
    match value {
        Some(text) if !text.is_empty() => text,
        _ => String::from("0"),
    }
}

/// Combine the payload's trade date (`YYYYMMDD`) and time (`HHMMSS`).
/// Either field may be absent or empty; the exchange wall clock fills
/// the gap per field. Present but unparseable fields are an error.
fn observed_at(output: &QuoteOutput) -> Result<PrimitiveDateTime, QuoteError> {
    let fallback = market_now();

    let date = match output.stck_bsop_date.as_deref() {
        Some(raw) if !raw.is_empty() => {
            Date::parse(raw, TRADE_DATE_FORMAT).map_err(|_| QuoteError::Timestamp {
                field: "stck_bsop_date",
                value: raw.to_owned(),
            })?
        }
        _ => fallback.date(),
    };

    let time = match output.stck_cntg_hour.as_deref() {
        Some(raw) if !raw.is_empty() => {
            Time::parse(raw, TRADE_TIME_FORMAT).map_err(|_| QuoteError::Timestamp {
                field: "stck_cntg_hour",
                value: raw.to_owned(),
            })?
        }
        _ => fallback.time(),
    };

    Ok(PrimitiveDateTime::new(date, time))
}

fn market_now() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc().to_offset(MARKET_UTC_OFFSET);
    PrimitiveDateTime::new(now.date(), now.time())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use time::Duration;

    use super::*;

    fn ticker() -> Ticker {
        Ticker::parse("005930").expect("valid ticker")
    }

    #[test]
    fn classifies_auth_statuses_as_token_invalid() {
        assert!(QuoteError::rejected(401, String::new()).is_token_rejection());
        assert!(QuoteError::rejected(403, String::new()).is_token_rejection());
    }

    #[test]
    fn classifies_marker_bodies_as_token_invalid() {
        let body = r#"{"msg1":"기간이 만료된 token 입니다"}"#.to_owned();
        assert!(QuoteError::rejected(400, body).is_token_rejection());
    }

    #[test]
    fn server_errors_are_not_token_rejections() {
        assert!(!QuoteError::rejected(500, "internal error".to_owned()).is_token_rejection());
    }

    #[test]
    fn builds_snapshot_from_complete_output() {
        let output = QuoteOutput {
            stck_bsop_date: Some("20240101".to_owned()),
            stck_cntg_hour: Some("093000".to_owned()),
            stck_prpr: Some("71000".to_owned()),
            stck_oprc: Some("70500".to_owned()),
            stck_hgpr: Some("71500".to_owned()),
            stck_lwpr: Some("70300".to_owned()),
            acml_vol: Some("1234567".to_owned()),
            stck_prdy_clpr: Some("70900".to_owned()),
        };

        let snapshot = build_snapshot(&ticker(), output).expect("builds");
        assert_eq!(snapshot.observed_at, datetime!(2024-01-01 09:30:00));
        assert_eq!(snapshot.current_price, "71000");
        assert_eq!(snapshot.cumulative_volume, "1234567");
    }

    #[test]
    fn missing_and_empty_quantities_become_zero_text() {
        let output = QuoteOutput {
            stck_bsop_date: Some("20240101".to_owned()),
            stck_cntg_hour: Some("093000".to_owned()),
            stck_prpr: Some("71000".to_owned()),
            stck_oprc: Some(String::new()),
            ..QuoteOutput::default()
        };

        let snapshot = build_snapshot(&ticker(), output).expect("builds");
        assert_eq!(snapshot.current_price, "71000");
        assert_eq!(snapshot.open_price, "0");
        assert_eq!(snapshot.high_price, "0");
        assert_eq!(snapshot.low_price, "0");
        assert_eq!(snapshot.cumulative_volume, "0");
        assert_eq!(snapshot.previous_close, "0");
    }

    #[test]
    fn absent_date_and_time_fall_back_to_market_clock() {
        let snapshot =
            build_snapshot(&ticker(), QuoteOutput::default()).expect("builds");
        let drift = market_now() - snapshot.observed_at;
        assert!(drift.abs() < Duration::seconds(5));
    }

    #[test]
    fn unparseable_date_is_an_error() {
        let output = QuoteOutput {
            stck_bsop_date: Some("2024-01-01".to_owned()),
            ..QuoteOutput::default()
        };

        let err = build_snapshot(&ticker(), output).expect_err("must fail");
        assert!(matches!(
            err,
            QuoteError::Timestamp {
                field: "stck_bsop_date",
                ..
            }
        ));
    }
}
