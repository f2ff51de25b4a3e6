//! Download of the daily case-distribution CSV.
//!
//! The publisher updates the file once a day at an unpredictable time, so a
//! download only counts once the body mentions today's report date.

use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::Client;
use tracing::{error, info, warn};

use crate::domain::DATE_REP_FMT;
use crate::error::AppError;

pub const DEFAULT_SOURCE_URL: &str = "https://opendata.ecdc.europa.eu/covid19/casedistribution/csv/";
pub const DEFAULT_MAX_RETRIES: u32 = 10;
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 1800;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Retry policy for `SourceClient::fetch_fresh`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
        }
    }
}

/// Outcome of one download attempt.
#[derive(Debug)]
enum Attempt {
    Fresh(Vec<u8>),
    Stale,
    Failed(String),
}

pub struct SourceClient {
    client: Client,
    url: String,
}

impl SourceClient {
    pub fn new(url: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::new(4, format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Download until the file carries data for `today`, or give up.
    pub fn fetch_fresh(&self, today: NaiveDate, policy: &RetryPolicy) -> Result<Vec<u8>, AppError> {
        let max_attempts = policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            info!(attempt, max_attempts, url = %self.url, "downloading source file");

            match self.attempt(today) {
                Attempt::Fresh(body) => {
                    info!(attempt, bytes = body.len(), "got updated data");
                    return Ok(body);
                }
                Attempt::Stale => warn!(attempt, %today, "data not updated yet"),
                Attempt::Failed(reason) => error!(attempt, %reason, "download failed"),
            }

            if attempt < max_attempts {
                thread::sleep(policy.interval);
            }
        }

        error!(max_attempts, "giving up");
        Err(AppError::new(
            4,
            format!("No data for {today} after {max_attempts} download attempts."),
        ))
    }

    fn attempt(&self, today: NaiveDate) -> Attempt {
        let resp = match self.client.get(&self.url).send() {
            Ok(resp) => resp,
            Err(e) => return Attempt::Failed(format!("request failed: {e}")),
        };

        if !resp.status().is_success() {
            return Attempt::Failed(format!("HTTP {}", resp.status()));
        }

        match resp.bytes() {
            Ok(body) if is_fresh(&body, today) => Attempt::Fresh(body.to_vec()),
            Ok(_) => Attempt::Stale,
            Err(e) => Attempt::Failed(format!("failed to read body: {e}")),
        }
    }
}

/// Whether the file contains rows reported on `today`.
pub fn is_fresh(body: &[u8], today: NaiveDate) -> bool {
    let needle = today.format(DATE_REP_FMT).to_string();
    String::from_utf8_lossy(body).contains(&needle)
}
