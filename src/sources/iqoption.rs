//! IQ Option gateway client.
//!
//! Talks to the REST bridge in front of the IQ Option account: session
//! login, historical candles and the digital open-instrument schedule.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::types::Candle;

use super::body_snippet;

const CONNECT_RETRY_SECS: u64 = 2;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Open/closed schedule entry for one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentState {
    pub open: bool,
}

/// Read access to market data. The aggregator and the lifecycle tracker
/// only see this trait, so tests can script the feed.
pub trait MarketFeed: Send + Sync {
    /// Fetch up to `count` candles of `interval_secs` each, ending at the
    /// candle that covers `to_ts`. Returned oldest first.
    fn candles<'a>(
        &'a self,
        instrument: &'a str,
        interval_secs: i64,
        count: u32,
        to_ts: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Candle>>> + Send + 'a>>;

    /// Current open/closed schedule for digital instruments.
    fn open_instruments<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<BTreeMap<String, InstrumentState>>> + Send + 'a>>;
}

/// Gateway candle payload.
#[derive(Debug, Deserialize)]
struct CandleDto {
    from: i64,
    open: f64,
    close: f64,
    max: f64,
    min: f64,
    #[serde(default)]
    volume: f64,
}

impl From<CandleDto> for Candle {
    fn from(dto: CandleDto) -> Self {
        Self {
            start_time: dto.from,
            open: dto.open,
            close: dto.close,
            high: dto.max,
            low: dto.min,
            volume: dto.volume,
        }
    }
}

/// Gateway open-time payload. Only the digital book matters here.
#[derive(Debug, Deserialize)]
struct OpenTimeResponse {
    #[serde(default)]
    digital: BTreeMap<String, InstrumentState>,
}

#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    balance: f64,
}

/// IQ Option gateway REST client.
#[derive(Clone)]
pub struct IqOptionClient {
    client: Client,
    base_url: String,
    email: String,
    password: String,
}

impl IqOptionClient {
    /// Create a new gateway client.
    pub fn new(base_url: String, email: String, password: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("Augury/1.0")
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url,
            email,
            password,
        }
    }

    /// Establish a gateway session, retrying until it succeeds.
    pub async fn connect(&self) {
        loop {
            match self.login().await {
                Ok(balance) => {
                    info!("Gateway session established, balance: {:.2}", balance);
                    return;
                }
                Err(e) => {
                    warn!("Gateway connect failed, retrying: {}", e);
                    tokio::time::sleep(std::time::Duration::from_secs(CONNECT_RETRY_SECS)).await;
                }
            }
        }
    }

    async fn login(&self) -> Result<f64> {
        let url = format!("{}/session", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&SessionRequest {
                email: &self.email,
                password: &self.password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::DataFetch(format!(
                "gateway session error: {}",
                status
            )));
        }

        let session: SessionResponse = response.json().await?;
        Ok(session.balance)
    }
}

impl MarketFeed for IqOptionClient {
    fn candles<'a>(
        &'a self,
        instrument: &'a str,
        interval_secs: i64,
        count: u32,
        to_ts: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Candle>>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("{}/candles", self.base_url);
            let response = self
                .client
                .get(&url)
                .query(&[
                    ("instrument", instrument.to_string()),
                    ("interval", interval_secs.to_string()),
                    ("count", count.to_string()),
                    ("to", to_ts.to_string()),
                ])
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                warn!(
                    "Gateway candles returned {}: {}",
                    status,
                    body_snippet(&text)
                );
                return Err(AppError::DataFetch(format!(
                    "gateway candles error: {}",
                    status
                )));
            }

            let dtos: Vec<CandleDto> = response.json().await?;
            Ok(dtos.into_iter().map(Candle::from).collect())
        })
    }

    fn open_instruments<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<BTreeMap<String, InstrumentState>>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("{}/instruments/open", self.base_url);
            let response = self.client.get(&url).send().await?;

            if !response.status().is_success() {
                let status = response.status();
                return Err(AppError::DataFetch(format!(
                    "gateway open-time error: {}",
                    status
                )));
            }

            let body: OpenTimeResponse = response.json().await?;
            Ok(body.digital)
        })
    }
}
