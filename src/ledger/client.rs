use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::common::sync::SyncOutcome;

#[derive(Debug, Serialize)]
struct ElectionSubmission<'a> {
    name: &'a str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct CandidacySubmission<'a> {
    election: &'a str,
    candidate: &'a str,
    manifesto_digest: &'a str,
}

#[derive(Debug, Serialize)]
struct BallotSubmission<'a> {
    election: &'a str,
    candidacy: &'a str,
    voter: &'a str,
}

/// What the ledger returns for an accepted submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitReceipt {
    /// The ledger-side identifier of the created entity, where the endpoint
    /// creates one.
    pub on_chain_id: Option<String>,
    pub tx_ref: String,
    pub block_ref: Option<String>,
    pub status: SyncOutcome,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: u64,
}

/// HTTP client for the ledger node.
#[derive(Clone)]
pub struct LedgerClient {
    base_url: String,
    client: Client,
}

impl LedgerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ledger_url(), config.ledger_timeout())
    }

    /// Register an election on the ledger.
    pub async fn register_election(
        &self,
        name: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<SubmitReceipt> {
        let submission = ElectionSubmission {
            name,
            start_time,
            end_time,
        };
        self.post("/api/v1/elections", &submission).await
    }

    /// Register an approved candidacy on the ledger.
    pub async fn register_candidacy(
        &self,
        election: &str,
        candidate: &str,
        manifesto_digest: &str,
    ) -> Result<SubmitReceipt> {
        let submission = CandidacySubmission {
            election,
            candidate,
            manifesto_digest,
        };
        self.post("/api/v1/candidacies", &submission).await
    }

    /// Submit a cast ballot to the ledger.
    pub async fn submit_ballot(
        &self,
        election: &str,
        candidacy: &str,
        voter: &str,
    ) -> Result<SubmitReceipt> {
        let submission = BallotSubmission {
            election,
            candidacy,
            voter,
        };
        self.post("/api/v1/ballots", &submission).await
    }

    /// Get the balance of the given address.
    ///
    /// Balance is informational only, so any failure collapses to zero
    /// rather than an error.
    pub async fn get_balance(&self, address: &str) -> u64 {
        let url = format!("{}/api/v1/balance/{}", self.base_url, address);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!("Balance lookup for {address} failed: {err}");
                return 0;
            }
        };
        if !response.status().is_success() {
            warn!(
                "Balance lookup for {address} returned {}",
                response.status()
            );
            return 0;
        }
        match response.json::<BalanceResponse>().await {
            Ok(balance) => balance.balance,
            Err(err) => {
                warn!("Balance lookup for {address} returned garbage: {err}");
                0
            }
        }
    }

    /// Is the ledger node reachable and willing?
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/v1/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<SubmitReceipt> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| Error::LedgerUnavailable(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::LedgerRejected(format!("{status}: {text}")));
        }

        response
            .json::<SubmitReceipt>()
            .await
            .map_err(|err| Error::LedgerRejected(format!("malformed receipt: {err}")))
    }
}
