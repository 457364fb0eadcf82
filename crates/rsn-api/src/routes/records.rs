//! # Record Ingestion and Reads
//!
//! - `POST /v1/records` — submit one billing record.
//! - `GET  /v1/records` — list records, optionally filtered by status.
//! - `GET  /v1/records/:id` — fetch one record.
//!
//! Re-submitting a known record id returns 200 with `duplicate: true`;
//! upstream mediation systems retry, and a retry is not an error.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use rsn_core::{
    BceRecord, CurrencyCode, Imsi, OperatorId, RateCard, RecordId, SettlementStatus, Timestamp,
    UsageMetrics,
};
use rsn_ledger::IngestOutcome;

use crate::error::AppError;
use crate::state::AppState;

/// Build the records router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/records", post(submit_record).get(list_records))
        .route("/v1/records/:id", get(get_record))
}

/// A billing record as submitted by an operator's mediation system.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordSubmission {
    /// Unique record identifier, the idempotency key.
    pub record_id: String,
    /// Subscriber IMSI, audit only.
    pub imsi: String,
    /// The subscriber's home operator.
    pub home_operator: String,
    /// The network that served the subscriber.
    pub visited_operator: String,
    /// Usage quantities.
    pub usage: UsageMetrics,
    /// Per-unit wholesale rates in minor units.
    pub rates: RateCard,
    /// Declared wholesale charge in minor units.
    pub wholesale_charge_cents: u64,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Event time, RFC 3339.
    pub occurred_at: String,
}

impl RecordSubmission {
    fn into_record(self) -> Result<BceRecord, AppError> {
        Ok(BceRecord {
            record_id: RecordId::new(self.record_id)?,
            imsi: Imsi::new(self.imsi)?,
            home_operator: OperatorId::new(self.home_operator)?,
            visited_operator: OperatorId::new(self.visited_operator)?,
            usage: self.usage,
            rates: self.rates,
            wholesale_charge_cents: self.wholesale_charge_cents,
            currency: CurrencyCode::new(self.currency)?,
            occurred_at: Timestamp::parse(&self.occurred_at)?,
            status: SettlementStatus::Pending,
            settled_in_height: None,
            proof_ref: None,
        })
    }
}

/// Response to a record submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    /// The submitted record id.
    pub record_id: String,
    /// Whether the id was already known; duplicates are no-ops.
    pub duplicate: bool,
    /// Whether this record pushed its pair over the settlement threshold.
    pub settlement_triggered: bool,
}

/// Filter for record listing.
#[derive(Debug, Deserialize)]
pub struct RecordFilter {
    /// Keep only records in this settlement state.
    pub status: Option<SettlementStatus>,
}

/// Record listing response.
#[derive(Debug, Serialize)]
pub struct RecordListResponse {
    /// Number of records returned.
    pub count: usize,
    /// The records.
    pub records: Vec<BceRecord>,
}

/// POST /v1/records
async fn submit_record(
    State(state): State<AppState>,
    Json(submission): Json<RecordSubmission>,
) -> Result<Json<IngestResponse>, AppError> {
    let record = submission.into_record()?;
    let record_id = record.record_id.as_str().to_string();

    match state.ledger.ingest(record)? {
        IngestOutcome::Accepted { trigger } => Ok(Json(IngestResponse {
            record_id,
            duplicate: false,
            settlement_triggered: trigger.is_some(),
        })),
        IngestOutcome::Duplicate => Ok(Json(IngestResponse {
            record_id,
            duplicate: true,
            settlement_triggered: false,
        })),
    }
}

/// GET /v1/records
async fn list_records(
    State(state): State<AppState>,
    Query(filter): Query<RecordFilter>,
) -> Result<Json<RecordListResponse>, AppError> {
    let mut records = state.ledger.records()?;
    if let Some(status) = filter.status {
        records.retain(|r| r.status == status);
    }
    Ok(Json(RecordListResponse {
        count: records.len(),
        records,
    }))
}

/// GET /v1/records/:id
async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BceRecord>, AppError> {
    let id = RecordId::new(id)?;
    state
        .ledger
        .record(&id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("record {id} not found")))
}
