//! Apartment financial ledger: money paid in, money owed, and the net balance
//! per currency.
//!
//! Data access is behind [`LedgerSource`]; everything after the fetch is the
//! pure [`summarize`] step, which the single and batch paths share.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "EGP")]
    Egp,
    #[serde(rename = "GBP")]
    Gbp,
}

impl Currency {
    pub const ALL: [Currency; 2] = [Currency::Egp, Currency::Gbp];
}

/// One slot per supported currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrencyAmounts {
    #[serde(rename = "EGP")]
    pub egp: f64,
    #[serde(rename = "GBP")]
    pub gbp: f64,
}

impl CurrencyAmounts {
    pub fn new(egp: f64, gbp: f64) -> Self {
        Self { egp, gbp }
    }

    pub fn get(&self, currency: Currency) -> f64 {
        match currency {
            Currency::Egp => self.egp,
            Currency::Gbp => self.gbp,
        }
    }

    pub fn add_to(&mut self, currency: Currency, amount: f64) {
        match currency {
            Currency::Egp => self.egp += amount,
            Currency::Gbp => self.gbp += amount,
        }
    }

    /// Component-wise `self - other`.
    pub fn minus(&self, other: &CurrencyAmounts) -> CurrencyAmounts {
        let mut result = *self;
        for currency in Currency::ALL {
            result.add_to(currency, -other.get(currency));
        }
        result
    }
}

/// Aggregates exactly as the store returns them: decimal sums rendered as
/// text, `None` for SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct RawLedgerRow {
    pub apartment_id: i64,
    pub spent_egp: Option<String>,
    pub spent_gbp: Option<String>,
    pub requested_egp: Option<String>,
    pub requested_gbp: Option<String>,
    pub utility_egp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialSummary {
    pub apartment_id: i64,
    pub total_money_spent: CurrencyAmounts,
    pub total_money_requested: CurrencyAmounts,
    pub net_money: CurrencyAmounts,
}

pub trait LedgerSource {
    /// Raw aggregates for one apartment, `None` when the id does not resolve.
    fn fetch_ledger_row(
        &self,
        apartment_id: i64,
    ) -> impl Future<Output = AppResult<Option<RawLedgerRow>>> + Send;

    /// Raw aggregates for every id that resolves, in one round trip.
    fn fetch_ledger_rows(
        &self,
        apartment_ids: &[i64],
    ) -> impl Future<Output = AppResult<Vec<RawLedgerRow>>> + Send;
}

pub async fn compute_financial_summary<S>(
    source: &S,
    apartment_id: i64,
) -> AppResult<FinancialSummary>
where
    S: LedgerSource + Sync,
{
    if apartment_id <= 0 {
        return Err(apartment_not_found(apartment_id));
    }

    let raw = source
        .fetch_ledger_row(apartment_id)
        .await?
        .ok_or_else(|| apartment_not_found(apartment_id))?;

    Ok(summarize(&raw))
}

/// Net balances for many apartments in one query. Ids that do not resolve are
/// left out of the result.
pub async fn batch_compute_balances<S>(
    source: &S,
    apartment_ids: &[i64],
) -> AppResult<BTreeMap<i64, CurrencyAmounts>>
where
    S: LedgerSource + Sync,
{
    let ids = apartment_ids
        .iter()
        .copied()
        .filter(|id| *id > 0)
        .collect::<BTreeSet<i64>>()
        .into_iter()
        .collect::<Vec<_>>();
    if ids.is_empty() {
        return Ok(BTreeMap::new());
    }

    let rows = source.fetch_ledger_rows(&ids).await?;
    tracing::debug!(
        requested = ids.len(),
        resolved = rows.len(),
        "Computed batch apartment balances"
    );

    Ok(rows
        .iter()
        .map(|raw| (raw.apartment_id, summarize(raw).net_money))
        .collect())
}

pub fn summarize(raw: &RawLedgerRow) -> FinancialSummary {
    let id = raw.apartment_id;

    let total_money_spent = CurrencyAmounts::new(
        parse_bucket(id, "spent_egp", raw.spent_egp.as_deref()),
        parse_bucket(id, "spent_gbp", raw.spent_gbp.as_deref()),
    );

    let utility_egp = parse_bucket(id, "utility_egp", raw.utility_egp.as_deref());
    let mut total_money_requested = CurrencyAmounts::new(
        parse_bucket(id, "requested_egp", raw.requested_egp.as_deref()),
        parse_bucket(id, "requested_gbp", raw.requested_gbp.as_deref()),
    );
    // Utility prices are EGP-only.
    total_money_requested.add_to(Currency::Egp, utility_egp);
    total_money_requested.egp = clamp_amount(id, "total_requested_egp", total_money_requested.egp);

    let net_money = total_money_requested.minus(&total_money_spent);

    FinancialSummary {
        apartment_id: id,
        total_money_spent,
        total_money_requested,
        net_money,
    }
}

fn parse_bucket(apartment_id: i64, bucket: &str, raw: Option<&str>) -> f64 {
    let Some(text) = raw else {
        return 0.0;
    };
    match text.trim().parse::<f64>() {
        Ok(value) => clamp_amount(apartment_id, bucket, value),
        Err(_) => {
            tracing::warn!(
                apartment_id,
                bucket,
                raw = text,
                "Unparsable ledger aggregate; using 0"
            );
            0.0
        }
    }
}

/// Every bucket is reported rounded to cents, so an owner-paid utility cost
/// of 3.333 comes back as 3.33. Negative or non-finite values become 0.
fn clamp_amount(apartment_id: i64, bucket: &str, value: f64) -> f64 {
    if !value.is_finite() || value < 0.0 {
        tracing::warn!(
            apartment_id,
            bucket,
            value,
            "Invalid ledger aggregate; clamping to 0"
        );
        return 0.0;
    }
    let rounded = round2(value);
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Values too large to scale by 100 carry no cents and are returned as is.
fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / 100.0
}

fn apartment_not_found(apartment_id: i64) -> AppError {
    AppError::NotFound(format!("Apartment {apartment_id} not found."))
}
