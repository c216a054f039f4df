use serde::Deserialize;
use validator::Validate;

use crate::{config::DEFAULT_EXPORT_ROW_CAP, error::AppError};

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

pub fn clamp_limit_in_range(limit: i64, min: i64, max: i64) -> i64 {
    limit.clamp(min, max)
}

fn default_export_limit() -> i64 {
    DEFAULT_EXPORT_ROW_CAP
}
fn default_order_by() -> String {
    "id".to_string()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApartmentPath {
    pub apartment_id: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ApartmentExportQuery {
    #[validate(range(min = 1))]
    pub village_id: Option<i64>,
    #[validate(range(min = 1))]
    pub owner_id: Option<i64>,
    #[validate(range(min = 1))]
    pub phase: Option<i64>,
    #[validate(length(max = 255))]
    pub search: Option<String>,
    #[serde(default = "default_export_limit")]
    pub limit: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub offset: i64,
    #[serde(default = "default_order_by")]
    pub order_by: String,
    #[serde(default = "default_true")]
    pub ascending: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BatchBalancesInput {
    #[validate(length(min = 1, max = 50000))]
    pub apartment_ids: Vec<i64>,
}
