use sqlx::PgPool;

use crate::{
    db::map_db_error,
    error::AppResult,
    services::ledger::{LedgerSource, RawLedgerRow},
};

// Each bucket is its own correlated sub-aggregate so payments, service
// requests and readings never multiply each other's rows.
const LEDGER_PROJECTION: &str = "SELECT
    a.id::bigint AS apartment_id,
    (SELECT COALESCE(SUM(CAST(p.amount AS DECIMAL)), 0)
       FROM payments p
      WHERE p.apartment_id = a.id AND UPPER(p.currency::text) = 'EGP')::text AS spent_egp,
    (SELECT COALESCE(SUM(CAST(p.amount AS DECIMAL)), 0)
       FROM payments p
      WHERE p.apartment_id = a.id AND UPPER(p.currency::text) = 'GBP')::text AS spent_gbp,
    (SELECT COALESCE(SUM(CAST(sr.cost AS DECIMAL)), 0)
       FROM service_requests sr
      WHERE sr.apartment_id = a.id AND UPPER(sr.currency::text) = 'EGP')::text AS requested_egp,
    (SELECT COALESCE(SUM(CAST(sr.cost AS DECIMAL)), 0)
       FROM service_requests sr
      WHERE sr.apartment_id = a.id AND UPPER(sr.currency::text) = 'GBP')::text AS requested_gbp,
    (SELECT COALESCE(SUM(
        CASE
          WHEN ur.water_start_reading IS NOT NULL
           AND ur.water_end_reading IS NOT NULL
           AND ur.water_end_reading >= ur.water_start_reading
          THEN CAST(ur.water_end_reading - ur.water_start_reading AS DECIMAL)
               * COALESCE(CAST(v.water_price AS DECIMAL), 0)
          ELSE 0
        END
        + CASE
          WHEN ur.electricity_start_reading IS NOT NULL
           AND ur.electricity_end_reading IS NOT NULL
           AND ur.electricity_end_reading >= ur.electricity_start_reading
          THEN CAST(ur.electricity_end_reading - ur.electricity_start_reading AS DECIMAL)
               * COALESCE(CAST(v.electricity_price AS DECIMAL), 0)
          ELSE 0
        END), 0)
       FROM utility_readings ur
      WHERE ur.apartment_id = a.id AND ur.who_pays::text = 'owner')::text AS utility_egp
 FROM apartments a
 LEFT JOIN villages v ON v.id = a.village_id";

fn single_ledger_sql() -> String {
    format!("{LEDGER_PROJECTION}\n WHERE a.id = $1::bigint\n LIMIT 1")
}

fn batch_ledger_sql() -> String {
    format!("{LEDGER_PROJECTION}\n WHERE a.id = ANY($1::bigint[])\n ORDER BY a.id")
}

impl LedgerSource for PgPool {
    async fn fetch_ledger_row(&self, apartment_id: i64) -> AppResult<Option<RawLedgerRow>> {
        let sql = single_ledger_sql();
        sqlx::query_as::<_, RawLedgerRow>(&sql)
            .bind(apartment_id)
            .fetch_optional(self)
            .await
            .map_err(map_db_error)
    }

    async fn fetch_ledger_rows(&self, apartment_ids: &[i64]) -> AppResult<Vec<RawLedgerRow>> {
        let sql = batch_ledger_sql();
        sqlx::query_as::<_, RawLedgerRow>(&sql)
            .bind(apartment_ids)
            .fetch_all(self)
            .await
            .map_err(map_db_error)
    }
}
