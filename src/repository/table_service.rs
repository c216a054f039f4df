use serde_json::Value;
use sqlx::{postgres::PgRow, Postgres, QueryBuilder, Row};

use crate::{db::map_db_error, error::AppError};

const ALLOWED_TABLES: &[&str] = &["apartments"];

/// A `WHERE` clause on one column of the listed table.
#[derive(Debug, Clone, PartialEq)]
pub enum RowFilter {
    Equals(&'static str, i64),
    /// Case-insensitive `LIKE`; the pattern is bound as given.
    ILike(&'static str, String),
}

/// Filtered, ordered page of rows as JSON objects. `max_limit` bounds the
/// page size for the caller's use case.
#[allow(clippy::too_many_arguments)]
pub async fn list_rows(
    pool: &sqlx::PgPool,
    table: &str,
    filters: &[RowFilter],
    limit: i64,
    max_limit: i64,
    offset: i64,
    order_by: &str,
    ascending: bool,
) -> Result<Vec<Value>, AppError> {
    let mut query = build_list_query(table, filters, limit, max_limit, offset, order_by, ascending)?;
    let rows = query.build().fetch_all(pool).await.map_err(map_db_error)?;
    Ok(read_rows(rows))
}

pub async fn get_row(
    pool: &sqlx::PgPool,
    table: &str,
    row_id: i64,
    id_field: &str,
) -> Result<Value, AppError> {
    let table_name = validate_table(table)?;
    let id_name = validate_identifier(id_field)?;

    let mut query = QueryBuilder::<Postgres>::new("SELECT row_to_json(t) AS row FROM ");
    query
        .push(table_name)
        .push(" t WHERE t.")
        .push(id_name)
        .push(" = ")
        .push_bind(row_id)
        .push(" LIMIT 1");

    let row = query
        .build()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?;

    row.and_then(|value| value.try_get::<Option<Value>, _>("row").ok().flatten())
        .ok_or_else(|| AppError::NotFound(format!("{table_name} record not found.")))
}

pub async fn count_rows(
    pool: &sqlx::PgPool,
    table: &str,
    filters: &[RowFilter],
) -> Result<i64, AppError> {
    let mut query = build_count_query(table, filters)?;
    let row = query.build().fetch_one(pool).await.map_err(map_db_error)?;
    row.try_get::<i64, _>("total").map_err(map_db_error)
}

fn build_count_query(
    table: &str,
    filters: &[RowFilter],
) -> Result<QueryBuilder<'static, Postgres>, AppError> {
    let table_name = validate_table(table)?;

    let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*)::bigint AS total FROM ");
    query.push(table_name).push(" t WHERE 1=1");
    push_filters(&mut query, filters)?;
    Ok(query)
}

fn build_list_query(
    table: &str,
    filters: &[RowFilter],
    limit: i64,
    max_limit: i64,
    offset: i64,
    order_by: &str,
    ascending: bool,
) -> Result<QueryBuilder<'static, Postgres>, AppError> {
    let table_name = validate_table(table)?;
    let order_name = if order_by.trim().is_empty() {
        "id"
    } else {
        validate_identifier(order_by)?
    };

    let mut query = QueryBuilder::<Postgres>::new("SELECT row_to_json(t) AS row FROM ");
    query.push(table_name).push(" t WHERE 1=1");
    push_filters(&mut query, filters)?;

    query.push(" ORDER BY t.").push(order_name);
    if ascending {
        query.push(" ASC");
    } else {
        query.push(" DESC");
    }
    // Stable pagination when the order column has ties.
    if order_name != "id" {
        query.push(", t.id ASC");
    }
    query
        .push(" LIMIT ")
        .push_bind(limit.clamp(1, max_limit.max(1)))
        .push(" OFFSET ")
        .push_bind(offset.max(0));

    Ok(query)
}

fn push_filters(
    query: &mut QueryBuilder<'static, Postgres>,
    filters: &[RowFilter],
) -> Result<(), AppError> {
    for filter in filters {
        match filter {
            RowFilter::Equals(column, value) => {
                query
                    .push(" AND t.")
                    .push(validate_identifier(column)?)
                    .push(" = ")
                    .push_bind(*value);
            }
            RowFilter::ILike(column, pattern) => {
                query
                    .push(" AND t.")
                    .push(validate_identifier(column)?)
                    .push("::text ILIKE ")
                    .push_bind(pattern.clone());
            }
        }
    }
    Ok(())
}

fn read_rows(rows: Vec<PgRow>) -> Vec<Value> {
    rows.into_iter()
        .filter_map(|row| row.try_get::<Option<Value>, _>("row").ok().flatten())
        .collect()
}

fn validate_table(table: &str) -> Result<&str, AppError> {
    let normalized = validate_identifier(table)?;
    if ALLOWED_TABLES.contains(&normalized) {
        return Ok(normalized);
    }
    Err(AppError::Forbidden(format!(
        "Table '{normalized}' is not allowed."
    )))
}

fn validate_identifier(identifier: &str) -> Result<&str, AppError> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(
            "Identifier cannot be empty.".to_string(),
        ));
    }
    let valid_chars = trimmed.chars().all(|character| {
        character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_'
    });
    let starts_with_digit = trimmed
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_digit());
    if !valid_chars || starts_with_digit {
        return Err(AppError::BadRequest(format!(
            "Invalid identifier '{trimmed}'."
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::{build_count_query, build_list_query, validate_identifier, validate_table, RowFilter};

    #[test]
    fn restricts_tables() {
        assert!(validate_table("apartments").is_ok());
        assert!(validate_table("users").is_err());
        assert!(validate_table("1apartments").is_err());
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        assert!(validate_identifier("name").is_ok());
        assert!(validate_identifier("Name; DROP").is_err());
        assert!(validate_identifier("  ").is_err());
    }

    #[test]
    fn list_sql_binds_filters_and_caps_limit() {
        let filters = [
            RowFilter::ILike("name", "%palm%".to_string()),
            RowFilter::Equals("village_id", 3),
        ];

        let query =
            build_list_query("apartments", &filters, 75_000, 50_000, 0, "name", true).unwrap();
        let sql = query.sql();
        assert!(sql.starts_with("SELECT row_to_json(t) AS row FROM apartments t WHERE 1=1"));
        assert!(sql.contains("t.name::text ILIKE $1"));
        assert!(sql.contains("t.village_id = $2"));
        assert!(sql.contains("ORDER BY t.name ASC, t.id ASC LIMIT $3 OFFSET $4"));
    }

    #[test]
    fn list_sql_orders_by_id_without_tiebreak() {
        let query = build_list_query("apartments", &[], 10, 50, 5, "", false).unwrap();
        assert!(query.sql().ends_with("ORDER BY t.id DESC LIMIT $1 OFFSET $2"));
        assert!(build_list_query("apartments", &[], 10, 50, 0, "name desc", true).is_err());
    }

    #[test]
    fn count_sql_shares_filters() {
        let query = build_count_query("apartments", &[RowFilter::Equals("owner_id", 9)]).unwrap();
        assert_eq!(
            query.sql(),
            "SELECT COUNT(*)::bigint AS total FROM apartments t WHERE 1=1 AND t.owner_id = $1"
        );
    }
}
