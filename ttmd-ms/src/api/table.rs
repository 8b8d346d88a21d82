//! Raw table viewer over the statistics database
//!
//! Read-only, paginated, limited to the known statistics tables. Sort
//! columns are validated against the schema before being spliced into
//! SQL.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{Column, Row, ValueRef};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

const PAGE_SIZE: i64 = 100;

/// Tables exposed through this endpoint
const VIEWABLE_TABLES: [&str; 5] = [
    "ncm_access_log",
    "ncm_song_info",
    "ncm_no_lyrics",
    "not_found",
    "contributors",
];

/// Query parameters for table viewing
#[derive(Debug, Deserialize)]
pub struct TableQuery {
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    pub page: i64,

    /// Column to sort by (optional)
    pub sort: Option<String>,

    /// Sort order: "asc" or "desc"
    #[serde(default = "default_order")]
    pub order: String,
}

fn default_page() -> i64 {
    1
}

fn default_order() -> String {
    "asc".to_string()
}

/// Paginated table data
#[derive(Debug, Serialize)]
pub struct TableDataResponse {
    pub table_name: String,
    pub total_rows: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// GET /api/table/:name
pub async fn get_table_data(
    State(state): State<AppState>,
    Path(table_name): Path<String>,
    Query(query): Query<TableQuery>,
) -> ApiResult<Json<TableDataResponse>> {
    if !VIEWABLE_TABLES.contains(&table_name.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "Invalid table name: {table_name}"
        )));
    }

    let total_rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table_name}"))
        .fetch_one(&state.db)
        .await
        .map_err(ttmd_common::Error::from)?;

    let total_pages = (total_rows + PAGE_SIZE - 1) / PAGE_SIZE;
    let page = query.page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * PAGE_SIZE;

    let mut sql = format!("SELECT * FROM {table_name}");
    if let Some(sort_column) = &query.sort {
        let columns = table_columns(&state, &table_name).await?;
        if !columns.contains(sort_column) {
            return Err(ApiError::BadRequest(format!(
                "Invalid column: {sort_column}"
            )));
        }
        let order = if query.order.eq_ignore_ascii_case("desc") {
            "DESC"
        } else {
            "ASC"
        };
        sql.push_str(&format!(" ORDER BY {sort_column} {order}"));
    }
    sql.push_str(&format!(" LIMIT {PAGE_SIZE} OFFSET {offset}"));

    let rows = sqlx::query(&sql)
        .fetch_all(&state.db)
        .await
        .map_err(ttmd_common::Error::from)?;

    let columns = if let Some(first_row) = rows.first() {
        first_row
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect()
    } else {
        table_columns(&state, &table_name).await?
    };

    let json_rows: Vec<Vec<serde_json::Value>> = rows
        .iter()
        .map(|row| (0..row.len()).map(|i| cell_to_json(row, i)).collect())
        .collect();

    Ok(Json(TableDataResponse {
        table_name,
        total_rows,
        page,
        page_size: PAGE_SIZE,
        total_pages,
        columns,
        rows: json_rows,
    }))
}

/// Convert one SQLite cell into a JSON value, trying the common types
fn cell_to_json(row: &sqlx::sqlite::SqliteRow, i: usize) -> serde_json::Value {
    match row.try_get_raw(i) {
        Ok(value) if value.is_null() => serde_json::Value::Null,
        Ok(_) => row
            .try_get::<String, _>(i)
            .ok()
            .map(serde_json::Value::String)
            .or_else(|| row.try_get::<i64, _>(i).ok().map(|v| json!(v)))
            .or_else(|| row.try_get::<f64, _>(i).ok().map(|v| json!(v)))
            .unwrap_or(serde_json::Value::Null),
        Err(_) => serde_json::Value::Null,
    }
}

/// Column names from the table schema
async fn table_columns(state: &AppState, table_name: &str) -> ApiResult<Vec<String>> {
    let rows = sqlx::query(&format!("PRAGMA table_info({table_name})"))
        .fetch_all(&state.db)
        .await
        .map_err(ttmd_common::Error::from)?;

    // PRAGMA table_info returns (cid, name, type, notnull, dflt_value, pk)
    Ok(rows.iter().map(|row| row.get::<String, _>(1)).collect())
}
