//! One compiled mapping: the generated SELECT and its execution.

use crate::config::MappingConfig;
use crate::protocol::Item;
use crate::router::{RouterError, VALUE_SEPARATOR};
use sqlx::mysql::MySqlPool;
use sqlx::{Executor, Row};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

/// Per-query deadline for row lookups.
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced by a row lookup. The rendered message is echoed to
/// the client as a `CLIENT_ERROR` reason.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query deadline exceeded")]
    DeadlineExceeded,
    #[error("{0}")]
    Query(#[from] sqlx::Error),
}

/// A mapping compiled against the database: the SELECT text, the value
/// column list, and the pool it executes on.
///
/// The statement text is validated with an explicit prepare at
/// construction; at request time sqlx executes it through its
/// per-connection prepared-statement cache.
#[derive(Debug)]
pub(crate) struct TableMapping {
    pool: MySqlPool,
    query: String,
    columns: Vec<String>,
}

impl TableMapping {
    /// Compiles `mapping` and verifies the generated statement prepares
    /// against the live schema. Any failure here aborts startup.
    pub(crate) async fn prepare(
        pool: MySqlPool,
        mapping: &MappingConfig,
    ) -> Result<Self, RouterError> {
        let columns: Vec<String> = mapping
            .value_column
            .split(VALUE_SEPARATOR)
            .map(str::to_string)
            .collect();
        let query = format_select_query(&columns, &mapping.table, &mapping.key_column);

        let prepare_err = |source: sqlx::Error| RouterError::Prepare {
            mapping: mapping.name.clone(),
            source,
        };
        let mut conn = pool.acquire().await.map_err(prepare_err)?;
        conn.prepare(query.as_str()).await.map_err(prepare_err)?;

        Ok(Self {
            pool,
            query,
            columns,
        })
    }

    /// Looks up one row by sub-key. `None` means no row matched. The
    /// returned item carries an empty key; the router restores the raw
    /// client key.
    pub(crate) async fn get(&self, key: &str) -> Result<Option<Item>, QueryError> {
        let fetched = timeout(
            QUERY_TIMEOUT,
            sqlx::query(&self.query).bind(key).fetch_optional(&self.pool),
        )
        .await
        .map_err(|_| QueryError::DeadlineExceeded)??;

        let Some(row) = fetched else {
            return Ok(None);
        };

        let mut values = Vec::with_capacity(self.columns.len());
        for index in 0..self.columns.len() {
            let value: Option<String> = row.try_get(index)?;
            values.push(value.unwrap_or_default());
        }

        Ok(Some(Item::new(
            String::new(),
            values.join(VALUE_SEPARATOR),
        )))
    }
}

fn backtick(identifier: &str) -> String {
    format!("`{identifier}`")
}

/// Builds the SELECT for one mapping. Column and table identifiers are
/// backticked; a `schema.table` name is backticked per segment.
pub(crate) fn format_select_query(columns: &[String], table: &str, key_column: &str) -> String {
    let columns = columns
        .iter()
        .map(|column| backtick(column))
        .collect::<Vec<_>>()
        .join(",");
    let table = table
        .split('.')
        .map(backtick)
        .collect::<Vec<_>>()
        .join(".");
    format!(
        "SELECT {columns} FROM {table} WHERE {key}=?",
        key = backtick(key_column)
    )
}
