//! Data store gateway for Postgres.
//!
//! Every operation opens its own connection scope (connection + transaction),
//! does its work, and lets the scope drop on the way out. There is no pooling
//! and no sharing across stages: one scope per invocation, closed on every
//! exit path.

use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{ConnectOptions, Connection, Executor};
use thiserror::Error;
use tracing::debug;

use crate::config::StoreConfig;

/// How much of a failing statement to echo back in the error.
const STATEMENT_PREVIEW_LEN: usize = 120;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("statement failed: `{statement}`: {source}")]
    Statement {
        statement: String,
        #[source]
        source: sqlx::Error,
    },
}

/// Result of one statement executed by [`Store::run_script`].
#[derive(Debug)]
pub struct StatementOutput {
    /// Rows produced by the statement, empty for statements with no result shape.
    pub rows: Vec<PgRow>,
}

/// Gateway to the relational store.
///
/// Holds connection options only; connections are opened per operation.
#[derive(Debug, Clone)]
pub struct Store {
    options: PgConnectOptions,
}

impl Store {
    pub fn new(config: &StoreConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);
        Self { options }
    }

    async fn connect(&self) -> Result<PgConnection, StoreError> {
        Ok(self.options.connect().await?)
    }

    /// Execute a script as one unit inside a single transaction.
    ///
    /// On any error the transaction is rolled back and the error surfaced;
    /// nothing is partially committed.
    pub async fn run_batch(&self, sql: &str) -> Result<(), StoreError> {
        let mut conn = self.connect().await?;
        let mut tx = conn.begin().await?;

        // `Executor::execute` (a boxed future) rather than `RawSql::execute`:
        // awaiting the latter's opaque future trips a rustc limitation proving
        // `Send` for async-trait callers (rust-lang/rust#110338).
        if let Err(err) = (&mut *tx).execute(sqlx::raw_sql(sql)).await {
            let _ = tx.rollback().await;
            return Err(StoreError::Sqlx(err));
        }

        tx.commit().await?;
        debug!(bytes = sql.len(), "batch committed");
        Ok(())
    }

    /// Execute a single query and fetch all result rows.
    ///
    /// Printing or mapping the rows is the caller's concern.
    pub async fn run_query(&self, sql: &str) -> Result<Vec<PgRow>, StoreError> {
        let mut conn = self.connect().await?;
        let rows = sqlx::query(sql).fetch_all(&mut conn).await?;
        Ok(rows)
    }

    /// Execute pre-split statements sequentially on the same transaction.
    ///
    /// Statements that produce a result shape have their rows fetched and
    /// returned in order. The first failing statement rolls back the whole
    /// scope and aborts the remainder.
    pub async fn run_script(&self, statements: &[String]) -> Result<Vec<StatementOutput>, StoreError> {
        let mut conn = self.connect().await?;
        let mut tx = conn.begin().await?;
        let mut outputs = Vec::with_capacity(statements.len());

        for stmt in statements {
            match sqlx::query(stmt).fetch_all(&mut *tx).await {
                Ok(rows) => outputs.push(StatementOutput { rows }),
                Err(err) => {
                    let _ = tx.rollback().await;
                    return Err(StoreError::Statement {
                        statement: preview(stmt),
                        source: err,
                    });
                }
            }
        }

        tx.commit().await?;
        Ok(outputs)
    }
}

/// Quote an identifier for direct inclusion in SQL text.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a value as a string literal; Postgres coerces it to the column type.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn preview(stmt: &str) -> String {
    let trimmed = stmt.trim();
    if trimmed.len() <= STATEMENT_PREVIEW_LEN {
        trimmed.to_string()
    } else {
        let cut = trimmed
            .char_indices()
            .take_while(|(i, _)| *i < STATEMENT_PREVIEW_LEN)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}…", &trimmed[..cut])
    }
}
