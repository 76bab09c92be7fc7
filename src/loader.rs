//! Bulk loading stage.
//!
//! Each load item is one CSV file appended into one table under the target
//! schema. Items are independent: a parse or write failure is logged and the
//! remaining items still load. Within an item, all rows go in as a single
//! transaction, so a failed item contributes zero rows.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info};

use crate::store::{quote_ident, quote_literal, Store, StoreError};

/// Rows per generated INSERT statement. Files larger than this produce
/// several statements in the same batch (still one transaction).
const INSERT_CHUNK_ROWS: usize = 500;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("csv parse error in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("{path} has no header row")]
    EmptyHeader { path: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One file → table mapping for the loader.
#[derive(Debug, Clone)]
pub struct LoadItem {
    pub path: PathBuf,
    pub table: String,
    pub schema: String,
}

impl LoadItem {
    pub fn new(path: impl Into<PathBuf>, table: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            table: table.into(),
            schema: schema.into(),
        }
    }
}

/// Outcome of one load item. `rows` is the count handed to the store on success.
#[derive(Debug)]
pub struct LoadReport {
    pub table: String,
    pub result: Result<usize, LoadError>,
}

/// Load every item, isolating failures per item.
pub async fn load_all(store: &Store, items: &[LoadItem]) -> Vec<LoadReport> {
    let mut reports = Vec::with_capacity(items.len());

    for item in items {
        let result = load_item(store, item).await;
        match &result {
            Ok(rows) => info!(
                file = %item.path.display(),
                table = %item.table,
                rows,
                "loaded"
            ),
            Err(err) => error!(
                file = %item.path.display(),
                table = %item.table,
                %err,
                "load failed, continuing with remaining items"
            ),
        }
        reports.push(LoadReport {
            table: item.table.clone(),
            result,
        });
    }

    reports
}

async fn load_item(store: &Store, item: &LoadItem) -> Result<usize, LoadError> {
    let (headers, rows) = read_rows(&item.path)?;
    if rows.is_empty() {
        return Ok(0);
    }

    let batch = insert_batch(&item.schema, &item.table, &headers, &rows);
    store.run_batch(&batch).await?;
    Ok(rows.len())
}

/// Parse a delimited file into a header and data rows, preserving column order.
fn read_rows(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), LoadError> {
    let display = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|source| LoadError::Open {
        path: display.clone(),
        source,
    })?;

    let mut reader = csv::Reader::from_reader(file);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|source| LoadError::Parse {
            path: display.clone(),
            source,
        })?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() {
        return Err(LoadError::EmptyHeader { path: display });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| LoadError::Parse {
            path: display.clone(),
            source,
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok((headers, rows))
}

/// Build the INSERT text for one file, chunked so very large files do not
/// produce a single enormous statement. All values go in as quoted literals;
/// Postgres coerces them to the column types.
fn insert_batch(schema: &str, table: &str, headers: &[String], rows: &[Vec<String>]) -> String {
    let columns = headers
        .iter()
        .map(|h| quote_ident(h))
        .collect::<Vec<_>>()
        .join(", ");
    let target = format!("{}.{}", quote_ident(schema), quote_ident(table));

    let mut statements = Vec::new();
    for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
        let values = chunk
            .iter()
            .map(|row| {
                let literals = row
                    .iter()
                    .map(|v| quote_literal(v))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({literals})")
            })
            .collect::<Vec<_>>()
            .join(",\n");
        statements.push(format!("INSERT INTO {target} ({columns}) VALUES\n{values}"));
    }

    statements.join(";\n")
}
