//! Sequential ID allocation from a sheet's ID column.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::a1;
use super::client::{SheetsClient, SheetsError};
use super::header::{ensure_header, SheetLayout};

/// How the last used ID is found in the ID column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum IdScanPolicy {
    /// Bottom-most cell holding a positive integer.
    #[default]
    LastNumeric,
    /// Largest positive integer anywhere in the column.
    GlobalMax,
}

/// Last used ID in an ID column whose first entry is the header.
pub fn last_id(column: &[String], policy: IdScanPolicy) -> Option<u64> {
    let ids = column
        .iter()
        .skip(1)
        .filter_map(|cell| cell.trim().parse::<u64>().ok())
        .filter(|id| *id > 0);
    match policy {
        IdScanPolicy::LastNumeric => ids.last(),
        IdScanPolicy::GlobalMax => ids.max(),
    }
}

pub struct IdAllocator {
    client: Arc<dyn SheetsClient>,
    policy: IdScanPolicy,
}

impl IdAllocator {
    pub fn new(client: Arc<dyn SheetsClient>, policy: IdScanPolicy) -> Self {
        Self { client, policy }
    }

    /// Next free ID for the sheet. The caller must hold the sheet's lock for
    /// the whole allocate-and-append sequence.
    pub async fn next_id(&self, layout: &SheetLayout) -> Result<u64, SheetsError> {
        ensure_header(self.client.as_ref(), layout).await?;

        let range = a1::column_range(&layout.name, layout.id_column, layout.id_column);
        let column: Vec<String> = self
            .client
            .read_range(&range)
            .await?
            .into_iter()
            .map(|row| row.into_iter().next().unwrap_or_default())
            .collect();

        let next = last_id(&column, self.policy).map(|id| id + 1).unwrap_or(1);
        debug!("Allocated ID {} in {} ({} rows scanned)", next, layout.name, column.len());
        Ok(next)
    }
}
