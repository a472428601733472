//! Header row provisioning.

use tracing::{debug, info};

use super::a1;
use super::client::{SheetsClient, SheetsError, ValueInput};
use super::lock::SheetResource;
use super::schema::ColumnMap;

/// Where one resource lives and how its header and ID column look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    pub resource: SheetResource,
    /// Tab name inside the spreadsheet.
    pub name: String,
    pub header: Vec<String>,
    pub id_column: u32,
}

impl SheetLayout {
    pub fn from_map<F>(resource: SheetResource, name: &str, map: &ColumnMap<F>, id_field: F) -> Self
    where
        F: Copy + Eq + std::hash::Hash + std::fmt::Debug,
    {
        Self {
            resource,
            name: name.to_string(),
            header: map.header_row(),
            id_column: map.position(id_field).unwrap_or(1),
        }
    }

    /// Label of column 1.
    pub fn sentinel(&self) -> &str {
        self.header.first().map(String::as_str).unwrap_or("")
    }

    pub fn width(&self) -> u32 {
        self.header.len() as u32
    }

    fn header_range(&self) -> String {
        a1::row_range(&self.name, 1, self.width(), 1)
    }
}

/// Makes sure row 1 carries the canonical header.
///
/// A row whose first cell already equals the sentinel is left untouched, so
/// repeated calls issue no writes. Returns whether the header was written.
pub async fn ensure_header(
    client: &dyn SheetsClient,
    layout: &SheetLayout,
) -> Result<bool, SheetsError> {
    let range = layout.header_range();
    let rows = client.read_range(&range).await?;
    let first_cell = rows
        .first()
        .and_then(|row| row.first())
        .map(|cell| cell.trim());

    if first_cell == Some(layout.sentinel()) {
        debug!("Header of {} already present", layout.name);
        return Ok(false);
    }

    info!("Writing header row of {}, found {:?}", layout.name, first_cell);
    client
        .update_range(&range, vec![layout.header.clone()], ValueInput::Raw)
        .await?;
    Ok(true)
}
