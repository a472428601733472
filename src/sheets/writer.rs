//! Row creation for the Creative and Title sheets.
//!
//! Each write runs the whole ensure-header, allocate, append sequence while
//! holding the sheet's lock, so two writers never observe the same last ID.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::a1;
use super::allocator::{IdAllocator, IdScanPolicy};
use super::client::{SheetsClient, SheetsError, ValueInput};
use super::header::SheetLayout;
use super::lock::{ResourceLock, SheetResource};
use super::records::{image_formula, link_tag, CreativeFields, MarketingFields};
use super::schema::{ColumnMap, CreativeField, SchemaRevision, SheetSchema, TitleField};
use crate::server::metrics;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Sheets(#[from] SheetsError),

    #[error("Schema revision {0} has no Title sheet")]
    NoTitleSheet(SchemaRevision),

    #[error("Row {0} is not a data row")]
    InvalidRow(u32),

    #[error("Schema revision {0} has no editable columns")]
    NoMutableColumns(SchemaRevision),
}

/// Tab names of the two sheets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetNames {
    pub creative: String,
    pub title: String,
}

impl Default for SheetNames {
    fn default() -> Self {
        Self {
            creative: "Creative".to_string(),
            title: "Title".to_string(),
        }
    }
}

/// ID and 1-indexed row of a freshly appended record. `row_index` is 0 when
/// the store reported a range that could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WrittenRow {
    pub id: u64,
    pub row_index: u32,
}

pub struct RowWriter {
    client: Arc<dyn SheetsClient>,
    locks: Arc<dyn ResourceLock>,
    allocator: IdAllocator,
    schema: Arc<SheetSchema>,
    creative: SheetLayout,
    title: Option<SheetLayout>,
}

impl RowWriter {
    pub fn new(
        client: Arc<dyn SheetsClient>,
        locks: Arc<dyn ResourceLock>,
        schema: Arc<SheetSchema>,
        names: &SheetNames,
        policy: IdScanPolicy,
    ) -> Self {
        let creative = SheetLayout::from_map(
            SheetResource::Creative,
            &names.creative,
            &schema.creative,
            CreativeField::Id,
        );
        let title = schema.title.as_ref().map(|map| {
            SheetLayout::from_map(SheetResource::Title, &names.title, map, TitleField::Id)
        });
        Self {
            allocator: IdAllocator::new(Arc::clone(&client), policy),
            client,
            locks,
            schema,
            creative,
            title,
        }
    }

    pub fn has_title_sheet(&self) -> bool {
        self.title.is_some()
    }

    /// Appends a Creative row with the next free ID.
    ///
    /// Text cells are appended RAW so model output and filenames are never
    /// evaluated. The preview formula is written afterwards as the only
    /// user-entered cell of the row.
    pub async fn add_creative(
        &self,
        fields: &CreativeFields,
        filename: &str,
        preview_url: Option<&str>,
    ) -> Result<WrittenRow, LedgerError> {
        let map = &self.schema.creative;
        let layout = &self.creative;

        let _guard = self.locks.acquire(layout.resource).await;
        let id = self.allocator.next_id(layout).await?;

        let mut cells = fields.cells();
        cells.push((CreativeField::Id, id.to_string()));
        cells.push((
            CreativeField::Link,
            link_tag(id, fields.kind.as_str(), &fields.hypothesis),
        ));
        cells.push((CreativeField::Filename, filename.to_string()));
        let row = map.build_row(&cells);

        let range = a1::column_range(&layout.name, 1, map.width());
        let outcome = self.client.append_row(&range, row, ValueInput::Raw).await?;
        let row_index = a1::parse_start_row(&outcome.updated_range);
        metrics::record_row_appended(layout.resource.as_str());

        let preview = preview_url
            .filter(|url| !url.is_empty())
            .zip(map.position(CreativeField::Preview));
        if row_index == 0 {
            warn!(
                "Could not determine row appended to {} from range {}{}",
                layout.name,
                outcome.updated_range,
                if preview.is_some() { ", preview not written" } else { "" }
            );
        } else if let Some((url, position)) = preview {
            debug!("Writing preview of {} row {}", layout.name, row_index);
            self.client
                .update_range(
                    &a1::cell(&layout.name, position, row_index),
                    vec![vec![image_formula(url)]],
                    ValueInput::UserEntered,
                )
                .await?;
        }

        info!("Creative {} appended at row {} for {}", id, row_index, filename);
        Ok(WrittenRow { id, row_index })
    }

    /// Appends a Title row with its own next free ID, then fills the cells
    /// whose formulas refer to the row itself.
    pub async fn add_title(&self, marketing: &MarketingFields) -> Result<WrittenRow, LedgerError> {
        let (layout, map) = match (&self.title, &self.schema.title) {
            (Some(layout), Some(map)) => (layout, map),
            _ => return Err(LedgerError::NoTitleSheet(self.schema.revision)),
        };

        let _guard = self.locks.acquire(layout.resource).await;
        let id = self.allocator.next_id(layout).await?;

        let row = map.build_row(&marketing.title_cells(id));
        let range = a1::column_range(&layout.name, 1, map.width());
        let outcome = self.client.append_row(&range, row, ValueInput::Raw).await?;
        let row_index = a1::parse_start_row(&outcome.updated_range);
        metrics::record_row_appended(layout.resource.as_str());

        if row_index == 0 {
            warn!(
                "Could not determine row appended to {} from range {}, skipping formula cells",
                layout.name, outcome.updated_range
            );
            return Ok(WrittenRow { id, row_index });
        }

        for (position, formula) in title_formulas(map, row_index) {
            debug!("Writing formula cell {} of {} row {}", position, layout.name, row_index);
            self.client
                .update_range(
                    &a1::cell(&layout.name, position, row_index),
                    vec![vec![formula]],
                    ValueInput::UserEntered,
                )
                .await?;
        }

        info!("Title {} appended at row {}", id, row_index);
        Ok(WrittenRow { id, row_index })
    }
}

/// Self-referencing formulas of a Title row as `(position, formula)`.
///
/// The key joins the row's ID, header text, UVP, product and offer cells with
/// `_`; the translation column, when present, translates the English cell.
pub fn title_formulas(map: &ColumnMap<TitleField>, row: u32) -> Vec<(u32, String)> {
    let cell_ref = |field| {
        map.position(field)
            .map(|position| format!("{}{}", a1::column_letters(position), row))
    };
    let mut formulas = Vec::new();

    if let Some(key_position) = map.position(TitleField::CompositeKey) {
        let parts: Vec<String> = [
            TitleField::Id,
            TitleField::HeaderText,
            TitleField::Uvp,
            TitleField::Product,
            TitleField::Offer,
        ]
        .into_iter()
        .filter_map(cell_ref)
        .collect();
        formulas.push((key_position, format!("={}", parts.join("&\"_\"&"))));
    }

    if let (Some(position), Some(english)) =
        (map.position(TitleField::Russian), cell_ref(TitleField::English))
    {
        formulas.push((
            position,
            format!("=GOOGLETRANSLATE({},\"en\",\"ru\")", english),
        ));
    }

    formulas
}
