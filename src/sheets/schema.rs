//! Versioned column layouts for the Creative and Title sheets.
//!
//! Writers and the updater never touch raw column letters: every cell is
//! addressed through a logical field resolved by a [`ColumnMap`]. The layout
//! changed several times over the life of the spreadsheet, so each known
//! layout is kept as a [`SchemaRevision`].

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Column position {position} is used by more than one field")]
    DuplicatePosition { position: u32 },

    #[error("Column positions are 1-indexed, got 0 for {0}")]
    ZeroPosition(String),

    #[error("Field {0} is mapped more than once")]
    DuplicateField(String),

    #[error("Immutable field {0} lies inside the mutable column span")]
    ImmutableInsideMutableSpan(String),

    #[error("Column map has no fields")]
    Empty,
}

/// Logical columns of the Creative sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreativeField {
    Id,
    Preview,
    Link,
    Type,
    Hypothesis,
    AiFlag,
    Style,
    MainTone,
    MainObject,
    HeaderText,
    Uvp,
    Product,
    Offer,
    Filename,
}

/// Logical columns of the Title sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TitleField {
    CompositeKey,
    Id,
    Russian,
    English,
    HeaderText,
    Uvp,
    Product,
    Offer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column<F> {
    pub field: F,
    /// 1-indexed position within the sheet.
    pub position: u32,
    pub header: &'static str,
    /// Whether the updater may rewrite this column after creation.
    pub mutable: bool,
}

/// Mapping from logical field to column position and header label for one sheet.
#[derive(Debug, Clone)]
pub struct ColumnMap<F> {
    columns: Vec<Column<F>>,
}

impl<F: Copy + Eq + Hash + Debug> ColumnMap<F> {
    pub fn new(mut columns: Vec<Column<F>>) -> Result<Self, SchemaError> {
        if columns.is_empty() {
            return Err(SchemaError::Empty);
        }
        let mut positions = HashSet::new();
        let mut fields = HashSet::new();
        for column in &columns {
            if column.position == 0 {
                return Err(SchemaError::ZeroPosition(format!("{:?}", column.field)));
            }
            if !positions.insert(column.position) {
                return Err(SchemaError::DuplicatePosition {
                    position: column.position,
                });
            }
            if !fields.insert(column.field) {
                return Err(SchemaError::DuplicateField(format!("{:?}", column.field)));
            }
        }
        columns.sort_by_key(|c| c.position);

        let map = Self { columns };
        if let Some((first, last)) = map.mutable_span() {
            if let Some(column) = map
                .columns
                .iter()
                .find(|c| !c.mutable && c.position >= first && c.position <= last)
            {
                return Err(SchemaError::ImmutableInsideMutableSpan(format!(
                    "{:?}",
                    column.field
                )));
            }
        }
        Ok(map)
    }

    pub fn position(&self, field: F) -> Option<u32> {
        self.columns
            .iter()
            .find(|c| c.field == field)
            .map(|c| c.position)
    }

    pub fn columns(&self) -> &[Column<F>] {
        &self.columns
    }

    /// Highest mapped position, i.e. the number of cells in a full row.
    pub fn width(&self) -> u32 {
        self.columns.last().map(|c| c.position).unwrap_or(0)
    }

    /// Label of column 1, used to recognise an already provisioned header row.
    pub fn sentinel(&self) -> &'static str {
        self.columns
            .iter()
            .find(|c| c.position == 1)
            .map(|c| c.header)
            .unwrap_or("")
    }

    /// Canonical header row; unmapped positions are left blank.
    pub fn header_row(&self) -> Vec<String> {
        let mut row = vec![String::new(); self.width() as usize];
        for column in &self.columns {
            row[(column.position - 1) as usize] = column.header.to_string();
        }
        row
    }

    /// Minimal `(first, last)` column span covering the given fields.
    pub fn span<I>(&self, fields: I) -> Option<(u32, u32)>
    where
        I: IntoIterator<Item = F>,
    {
        let positions: Vec<u32> = fields
            .into_iter()
            .filter_map(|f| self.position(f))
            .collect();
        let first = positions.iter().min()?;
        let last = positions.iter().max()?;
        Some((*first, *last))
    }

    /// Span of every column the updater is allowed to rewrite.
    pub fn mutable_span(&self) -> Option<(u32, u32)> {
        self.span(self.columns.iter().filter(|c| c.mutable).map(|c| c.field))
    }

    /// Lays out `(field, value)` pairs into a full row ordered by position.
    pub fn build_row(&self, values: &[(F, String)]) -> Vec<String> {
        let mut row = vec![String::new(); self.width() as usize];
        for (field, value) in values {
            if let Some(position) = self.position(*field) {
                row[(position - 1) as usize] = value.clone();
            }
        }
        row
    }
}

/// Known spreadsheet layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum SchemaRevision {
    /// Nine Creative columns, no preview, no marketing fields, no Title sheet.
    Legacy,
    /// Fourteen Creative columns with preview and marketing fields, seven Title columns.
    #[default]
    Marketing,
    /// As `Marketing`, with an RU translation column in the Title sheet.
    MarketingTranslated,
}

impl std::fmt::Display for SchemaRevision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SchemaRevision::Legacy => "legacy",
            SchemaRevision::Marketing => "marketing",
            SchemaRevision::MarketingTranslated => "marketing_translated",
        };
        write!(f, "{}", name)
    }
}

/// Column maps for both sheets of one revision.
#[derive(Debug, Clone)]
pub struct SheetSchema {
    pub revision: SchemaRevision,
    pub creative: ColumnMap<CreativeField>,
    /// `None` when the revision has no Title sheet.
    pub title: Option<ColumnMap<TitleField>>,
}

impl SheetSchema {
    pub fn for_revision(revision: SchemaRevision) -> Result<Self, SchemaError> {
        let creative = ColumnMap::new(creative_columns(revision))?;
        let title = title_columns(revision).map(ColumnMap::new).transpose()?;
        Ok(Self {
            revision,
            creative,
            title,
        })
    }
}

fn col<F>(field: F, position: u32, header: &'static str, mutable: bool) -> Column<F> {
    Column {
        field,
        position,
        header,
        mutable,
    }
}

fn creative_columns(revision: SchemaRevision) -> Vec<Column<CreativeField>> {
    use CreativeField::*;
    match revision {
        SchemaRevision::Legacy => vec![
            col(Id, 1, "V_ID", false),
            col(Link, 2, "link", true),
            col(Type, 3, "type", true),
            col(Hypothesis, 4, "name_of_hypothesis", true),
            col(AiFlag, 5, "made_ai", true),
            col(Style, 6, "style", true),
            col(MainTone, 7, "main_ton", true),
            col(MainObject, 8, "main_object", true),
            col(Filename, 9, "filename", false),
        ],
        SchemaRevision::Marketing | SchemaRevision::MarketingTranslated => vec![
            col(Id, 1, "V_ID", false),
            col(Preview, 2, "preview", false),
            col(Link, 3, "link", true),
            col(Type, 4, "type", true),
            col(Hypothesis, 5, "name_of_hypothesis", true),
            col(AiFlag, 6, "made_ai", true),
            col(Style, 7, "style", true),
            col(MainTone, 8, "main_ton", true),
            col(MainObject, 9, "main_object", true),
            col(HeaderText, 10, "header_text", true),
            col(Uvp, 11, "uvp", true),
            col(Product, 12, "product", true),
            col(Offer, 13, "offer", true),
            col(Filename, 14, "filename", false),
        ],
    }
}

fn title_columns(revision: SchemaRevision) -> Option<Vec<Column<TitleField>>> {
    use TitleField::*;
    match revision {
        SchemaRevision::Legacy => None,
        SchemaRevision::Marketing => Some(vec![
            col(CompositeKey, 1, "Text_id", false),
            col(Id, 2, "ID", false),
            col(English, 3, "Eng", false),
            col(HeaderText, 4, "Header_text", false),
            col(Uvp, 5, "UVP", false),
            col(Product, 6, "Product", false),
            col(Offer, 7, "Offer", false),
        ]),
        SchemaRevision::MarketingTranslated => Some(vec![
            col(CompositeKey, 1, "Text_id", false),
            col(Id, 2, "ID", false),
            col(Russian, 3, "RU", false),
            col(English, 4, "Eng", false),
            col(HeaderText, 5, "Header_text", false),
            col(Uvp, 6, "UVP", false),
            col(Product, 7, "Product", false),
            col(Offer, 8, "Offer", false),
        ]),
    }
}
