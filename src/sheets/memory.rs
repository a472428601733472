//! In-memory spreadsheet used for local runs and tests.
//!
//! Mimics the parts of Sheets behavior the writers depend on: ranges to an
//! unknown tab fail with [`SheetsError::MissingSheet`], reads drop trailing
//! blanks, appends land after the last non-empty row and report the range they
//! wrote. Every operation yields to the scheduler first so concurrent callers
//! interleave the way they do against the real API.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::a1;
use super::client::{sheet_of_range, AppendOutcome, SheetsClient, SheetsError, ValueInput};

/// Kind of a recorded store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Update,
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub range: String,
    pub input: Option<ValueInput>,
}

#[derive(Default)]
struct State {
    sheets: HashMap<String, Vec<Vec<String>>>,
    operations: Vec<Operation>,
    appends_per_sheet: HashMap<String, usize>,
    failing_appends: HashMap<String, Vec<usize>>,
    malformed_append_ranges: bool,
}

#[derive(Default)]
pub struct InMemorySpreadsheet {
    state: Mutex<State>,
}

/// Parsed `A1`, `A:A`, `A1:N1` or `C4:M4` reference. Rows are `None` for whole columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellRef {
    column: u32,
    row: Option<u32>,
}

fn parse_cell_ref(text: &str) -> Option<CellRef> {
    let letters: String = text.chars().take_while(|c| c.is_ascii_uppercase()).collect();
    let digits = &text[letters.len()..];
    if letters.is_empty() {
        return None;
    }
    let column = letters
        .chars()
        .fold(0u32, |acc, c| acc * 26 + (c as u32 - 'A' as u32 + 1));
    let row = if digits.is_empty() {
        None
    } else {
        Some(digits.parse().ok()?)
    };
    Some(CellRef { column, row })
}

fn parse_range(range: &str) -> Result<(String, CellRef, CellRef), SheetsError> {
    let sheet = sheet_of_range(range);
    let reference = range
        .rsplit_once('!')
        .map(|(_, r)| r)
        .ok_or_else(|| SheetsError::InvalidResponse(format!("Range without sheet: {}", range)))?;
    let (start, end) = match reference.split_once(':') {
        Some((s, e)) => (s, e),
        None => (reference, reference),
    };
    let start = parse_cell_ref(start)
        .ok_or_else(|| SheetsError::InvalidResponse(format!("Bad range: {}", range)))?;
    let end = parse_cell_ref(end)
        .ok_or_else(|| SheetsError::InvalidResponse(format!("Bad range: {}", range)))?;
    Ok((sheet, start, end))
}

fn last_non_empty_row(rows: &[Vec<String>]) -> usize {
    rows.iter()
        .rposition(|row| row.iter().any(|c| !c.is_empty()))
        .map(|i| i + 1)
        .unwrap_or(0)
}

impl InMemorySpreadsheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty tab.
    pub fn with_sheet(self, name: &str) -> Self {
        self.lock().sheets.entry(name.to_string()).or_default();
        self
    }

    /// Creates a tab pre-filled with rows (row 1 first).
    pub fn with_rows(self, name: &str, rows: Vec<Vec<&str>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(String::from).collect())
            .collect();
        self.lock().sheets.insert(name.to_string(), rows);
        self
    }

    /// Makes the `nth` (1-based) append to `sheet` fail with an API error.
    pub fn fail_append(&self, sheet: &str, nth: usize) {
        self.lock()
            .failing_appends
            .entry(sheet.to_string())
            .or_default()
            .push(nth);
    }

    /// Reports appended ranges in a form that cannot be parsed into a row.
    pub fn report_malformed_append_ranges(&self, malformed: bool) {
        self.lock().malformed_append_ranges = malformed;
    }

    /// Snapshot of a tab's rows.
    pub fn rows(&self, sheet: &str) -> Vec<Vec<String>> {
        self.lock().sheets.get(sheet).cloned().unwrap_or_default()
    }

    /// One cell by 1-indexed row and column; blank when absent.
    pub fn cell(&self, sheet: &str, row: u32, column: u32) -> String {
        self.lock()
            .sheets
            .get(sheet)
            .and_then(|rows| rows.get(row as usize - 1))
            .and_then(|r| r.get(column as usize - 1))
            .cloned()
            .unwrap_or_default()
    }

    /// Every call made so far, in order.
    pub fn operations(&self) -> Vec<Operation> {
        self.lock().operations.clone()
    }

    pub fn count_operations(&self, kind: OperationKind) -> usize {
        self.lock()
            .operations
            .iter()
            .filter(|op| op.kind == kind)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_cells(rows: &mut Vec<Vec<String>>, start: CellRef, values: Vec<Vec<String>>) {
        let first_row = start.row.unwrap_or(1);
        for (r, value_row) in values.into_iter().enumerate() {
            let row_index = first_row as usize - 1 + r;
            if rows.len() <= row_index {
                rows.resize(row_index + 1, Vec::new());
            }
            let target = &mut rows[row_index];
            for (c, value) in value_row.into_iter().enumerate() {
                let col_index = start.column as usize - 1 + c;
                if target.len() <= col_index {
                    target.resize(col_index + 1, String::new());
                }
                target[col_index] = value;
            }
        }
    }
}

#[async_trait]
impl SheetsClient for InMemorySpreadsheet {
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        tokio::task::yield_now().await;
        let (sheet, start, end) = parse_range(range)?;
        let mut state = self.lock();
        state.operations.push(Operation {
            kind: OperationKind::Read,
            range: range.to_string(),
            input: None,
        });
        let rows = state
            .sheets
            .get(&sheet)
            .ok_or_else(|| SheetsError::MissingSheet(sheet.clone()))?;

        let first_row = start.row.unwrap_or(1) as usize;
        let last_row = end.row.map(|r| r as usize).unwrap_or(rows.len());
        let mut out: Vec<Vec<String>> = Vec::new();
        for row_index in first_row..=last_row {
            let Some(row) = rows.get(row_index - 1) else {
                break;
            };
            let mut cells: Vec<String> = (start.column..=end.column)
                .map(|c| row.get(c as usize - 1).cloned().unwrap_or_default())
                .collect();
            while cells.last().is_some_and(|c| c.is_empty()) {
                cells.pop();
            }
            out.push(cells);
        }
        while out.last().is_some_and(|r| r.is_empty()) {
            out.pop();
        }
        Ok(out)
    }

    async fn update_range(
        &self,
        range: &str,
        rows: Vec<Vec<String>>,
        input: ValueInput,
    ) -> Result<(), SheetsError> {
        tokio::task::yield_now().await;
        let (sheet, start, _) = parse_range(range)?;
        let mut state = self.lock();
        state.operations.push(Operation {
            kind: OperationKind::Update,
            range: range.to_string(),
            input: Some(input),
        });
        let target = state
            .sheets
            .get_mut(&sheet)
            .ok_or_else(|| SheetsError::MissingSheet(sheet.clone()))?;
        Self::write_cells(target, start, rows);
        Ok(())
    }

    async fn append_row(
        &self,
        range: &str,
        row: Vec<String>,
        input: ValueInput,
    ) -> Result<AppendOutcome, SheetsError> {
        tokio::task::yield_now().await;
        let (sheet, start, _) = parse_range(range)?;
        let mut state = self.lock();
        state.operations.push(Operation {
            kind: OperationKind::Append,
            range: range.to_string(),
            input: Some(input),
        });
        if !state.sheets.contains_key(&sheet) {
            return Err(SheetsError::MissingSheet(sheet));
        }

        let count = {
            let counter = state.appends_per_sheet.entry(sheet.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        let should_fail = state
            .failing_appends
            .get(&sheet)
            .is_some_and(|failing| failing.contains(&count));
        if should_fail {
            return Err(SheetsError::Api {
                status: 503,
                message: "The service is currently unavailable.".to_string(),
            });
        }

        let malformed = state.malformed_append_ranges;
        let target = state.sheets.get_mut(&sheet).ok_or_else(|| {
            SheetsError::MissingSheet(sheet.clone())
        })?;
        let row_number = last_non_empty_row(target) as u32 + 1;
        let width = row.len().max(1) as u32;
        Self::write_cells(
            target,
            CellRef {
                column: start.column,
                row: Some(row_number),
            },
            vec![row],
        );

        let updated_range = if malformed {
            format!("{}!unknown", a1::quote_sheet_name(&sheet))
        } else {
            a1::row_range(
                &sheet,
                start.column,
                start.column + width - 1,
                row_number,
            )
        };
        Ok(AppendOutcome { updated_range })
    }
}
