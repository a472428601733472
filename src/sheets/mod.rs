//! Spreadsheet ledger: column layouts, store access, per-sheet locking and
//! the row writers built on top of them.

pub mod a1;
mod allocator;
mod client;
mod google;
mod header;
mod lock;
mod memory;
mod records;
pub mod schema;
mod updater;
mod writer;

pub use allocator::{last_id, IdAllocator, IdScanPolicy};
pub use client::{sheet_of_range, AppendOutcome, SheetsClient, SheetsError, ValueInput};
pub use google::{GoogleSheetsClient, DEFAULT_REQUEST_TIMEOUT};
pub use header::{ensure_header, SheetLayout};
pub use lock::{LockRegistry, ResourceGuard, ResourceLock, RowLock, RowLockGuard, SheetResource};
pub use memory::{InMemorySpreadsheet, Operation, OperationKind};
pub use records::{image_formula, link_tag, CreativeFields, CreativePatch, MarketingFields};
pub use schema::{CreativeField, SchemaRevision, SheetSchema, TitleField};
pub use updater::RowUpdater;
pub use writer::{title_formulas, LedgerError, RowWriter, SheetNames, WrittenRow};
