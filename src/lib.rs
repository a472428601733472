//! Creative Naming Server Library
//!
//! This library exposes the internal modules for the binary, for testing and
//! potential reuse.

pub mod classifier;
pub mod config;
pub mod google_auth;
pub mod preview;
pub mod server;
pub mod sheets;
pub mod upload;

// Re-export commonly used types for convenience
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig, ServerState};
pub use sheets::{InMemorySpreadsheet, SchemaRevision};
