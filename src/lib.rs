// FormGrid - Core Library
// CSV transcoding, table stores with a selection mirror, and the quote wizard

pub mod config;
pub mod csv_codec;
pub mod mirror;
pub mod persist;
pub mod quote;
pub mod record;
pub mod rows;
pub mod store;
pub mod wizard;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::{init_tracing, AppConfig};
pub use csv_codec::{
    example_csv, export, export_filename, parse_text, read_file, serialize, simple_example_csv,
    validate_file, CsvError, CsvSink, DirectorySink, FileCheck, FileDescriptor, ParseResult,
};
pub use mirror::{
    DualSyncedTable, GridWidget, MemoryGrid, SelectionMirror, SyncAction, SyncState, SyncedTable,
    TickReport,
};
pub use persist::{
    KeyValueStore, MemoryStore, SqliteStore, CSV_TABLE_KEY, DATA_TABLE_KEY, WIZARD_KEY,
};
pub use quote::{FormEndpoint, LocalEndpoint, QuoteResult, SubmitAck, SubmitError};
pub use record::{Keyed, Record, RecordId, RowKey, Scalar};
pub use rows::{mock_rows, value_totals, CreateRow, RowStatus, TableRow};
pub use store::{TableSnapshot, TableStore};
pub use wizard::{
    AccountDetails, FormDraft, FormSubmission, StepErrors, Step1, Step2, Step3, UserType,
    WizardStore,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
