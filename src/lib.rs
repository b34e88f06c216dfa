//! Synchronous helpers for SQLite database files.
//!
//! # Intention
//!
//! - Create, open and close database files with explicit existence checks.
//! - Run row-less statements and the small table queries a storage layer
//!   needs: row count, largest integer key, clearing a table.
//! - Log every failure where it happens and return it as a [`SqliteError`].
//!
//! # Architectural Boundaries
//!
//! - Only SQLite/database code belongs here.
//! - Calls block until the engine returns. There is no locking; callers
//!   serialize access to a connection.
//! - Table and column names are trusted schema constants and are not escaped.

pub mod config;
pub mod error;
pub mod sqlite;
pub mod statement;

pub use config::{OpenMode, SqliteConfig};
pub use error::{Result, SqliteError};
pub use sqlite::{
    clear_table, close_database, create_database, get_number_table_rows, get_table_max_int_value,
    open_database, open_database_read_only, perform_query, SqliteDatabase,
};
pub use statement::{Cursor, SqliteStatement, StepResult};
