//! Configuration for opening a database file.

use std::path::PathBuf;

use rusqlite::OpenFlags;
use serde::{Deserialize, Serialize};

/// How a database file is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Open an existing file without write access.
    ReadOnly,
    /// Open an existing file for reading and writing.
    #[default]
    ReadWrite,
    /// Create a new file; fails if one already exists.
    Create,
}

impl OpenMode {
    /// Engine flags for this mode.
    pub fn flags(self) -> OpenFlags {
        match self {
            OpenMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            OpenMode::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
            OpenMode::Create => OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        }
    }
}

/// SQLite database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,
    #[serde(default)]
    pub open_mode: OpenMode,
}

impl SqliteConfig {
    /// Create a config for `db_path` using [`OpenMode::ReadWrite`]
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            open_mode: OpenMode::default(),
        }
    }

    /// Set how the file is opened
    pub fn with_open_mode(mut self, open_mode: OpenMode) -> Self {
        self.open_mode = open_mode;
        self
    }
}
