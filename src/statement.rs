//! Prepared statement wrapper used by the table helpers.
//!
//! A [`SqliteStatement`] never fails to construct; preparation errors are
//! kept and reported through [`SqliteStatement::is_valid`]. Rows are walked
//! one step at a time through a [`Cursor`] borrowed from the statement.

use rusqlite::types::ValueRef;
use rusqlite::{Connection, Rows, Statement};

/// Outcome of the most recent [`Cursor::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// `step` has not been called yet.
    NotStepped,
    /// A result row is available.
    Row,
    /// The statement ran to completion.
    Done,
    /// The engine reported an error.
    Error,
}

/// A statement prepared against one connection.
///
/// Dropping it finalizes the underlying engine statement.
pub struct SqliteStatement<'conn> {
    sql: String,
    prepared: Option<Statement<'conn>>,
    prepare_error: Option<rusqlite::Error>,
}

impl<'conn> SqliteStatement<'conn> {
    pub fn new(conn: &'conn Connection, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let (prepared, prepare_error) = match conn.prepare(&sql) {
            Ok(statement) => (Some(statement), None),
            Err(err) => (None, Some(err)),
        };
        Self {
            sql,
            prepared,
            prepare_error,
        }
    }

    /// Whether preparation succeeded.
    pub fn is_valid(&self) -> bool {
        self.prepared.is_some()
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Engine error from preparation, if it failed.
    pub fn prepare_error(&self) -> Option<&rusqlite::Error> {
        self.prepare_error.as_ref()
    }

    pub fn take_prepare_error(&mut self) -> Option<rusqlite::Error> {
        self.prepare_error.take()
    }

    /// Start executing the statement. `None` if it is not valid.
    pub fn cursor(&mut self) -> Option<Cursor<'_>> {
        let statement = self.prepared.as_mut()?;
        Some(Cursor {
            rows: statement.raw_query(),
            step_result: StepResult::NotStepped,
            step_error: None,
            current_row: Vec::new(),
        })
    }
}

/// Single-row-at-a-time view over a running statement.
///
/// Dropping it resets the statement.
pub struct Cursor<'stmt> {
    rows: Rows<'stmt>,
    step_result: StepResult,
    step_error: Option<rusqlite::Error>,
    current_row: Vec<String>,
}

impl Cursor<'_> {
    /// Advance one row.
    ///
    /// Returns `true` if the engine advanced without error, whether or not a
    /// row was produced; check [`Cursor::step_result`] to tell them apart.
    pub fn step(&mut self) -> bool {
        self.current_row.clear();
        self.step_result = match self.rows.next() {
            Ok(Some(row)) => {
                self.current_row = (0usize..)
                    .map_while(|i| row.get_ref(i).ok().map(value_text))
                    .collect();
                StepResult::Row
            }
            Ok(None) => StepResult::Done,
            Err(err) => {
                self.step_error = Some(err);
                StepResult::Error
            }
        };
        self.step_result != StepResult::Error
    }

    pub fn step_result(&self) -> StepResult {
        self.step_result
    }

    /// Take the engine error from the last failed step.
    pub fn take_step_error(&mut self) -> Option<rusqlite::Error> {
        self.step_error.take()
    }

    /// Text form of the column at zero-based `position` in the current row.
    ///
    /// `NULL` reads as an empty string. Returns `None` when there is no
    /// current row or the position is out of range.
    pub fn column_text(&self, position: usize) -> Option<String> {
        self.current_row.get(position).cloned()
    }
}

fn value_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        // Whole-number reals keep their decimal point, as the engine prints them.
        ValueRef::Real(f) => format!("{f:?}"),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}
