//! Database file lifecycle and table maintenance helpers.
//!
//! The free functions take the connection as `Option<&Connection>`: a
//! missing handle is reported as [`SqliteError::NullHandle`] before the
//! engine is called. [`SqliteDatabase`] owns a connection and forwards to
//! the same functions.
//!
//! Table and column names are spliced into the SQL text as-is. They must
//! come from the caller's own schema constants, never from external input.

use std::fs::File;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, error};

use crate::config::{OpenMode, SqliteConfig};
use crate::error::{engine_code, Result, SqliteError};
use crate::statement::{Cursor, SqliteStatement, StepResult};

const RESULT_COLUMN_POSITION: usize = 0;

/// Best-effort existence probe: can the path be opened for reading.
fn file_exists(path: &Path) -> bool {
    File::open(path).is_ok()
}

fn open_with_flags(path: &Path, flags: OpenFlags) -> Result<Connection> {
    Connection::open_with_flags(path, flags).map_err(|source| {
        error!(
            operation = "open_with_flags",
            rcode = ?engine_code(&source),
            path = %path.display(),
            error = %source,
            "could not open database"
        );
        SqliteError::OpenFailed {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn null_handle(operation: &'static str) -> SqliteError {
    error!(operation, "database handle is missing");
    SqliteError::NullHandle { operation }
}

/// Create a new database file at `path`.
///
/// Fails with [`SqliteError::AlreadyExists`] without calling the engine if
/// a file is already there.
pub fn create_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();
    if file_exists(path) {
        error!(operation = "create_database", path = %path.display(), "file already exists");
        return Err(SqliteError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }

    let conn = open_with_flags(path, OpenMode::Create.flags())?;
    debug!(path = %path.display(), "database created");
    Ok(conn)
}

/// Open an existing database file for reading and writing.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    open_existing(path.as_ref(), OpenMode::ReadWrite, "open_database")
}

/// Open an existing database file without write access.
pub fn open_database_read_only(path: impl AsRef<Path>) -> Result<Connection> {
    open_existing(path.as_ref(), OpenMode::ReadOnly, "open_database_read_only")
}

fn open_existing(path: &Path, mode: OpenMode, operation: &'static str) -> Result<Connection> {
    if !file_exists(path) {
        error!(operation, path = %path.display(), "file could not be found");
        return Err(SqliteError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let conn = open_with_flags(path, mode.flags())?;
    debug!(path = %path.display(), ?mode, "database opened");
    Ok(conn)
}

/// Close a connection.
///
/// A `None` handle fails with [`SqliteError::NullHandle`]; nothing is
/// passed to the engine.
pub fn close_database(handle: Option<Connection>) -> Result<()> {
    let conn = handle.ok_or_else(|| null_handle("close_database"))?;
    // The connection comes back on failure; dropping it retries the close.
    try_close(conn).map_err(|(_, err)| err)
}

fn try_close(conn: Connection) -> std::result::Result<(), (Connection, SqliteError)> {
    match conn.close() {
        Ok(()) => {
            debug!("database closed");
            Ok(())
        }
        Err((conn, source)) => {
            error!(
                operation = "close_database",
                rcode = ?engine_code(&source),
                error = %source,
                "could not close database"
            );
            Err((conn, SqliteError::CloseFailed { source }))
        }
    }
}

/// Run `sql` directly, discarding any result rows.
///
/// Meant for statements that return nothing: table and index creation,
/// pragmas, inserts. `sql` may hold several `;`-separated statements. Each
/// one is stepped once, so a statement that returns rows is not run to
/// completion.
pub fn perform_query(handle: Option<&Connection>, sql: &str) -> Result<()> {
    let conn = handle.ok_or_else(|| null_handle("perform_query"))?;

    conn.execute_batch(sql).map_err(|source| {
        error!(
            operation = "perform_query",
            rcode = ?engine_code(&source),
            error = %source,
            sql,
            "could not execute SQL"
        );
        SqliteError::QueryFailed {
            sql: sql.to_string(),
            source,
        }
    })
}

/// Number of rows in `table_name`.
pub fn get_number_table_rows(handle: Option<&Connection>, table_name: &str) -> Result<i32> {
    const OPERATION: &str = "get_number_table_rows";
    let conn = handle.ok_or_else(|| null_handle(OPERATION))?;

    let sql = format!("SELECT COUNT(*) FROM {table_name};");
    let mut statement = SqliteStatement::new(conn, sql.as_str());
    let mut cursor = start_cursor(&mut statement, OPERATION)?;

    if !cursor.step() {
        return Err(step_failed(OPERATION, &sql, &mut cursor));
    }

    let row_value = cursor
        .column_text(RESULT_COLUMN_POSITION)
        .unwrap_or_default();
    parse_column_value(OPERATION, &row_value)
}

/// Largest value of the integer column `column_name` in `table_name`.
///
/// An empty table yields `0`.
pub fn get_table_max_int_value(
    handle: Option<&Connection>,
    table_name: &str,
    column_name: &str,
) -> Result<i32> {
    const OPERATION: &str = "get_table_max_int_value";
    let conn = handle.ok_or_else(|| null_handle(OPERATION))?;

    let sql = format!(
        "SELECT {column_name} FROM {table_name} ORDER BY {column_name} DESC LIMIT 1;"
    );
    let mut statement = SqliteStatement::new(conn, sql.as_str());
    let mut cursor = start_cursor(&mut statement, OPERATION)?;

    if !cursor.step() {
        return Err(step_failed(OPERATION, &sql, &mut cursor));
    }

    match cursor.step_result() {
        StepResult::Done => Ok(0),
        StepResult::Row => {
            let row_value = cursor
                .column_text(RESULT_COLUMN_POSITION)
                .unwrap_or_default();
            parse_column_value(OPERATION, &row_value)
        }
        other => {
            error!(
                operation = OPERATION,
                step_result = ?other,
                sql = %sql,
                "step did not evaluate to either row or completion"
            );
            Err(SqliteError::UnexpectedStepResult { sql })
        }
    }
}

/// Delete every row of `table_name`.
pub fn clear_table(handle: Option<&Connection>, table_name: &str) -> Result<()> {
    const OPERATION: &str = "clear_table";
    let conn = handle.ok_or_else(|| null_handle(OPERATION))?;

    let sql = format!("DELETE FROM {table_name};");
    let mut statement = SqliteStatement::new(conn, sql.as_str());
    let mut cursor = start_cursor(&mut statement, OPERATION)?;

    if !cursor.step() {
        return Err(step_failed(OPERATION, &sql, &mut cursor));
    }

    debug!(table = table_name, "table cleared");
    Ok(())
}

fn start_cursor<'s>(
    statement: &'s mut SqliteStatement<'_>,
    operation: &'static str,
) -> Result<Cursor<'s>> {
    if !statement.is_valid() {
        let source = statement.take_prepare_error();
        error!(
            operation,
            rcode = ?source.as_ref().and_then(engine_code),
            error = ?source,
            sql = statement.sql(),
            "could not create statement"
        );
        return Err(SqliteError::StatementPrepareFailed {
            sql: statement.sql().to_string(),
            source,
        });
    }

    let sql = statement.sql().to_string();
    statement
        .cursor()
        .ok_or(SqliteError::StatementPrepareFailed { sql, source: None })
}

fn step_failed(operation: &'static str, sql: &str, cursor: &mut Cursor<'_>) -> SqliteError {
    let source = cursor.take_step_error();
    error!(
        operation,
        rcode = ?source.as_ref().and_then(engine_code),
        error = ?source,
        sql,
        "could not step to next row"
    );
    SqliteError::StatementStepFailed {
        sql: sql.to_string(),
        source,
    }
}

fn parse_column_value(operation: &'static str, value: &str) -> Result<i32> {
    parse_int(value).ok_or_else(|| {
        error!(operation, value, "could not convert string to integer");
        SqliteError::ValueParseFailed {
            value: value.to_string(),
        }
    })
}

/// Base-10 integer that must fill the whole string (surrounding whitespace
/// allowed) and fit in an `i32`.
fn parse_int(text: &str) -> Option<i32> {
    text.trim().parse().ok()
}

/// An owned connection to one database file.
///
/// Closing is explicit. After [`SqliteDatabase::close`] succeeds every
/// operation, including a second close, fails with
/// [`SqliteError::NullHandle`]. Dropping an open database closes it and
/// ignores any error.
#[derive(Debug)]
pub struct SqliteDatabase {
    path: PathBuf,
    conn: Option<Connection>,
}

impl SqliteDatabase {
    /// Create a new database file; see [`create_database`].
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = create_database(path)?;
        Ok(Self::from_parts(path, conn))
    }

    /// Open an existing database file; see [`open_database`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = open_database(path)?;
        Ok(Self::from_parts(path, conn))
    }

    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = open_database_read_only(path)?;
        Ok(Self::from_parts(path, conn))
    }

    pub fn from_config(config: &SqliteConfig) -> Result<Self> {
        match config.open_mode {
            OpenMode::Create => Self::create(&config.db_path),
            OpenMode::ReadWrite => Self::open(&config.db_path),
            OpenMode::ReadOnly => Self::open_read_only(&config.db_path),
        }
    }

    fn from_parts(path: &Path, conn: Connection) -> Self {
        Self {
            path: path.to_path_buf(),
            conn: Some(conn),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// The underlying connection, while open.
    pub fn connection(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }

    /// Close the connection. If the engine refuses, the connection is kept
    /// so the close can be retried.
    pub fn close(&mut self) -> Result<()> {
        let conn = self.conn.take().ok_or_else(|| null_handle("close_database"))?;
        try_close(conn).map_err(|(conn, err)| {
            self.conn = Some(conn);
            err
        })
    }

    /// See [`perform_query`].
    pub fn execute(&self, sql: &str) -> Result<()> {
        perform_query(self.conn.as_ref(), sql)
    }

    /// See [`get_number_table_rows`].
    pub fn count_rows(&self, table_name: &str) -> Result<i32> {
        get_number_table_rows(self.conn.as_ref(), table_name)
    }

    /// See [`get_table_max_int_value`].
    pub fn max_int_column(&self, table_name: &str, column_name: &str) -> Result<i32> {
        get_table_max_int_value(self.conn.as_ref(), table_name, column_name)
    }

    /// See [`clear_table`].
    pub fn clear_table(&self, table_name: &str) -> Result<()> {
        clear_table(self.conn.as_ref(), table_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE alerts (id INTEGER PRIMARY KEY, token TEXT);")
            .unwrap();
        conn
    }

    #[test]
    fn parse_int_accepts_whole_decimal_strings() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int(" -7 "), Some(-7));
        assert_eq!(parse_int("+3"), Some(3));
        assert_eq!(parse_int("2147483647"), Some(i32::MAX));
    }

    #[test]
    fn parse_int_rejects_partial_and_out_of_range() {
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("12abc"), None);
        assert_eq!(parse_int("1.5"), None);
        assert_eq!(parse_int("2147483648"), None);
    }

    #[test]
    fn missing_handle_never_reaches_the_engine() {
        for result in [
            perform_query(None, "CREATE TABLE t (id INTEGER);").map(|_| 0),
            get_number_table_rows(None, "alerts"),
            get_table_max_int_value(None, "alerts", "id"),
            clear_table(None, "alerts").map(|_| 0),
            close_database(None).map(|_| 0),
        ] {
            assert!(matches!(result, Err(SqliteError::NullHandle { .. })));
        }
    }

    #[test]
    fn prepare_failure_on_unknown_table() {
        let conn = test_conn();
        let err = get_number_table_rows(Some(&conn), "missing").unwrap_err();
        match err {
            SqliteError::StatementPrepareFailed { sql, source } => {
                assert_eq!(sql, "SELECT COUNT(*) FROM missing;");
                assert!(source.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = clear_table(Some(&conn), "missing").unwrap_err();
        assert!(matches!(err, SqliteError::StatementPrepareFailed { .. }));
    }

    #[test]
    fn max_of_non_integer_column_fails_to_parse() {
        let conn = test_conn();
        perform_query(Some(&conn), "INSERT INTO alerts (token) VALUES ('not-a-number');")
            .unwrap();
        let err = get_table_max_int_value(Some(&conn), "alerts", "token").unwrap_err();
        match err {
            SqliteError::ValueParseFailed { value } => assert_eq!(value, "not-a-number"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn max_of_whole_number_real_column_fails_to_parse() {
        let conn = test_conn();
        perform_query(
            Some(&conn),
            "CREATE TABLE readings (value REAL);
             INSERT INTO readings VALUES (5.0), (2.0);",
        )
        .unwrap();
        let err = get_table_max_int_value(Some(&conn), "readings", "value").unwrap_err();
        match err {
            SqliteError::ValueParseFailed { value } => assert_eq!(value, "5.0"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    // abs() of the smallest i64 raises an integer overflow while the
    // statement runs, after it prepared cleanly.
    fn overflow_conn() -> Connection {
        let conn = test_conn();
        perform_query(
            Some(&conn),
            "CREATE TABLE counters (value INTEGER);
             INSERT INTO counters VALUES (-9223372036854775807 - 1);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn max_reports_step_failure() {
        let conn = overflow_conn();
        let err = get_table_max_int_value(Some(&conn), "counters", "abs(value)").unwrap_err();
        assert!(err.engine_code().is_some());
        match err {
            SqliteError::StatementStepFailed { sql, source } => {
                assert_eq!(
                    sql,
                    "SELECT abs(value) FROM counters ORDER BY abs(value) DESC LIMIT 1;"
                );
                assert!(source.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn count_reports_step_failure() {
        let conn = overflow_conn();
        let err =
            get_number_table_rows(Some(&conn), "counters WHERE abs(value) > 0").unwrap_err();
        match err {
            SqliteError::StatementStepFailed { sql, source } => {
                assert_eq!(sql, "SELECT COUNT(*) FROM counters WHERE abs(value) > 0;");
                assert!(source.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn max_ignores_nulls_sorted_last() {
        let conn = test_conn();
        perform_query(
            Some(&conn),
            "CREATE TABLE scores (value INTEGER);
             INSERT INTO scores VALUES (NULL), (4), (9), (NULL);",
        )
        .unwrap();
        assert_eq!(get_table_max_int_value(Some(&conn), "scores", "value").unwrap(), 9);
    }

    #[test]
    fn perform_query_reports_sql_and_engine_code() {
        let conn = test_conn();
        let err = perform_query(Some(&conn), "INSERT INTO nowhere VALUES (1);").unwrap_err();
        assert!(err.engine_code().is_some());
        match err {
            SqliteError::QueryFailed { sql, .. } => {
                assert_eq!(sql, "INSERT INTO nowhere VALUES (1);")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
