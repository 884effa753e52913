//! Relational source access.
//!
//! The GCD dump is reached through an embedded DuckDB connection that
//! ATTACHes the real database read-only (MySQL server, SQLite dump or a DuckDB
//! file) and `USE`s it, so every query runs against unqualified GCD table
//! names. Rows are consumed through the [`SourceRow`] accessor trait.

use std::fmt;

use anyhow::{Context, Result};
use duckdb::types::Value;
use duckdb::{Connection, Row};
use rustc_hash::FxHashMap;

use crate::config::{DatabaseConfig, DatabaseKind};

/// Catalog alias the source database is attached under
const ATTACH_ALIAS: &str = "gcd";

/// Failure reading one column of one row
#[derive(Debug)]
pub enum SourceError {
    /// Column is not part of the result set
    MissingColumn(String),
    /// Column holds a value the accessor cannot convert
    TypeMismatch { column: String, found: String },
    /// Required column was NULL
    Null(String),
    Database(duckdb::Error),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumn(c) => write!(f, "no column named {c}"),
            Self::TypeMismatch { column, found } => {
                write!(f, "column {column}: unexpected value {found}")
            }
            Self::Null(c) => write!(f, "column {c} is NULL"),
            Self::Database(e) => write!(f, "database: {e}"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Database(e) => Some(e),
            _ => None,
        }
    }
}

/// Typed access to the named columns of one result row.
///
/// `Ok(None)` means SQL NULL.
pub trait SourceRow {
    fn value(&self, column: &str) -> Result<Value, SourceError>;

    fn int(&self, column: &str) -> Result<Option<i64>, SourceError> {
        let mismatch = |v: &Value| SourceError::TypeMismatch {
            column: column.to_string(),
            found: format!("{v:?}"),
        };
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Boolean(b) => Ok(Some(i64::from(b))),
            Value::TinyInt(v) => Ok(Some(i64::from(v))),
            Value::SmallInt(v) => Ok(Some(i64::from(v))),
            Value::Int(v) => Ok(Some(i64::from(v))),
            Value::BigInt(v) => Ok(Some(v)),
            Value::UTinyInt(v) => Ok(Some(i64::from(v))),
            Value::USmallInt(v) => Ok(Some(i64::from(v))),
            Value::UInt(v) => Ok(Some(i64::from(v))),
            Value::UBigInt(u) => i64::try_from(u)
                .map(Some)
                .map_err(|_| mismatch(&Value::UBigInt(u))),
            Value::HugeInt(h) => i64::try_from(h)
                .map(Some)
                .map_err(|_| mismatch(&Value::HugeInt(h))),
            // decimal page counts arrive as doubles; truncate toward zero
            Value::Float(f) if f.is_finite() => Ok(Some(f.trunc() as i64)),
            Value::Double(f) if f.is_finite() => Ok(Some(f.trunc() as i64)),
            other => Err(mismatch(&other)),
        }
    }

    fn text(&self, column: &str) -> Result<Option<String>, SourceError> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Text(s) | Value::Enum(s) => Ok(Some(s)),
            Value::Boolean(b) => Ok(Some(b.to_string())),
            Value::TinyInt(v) => Ok(Some(v.to_string())),
            Value::SmallInt(v) => Ok(Some(v.to_string())),
            Value::Int(v) => Ok(Some(v.to_string())),
            Value::BigInt(v) => Ok(Some(v.to_string())),
            Value::UTinyInt(v) => Ok(Some(v.to_string())),
            Value::USmallInt(v) => Ok(Some(v.to_string())),
            Value::UInt(v) => Ok(Some(v.to_string())),
            Value::UBigInt(v) => Ok(Some(v.to_string())),
            Value::Double(v) => Ok(Some(v.to_string())),
            other => Err(SourceError::TypeMismatch {
                column: column.to_string(),
                found: format!("{other:?}"),
            }),
        }
    }
}

impl SourceRow for Row<'_> {
    fn value(&self, column: &str) -> Result<Value, SourceError> {
        self.get::<_, Value>(column).map_err(|e| match e {
            duckdb::Error::InvalidColumnName(name) => SourceError::MissingColumn(name),
            other => SourceError::Database(other),
        })
    }
}

/// Open connection to the GCD database
pub struct GcdSource {
    conn: Connection,
}

impl GcdSource {
    /// Attach the configured database read-only.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open DuckDB in-memory connection")?;
        log::info!("Attaching GCD database: {}", config.describe());
        for stmt in attach_statements(config)? {
            conn.execute_batch(&stmt)
                .with_context(|| format!("Failed to attach {}", config.describe()))?;
        }
        Ok(Self { conn })
    }

    /// Use an already prepared connection whose default schema holds the GCD tables.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Load a two-column `id → text` table.
    pub fn lookup_table(&self, table: &str, value_column: &str) -> Result<FxHashMap<i64, String>> {
        let sql = format!("SELECT id, {value_column} FROM {table}");
        let mut map = FxHashMap::default();
        self.for_each_row(&sql, |row| {
            let id = row.int("id")?;
            let value = row.text(value_column)?;
            if let (Some(id), Some(value)) = (id, value) {
                map.insert(id, value);
            }
            Ok(())
        })
        .with_context(|| format!("Failed to load {table}"))?;
        Ok(map)
    }

    /// Stream every row of `sql` through `f`, in cursor order.
    ///
    /// Returns the number of rows visited. Any error from the cursor or from
    /// `f` stops the stream.
    pub fn for_each_row<F>(&self, sql: &str, mut f: F) -> Result<usize>
    where
        F: FnMut(&Row<'_>) -> Result<()>,
    {
        let mut stmt = self.conn.prepare(sql).context("Failed to prepare query")?;
        let mut rows = stmt.query([]).context("Failed to execute query")?;
        let mut count = 0usize;
        while let Some(row) = rows.next().context("Failed to fetch row")? {
            f(row)?;
            count += 1;
        }
        Ok(count)
    }
}

fn quote(s: &str) -> String {
    s.replace('\'', "''")
}

/// DuckDB statements that attach the configured database as the default catalog
fn attach_statements(config: &DatabaseConfig) -> Result<Vec<String>> {
    let file = || {
        config
            .path
            .as_ref()
            .map(|p| quote(&p.display().to_string()))
            .with_context(|| format!("database.path is required for kind {:?}", config.kind))
    };

    let mut stmts = Vec::new();
    match config.kind {
        DatabaseKind::Mysql => {
            let mut dsn = format!(
                "host={} port={} user={} database={}",
                config.host, config.port, config.user, config.name
            );
            if let Some(password) = &config.password {
                dsn.push_str(&format!(" password={password}"));
            }
            stmts.push("INSTALL mysql; LOAD mysql;".to_string());
            stmts.push(format!(
                "ATTACH '{}' AS {ATTACH_ALIAS} (TYPE mysql, READ_ONLY);",
                quote(&dsn)
            ));
        }
        DatabaseKind::Sqlite => {
            stmts.push("INSTALL sqlite; LOAD sqlite;".to_string());
            stmts.push(format!(
                "ATTACH '{}' AS {ATTACH_ALIAS} (TYPE sqlite, READ_ONLY);",
                file()?
            ));
        }
        DatabaseKind::Duckdb => {
            stmts.push(format!("ATTACH '{}' AS {ATTACH_ALIAS} (READ_ONLY);", file()?));
        }
    }
    stmts.push(format!("USE {ATTACH_ALIAS};"));
    Ok(stmts)
}


#[cfg(test)]
mod tests {
    use super::fake::FakeRow;
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn int_accessor_widens_and_truncates() {
        let row = FakeRow::new()
            .with("small", Value::SmallInt(12))
            .with("flag", Value::Boolean(true))
            .with("pages", Value::Double(36.75))
            .with_null("missing");
        assert_eq!(row.int("small").unwrap(), Some(12));
        assert_eq!(row.int("flag").unwrap(), Some(1));
        assert_eq!(row.int("pages").unwrap(), Some(36));
        assert_eq!(row.int("missing").unwrap(), None);
    }

    #[test]
    fn int_accessor_rejects_text() {
        let row = FakeRow::new().with_text("n", "12a");
        assert!(matches!(row.int("n"), Err(SourceError::TypeMismatch { .. })));
    }

    #[test]
    fn text_accessor_stringifies_numbers() {
        let row = FakeRow::new().with_int("n", 42).with_text("s", "Batman");
        assert_eq!(row.text("n").unwrap().as_deref(), Some("42"));
        assert_eq!(row.text("s").unwrap().as_deref(), Some("Batman"));
    }

    #[test]
    fn unknown_column_is_an_error() {
        let row = FakeRow::new();
        let err = row.text("nope").unwrap_err();
        assert!(matches!(err, SourceError::MissingColumn(ref c) if c == "nope"));
        assert_eq!(err.to_string(), "no column named nope");
    }

    #[test]
    fn duckdb_rows_read_by_name() {
        let conn = Connection::open_in_memory().unwrap();
        let source = GcdSource::from_connection(conn);
        let mut seen = Vec::new();
        let count = source
            .for_each_row(
                "SELECT 7::INTEGER AS id, 'US' AS code, NULL::VARCHAR AS gone, 3.9::DOUBLE AS pages",
                |row| {
                    seen.push((
                        row.int("id")?,
                        row.text("code")?,
                        row.text("gone")?,
                        row.int("pages")?,
                    ));
                    Ok(())
                },
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(seen, vec![(Some(7), Some("US".to_string()), None, Some(3))]);
    }

    #[test]
    fn duckdb_missing_column_maps_to_missing() {
        let source = GcdSource::from_connection(Connection::open_in_memory().unwrap());
        let mut outcome = None;
        source
            .for_each_row("SELECT 1 AS id", |row| {
                outcome = Some(row.int("story_id"));
                Ok(())
            })
            .unwrap();
        assert!(matches!(outcome, Some(Err(SourceError::MissingColumn(_)))));
    }

    #[test]
    fn lookup_table_skips_null_values() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE stddata_country (id INTEGER, code VARCHAR);
             INSERT INTO stddata_country VALUES (1, 'us'), (2, 'ca'), (3, NULL);",
        )
        .unwrap();
        let source = GcdSource::from_connection(conn);
        let map = source.lookup_table("stddata_country", "code").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&2).map(String::as_str), Some("ca"));
    }

    #[test]
    fn lookup_table_missing_is_fatal() {
        let source = GcdSource::from_connection(Connection::open_in_memory().unwrap());
        let err = source.lookup_table("gcd_story_type", "name").unwrap_err();
        assert!(format!("{err:#}").contains("gcd_story_type"));
    }

    #[test]
    fn attach_statements_per_kind() {
        let mysql = DatabaseConfig {
            password: Some("pw".to_string()),
            ..Default::default()
        };
        let stmts = attach_statements(&mysql).unwrap();
        assert!(stmts[1].contains("TYPE mysql, READ_ONLY"));
        assert!(stmts[1].contains("password=pw"));
        assert_eq!(stmts.last().unwrap(), "USE gcd;");

        let sqlite = DatabaseConfig {
            kind: DatabaseKind::Sqlite,
            path: Some(PathBuf::from("/data/o'brien.db")),
            ..Default::default()
        };
        let stmts = attach_statements(&sqlite).unwrap();
        assert!(stmts[1].contains("'/data/o''brien.db'"));

        let no_path = DatabaseConfig {
            kind: DatabaseKind::Duckdb,
            ..Default::default()
        };
        assert!(attach_statements(&no_path).is_err());
    }

    #[test]
    fn attach_duckdb_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("gcd.duckdb");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE gcd_story_type (id INTEGER, name VARCHAR); INSERT INTO gcd_story_type VALUES (19, 'comic story');")
                .unwrap();
        }
        let config = DatabaseConfig {
            kind: DatabaseKind::Duckdb,
            path: Some(path),
            ..Default::default()
        };
        let source = GcdSource::open(&config).unwrap();
        let types = source.lookup_table("gcd_story_type", "name").unwrap();
        assert_eq!(types.get(&19).map(String::as_str), Some("comic story"));
    }
}
