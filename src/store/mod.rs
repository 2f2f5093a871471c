//! Access to the colony database.
//!
//! The comparator only needs a handful of queries, collected in
//! [`ComparisonStore`]. [`sqlite::SqliteStore`] talks to a real database,
//! [`memory::MemoryStore`] keeps everything in memory for tests and fixtures.

pub mod memory;
pub mod sqlite;

use crate::comparison::{ComparisonKey, ComparisonRecord};
use crate::config::Assay;
use crate::relation::Relationship;
use snafu::Snafu;
use std::backtrace::Backtrace;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("database error"))]
    Sqlx {
        source: sqlx::Error,
        backtrace: Option<Backtrace>,
    },
    #[snafu(display("cannot start database runtime"))]
    Runtime {
        source: std::io::Error,
        backtrace: Option<Backtrace>,
    },
    #[snafu(display("{metric} comparison of birds {bird1_id} and {bird2_id} rejected by store"))]
    Rejected {
        metric: String,
        bird1_id: i64,
        bird2_id: i64,
        backtrace: Option<Backtrace>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// A stored comparison value with both birds resolved to their names
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    pub bird1: String,
    pub bird2: String,
    pub value: f64,
}

pub trait ComparisonStore {
    /// every known relationship between two birds, by name
    fn relationships(&mut self) -> Result<Vec<Relationship>>;

    /// keys of all comparisons already stored, whatever their metric
    fn processed_keys(&mut self) -> Result<Vec<ComparisonKey>>;

    /// id of the most recent session of `assay` for the bird named `full_name`
    fn latest_session(&mut self, full_name: &str, assay: &Assay) -> Result<Option<i64>>;

    /// Insert a comparison unless one with the same key and metric exists.
    ///
    /// Returns `Ok(false)` when the insert was ignored as a duplicate.
    fn insert_comparison(&mut self, rec: &ComparisonRecord) -> Result<bool>;

    fn commit(&mut self) -> Result<()>;

    /// discard inserts made since the last commit
    fn rollback(&mut self) -> Result<()>;

    /// all stored values of one metric, sorted by the two bird names
    fn metric_values(&mut self, metric: &str) -> Result<Vec<NamedValue>>;

    fn birds_with_sex(&mut self, sex: &str) -> Result<Vec<String>>;
}
