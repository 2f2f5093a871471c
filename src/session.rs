use crate::config::Assay;
use crate::store::{self, ComparisonStore};
use ahash::AHashMap;
use snafu::{OptionExt, ResultExt, Snafu};
use std::backtrace::Backtrace;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("no {} {} session for {name}", assay.cv, assay.kind))]
    MissingSession {
        name: String,
        assay: Assay,
        backtrace: Option<Backtrace>,
    },
    #[snafu(display("cannot look up session for {name}"))]
    Lookup {
        name: String,
        source: store::Error,
        backtrace: Option<Backtrace>,
    },
}

type Result<T> = std::result::Result<T, Error>;

/// Memoized bird name -> most recent session id of one assay
#[derive(Debug)]
pub struct SessionCache {
    assay: Assay,
    cache: AHashMap<String, i64>,
}

impl SessionCache {
    pub fn new(assay: Assay) -> Self {
        Self {
            assay,
            cache: AHashMap::new(),
        }
    }

    /// Session of `name`, asking the store only the first time.
    ///
    /// A bird that was never assayed is an error: comparisons are recorded
    /// against sessions, so there is nothing to record it against.
    pub fn resolve<S: ComparisonStore + ?Sized>(&mut self, store: &mut S, name: &str) -> Result<i64> {
        if let Some(id) = self.cache.get(name) {
            return Ok(*id);
        }
        let id = store
            .latest_session(name, &self.assay)
            .context(LookupSnafu { name })?
            .context(MissingSessionSnafu {
                name,
                assay: self.assay.clone(),
            })?;
        self.cache.insert(name.to_owned(), id);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
struct CountingStore {
    inner: store::memory::MemoryStore,
    lookups: usize,
}

#[cfg(test)]
impl ComparisonStore for CountingStore {
    fn relationships(&mut self) -> store::Result<Vec<crate::relation::Relationship>> {
        self.inner.relationships()
    }
    fn processed_keys(&mut self) -> store::Result<Vec<crate::comparison::ComparisonKey>> {
        self.inner.processed_keys()
    }
    fn latest_session(&mut self, full_name: &str, assay: &Assay) -> store::Result<Option<i64>> {
        self.lookups += 1;
        self.inner.latest_session(full_name, assay)
    }
    fn insert_comparison(&mut self, rec: &crate::comparison::ComparisonRecord) -> store::Result<bool> {
        self.inner.insert_comparison(rec)
    }
    fn commit(&mut self) -> store::Result<()> {
        self.inner.commit()
    }
    fn rollback(&mut self) -> store::Result<()> {
        self.inner.rollback()
    }
    fn metric_values(&mut self, metric: &str) -> store::Result<Vec<store::NamedValue>> {
        self.inner.metric_values(metric)
    }
    fn birds_with_sex(&mut self, sex: &str) -> store::Result<Vec<String>> {
        self.inner.birds_with_sex(sex)
    }
}

#[test]
fn test_session_memoized() {
    let assay = Assay::default();
    let mut inner = store::memory::MemoryStore::new();
    inner.add_session(41, "a", &assay, 1);
    let mut s = CountingStore { inner, lookups: 0 };
    let mut cache = SessionCache::new(assay);
    assert_eq!(cache.resolve(&mut s, "a").unwrap(), 41);
    assert_eq!(cache.resolve(&mut s, "a").unwrap(), 41);
    assert_eq!(s.lookups, 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_missing_session_is_error() {
    let mut s = store::memory::MemoryStore::new();
    let mut cache = SessionCache::new(Assay::default());
    let err = cache.resolve(&mut s, "ghost").unwrap_err();
    assert!(matches!(err, Error::MissingSession { .. }));
    assert_eq!(err.to_string(), "no genotype allelic_state session for ghost");
}
