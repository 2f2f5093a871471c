use super::{ComparisonStore, NamedValue, RejectedSnafu, Result};
use crate::comparison::{ComparisonKey, ComparisonRecord};
use crate::config::Assay;
use crate::relation::Relationship;
use ahash::{AHashMap, AHashSet};
use snafu::ensure;

#[derive(Debug, Clone)]
struct Bird {
    name: String,
    sex: String,
}

#[derive(Debug, Clone)]
struct Session {
    id: i64,
    bird: String,
    assay: Assay,
    /// larger is more recent
    created: i64,
}

/// In-memory stand-in for the colony database
#[derive(Debug, Default)]
pub struct MemoryStore {
    birds: AHashMap<i64, Bird>,
    sessions: Vec<Session>,
    relationships: Vec<Relationship>,
    committed: Vec<ComparisonRecord>,
    pending: Vec<ComparisonRecord>,
    rejected_metrics: AHashSet<String>,
    insert_calls: usize,
    commits: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bird(&mut self, id: i64, name: &str, sex: &str) {
        self.birds.insert(
            id,
            Bird {
                name: name.to_owned(),
                sex: sex.to_owned(),
            },
        );
    }

    pub fn add_session(&mut self, id: i64, bird: &str, assay: &Assay, created: i64) {
        self.sessions.push(Session {
            id,
            bird: bird.to_owned(),
            assay: assay.clone(),
            created,
        });
    }

    pub fn add_relationship(&mut self, subject: &str, kind: &str, object: &str) {
        self.relationships.push(Relationship {
            subject: subject.to_owned(),
            kind: kind.to_owned(),
            object: object.to_owned(),
        });
    }

    /// make every insert of `metric` fail, as a constraint violation would
    pub fn reject_metric(&mut self, metric: &str) {
        self.rejected_metrics.insert(metric.to_owned());
    }

    pub fn comparisons(&self) -> &[ComparisonRecord] {
        &self.committed
    }

    pub fn pending(&self) -> &[ComparisonRecord] {
        &self.pending
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    fn exists(&self, rec: &ComparisonRecord) -> bool {
        self.committed
            .iter()
            .chain(self.pending.iter())
            .any(|r| r.key == rec.key && r.metric == rec.metric)
    }
}

impl ComparisonStore for MemoryStore {
    fn relationships(&mut self) -> Result<Vec<Relationship>> {
        Ok(self.relationships.clone())
    }

    fn processed_keys(&mut self) -> Result<Vec<ComparisonKey>> {
        Ok(self.committed.iter().map(|r| r.key).collect())
    }

    fn latest_session(&mut self, full_name: &str, assay: &Assay) -> Result<Option<i64>> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| s.bird == full_name && &s.assay == assay)
            .max_by_key(|s| (s.created, s.id))
            .map(|s| s.id))
    }

    fn insert_comparison(&mut self, rec: &ComparisonRecord) -> Result<bool> {
        self.insert_calls += 1;
        ensure!(
            !self.rejected_metrics.contains(rec.metric.name()),
            RejectedSnafu {
                metric: rec.metric.name(),
                bird1_id: rec.key.bird1_id,
                bird2_id: rec.key.bird2_id,
            }
        );
        if self.exists(rec) {
            return Ok(false);
        }
        self.pending.push(rec.clone());
        Ok(true)
    }

    fn commit(&mut self) -> Result<()> {
        self.committed.append(&mut self.pending);
        self.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.pending.clear();
        Ok(())
    }

    fn metric_values(&mut self, metric: &str) -> Result<Vec<NamedValue>> {
        let name_of = |id: i64| self.birds.get(&id).map(|b| b.name.clone());
        let mut v: Vec<NamedValue> = self
            .committed
            .iter()
            .filter(|r| r.metric.name() == metric)
            .filter_map(|r| {
                Some(NamedValue {
                    bird1: name_of(r.key.bird1_id)?,
                    bird2: name_of(r.key.bird2_id)?,
                    value: r.value,
                })
            })
            .collect();
        v.sort_by(|a, b| (&a.bird1, &a.bird2).cmp(&(&b.bird1, &b.bird2)));
        Ok(v)
    }

    fn birds_with_sex(&mut self, sex: &str) -> Result<Vec<String>> {
        let mut v: Vec<String> = self
            .birds
            .values()
            .filter(|b| b.sex == sex)
            .map(|b| b.name.clone())
            .collect();
        v.sort();
        Ok(v)
    }
}

#[cfg(test)]
fn record(b1: i64, b2: i64, metric: crate::comparison::Metric, value: f64) -> ComparisonRecord {
    ComparisonRecord {
        key: ComparisonKey {
            bird1_id: b1,
            session1_id: b1 * 10,
            bird2_id: b2,
            session2_id: b2 * 10,
        },
        metric,
        value,
    }
}

#[test]
fn test_insert_ignore_and_commit() {
    use crate::comparison::Metric;
    let mut store = MemoryStore::new();
    let r = record(1, 2, Metric::AlleleMatchAll, 50.0);
    assert!(store.insert_comparison(&r).unwrap());
    // duplicate in the same transaction is a silent no-op
    assert!(!store.insert_comparison(&r).unwrap());
    // another metric for the same key is not a duplicate
    assert!(store
        .insert_comparison(&record(1, 2, Metric::AlleleMatchSeq, 40.0))
        .unwrap());
    assert!(store.processed_keys().unwrap().is_empty());
    store.commit().unwrap();
    assert_eq!(store.comparisons().len(), 2);
    assert!(!store.insert_comparison(&r).unwrap());
    assert_eq!(store.insert_calls(), 4);

    store
        .insert_comparison(&record(1, 3, Metric::AlleleMatchAll, 10.0))
        .unwrap();
    store.rollback().unwrap();
    assert_eq!(store.comparisons().len(), 2);
    assert!(store.pending().is_empty());
}

#[test]
fn test_latest_session() {
    let mut store = MemoryStore::new();
    let genotype = Assay::default();
    let phenotype = Assay {
        cv: "phenotype".into(),
        kind: "median_tempo".into(),
    };
    store.add_session(5, "a", &genotype, 1);
    store.add_session(9, "a", &genotype, 3);
    store.add_session(11, "a", &phenotype, 4);
    store.add_session(7, "b", &genotype, 2);
    assert_eq!(store.latest_session("a", &genotype).unwrap(), Some(9));
    assert_eq!(store.latest_session("b", &genotype).unwrap(), Some(7));
    assert_eq!(store.latest_session("b", &phenotype).unwrap(), None);
    assert_eq!(store.latest_session("c", &genotype).unwrap(), None);
}

#[test]
fn test_rejected_metric() {
    use crate::comparison::Metric;
    let mut store = MemoryStore::new();
    store.reject_metric("median_tempo");
    let r = record(1, 2, Metric::Phenotype("median_tempo".into()), 1.0);
    assert!(store.insert_comparison(&r).is_err());
    assert!(store
        .insert_comparison(&record(1, 2, Metric::AlleleMatchAll, 1.0))
        .is_ok());
}

#[test]
fn test_metric_values_by_name() {
    use crate::comparison::Metric;
    let mut store = MemoryStore::new();
    store.add_bird(1, "b_bird", "M");
    store.add_bird(2, "c_bird", "M");
    store.add_bird(3, "a_bird", "F");
    store
        .insert_comparison(&record(1, 2, Metric::AlleleMatchSeq, 75.0))
        .unwrap();
    store
        .insert_comparison(&record(3, 1, Metric::AlleleMatchSeq, 25.0))
        .unwrap();
    store.commit().unwrap();
    let v = store.metric_values("allele_match_seq").unwrap();
    assert_eq!(v.len(), 2);
    assert_eq!(v[0].bird1, "a_bird");
    assert_eq!(v[1].value, 75.0);
    assert_eq!(store.birds_with_sex("M").unwrap(), vec!["b_bird", "c_bird"]);
}
