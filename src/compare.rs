//! Pairwise comparison of every bird in a marker table.
//!
//! A [`Comparator`] holds everything one run needs: the store, the
//! relationships and already-processed keys loaded at start, the session
//! cache, the counters and the report. Pairs are visited with two cursors
//! over the name-sorted table; each pair is keyed in canonical (name) order
//! so a pair already in the store is skipped whatever direction it is met
//! from.

use crate::comparison::{ComparisonKey, ComparisonRecord, Metric, Participant};
use crate::config::Assay;
use crate::distance::{self, AlleleMatcher, SeqMatch};
use crate::marker::MarkerTable;
use crate::relation::RelationshipMap;
use crate::report::{Counts, Report, ReportLine};
use crate::session::{self, SessionCache};
use crate::store::{self, ComparisonStore};
use ahash::AHashSet;
use bitvec::prelude::*;
use log::{debug, error, info, warn};
use snafu::{ensure, ResultExt, Snafu};
use std::backtrace::Backtrace;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("cannot load {what} from store"))]
    Load {
        what: String,
        source: store::Error,
        backtrace: Option<Backtrace>,
    },
    #[snafu(transparent)]
    Session {
        #[snafu(backtrace)]
        source: session::Error,
    },
    #[snafu(display("cannot compare {bird1} and {bird2}"))]
    Distance {
        bird1: String,
        bird2: String,
        source: distance::Error,
        backtrace: Option<Backtrace>,
    },
    #[snafu(display("cannot {action} comparisons"))]
    Commit {
        action: String,
        source: store::Error,
        backtrace: Option<Backtrace>,
    },
    #[snafu(display("bird {name} is not in the marker table"))]
    UnknownSubject {
        name: String,
        backtrace: Option<Backtrace>,
    },
}

type Result<T> = std::result::Result<T, Error>;

/// When inserted comparisons are made durable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitPolicy {
    /// commit after every new pair, so an interrupted run keeps its work
    EachPair,
    EndOfRun,
    /// dry run: inserts are rolled back at the end
    #[default]
    Never,
}

/// Metrics to store for every new pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSelection {
    pub allele_match_all: bool,
    pub allele_match_seq: bool,
    pub phenotype: bool,
}

impl Default for MetricSelection {
    fn default() -> Self {
        Self {
            allele_match_all: true,
            allele_match_seq: true,
            phenotype: true,
        }
    }
}

impl MetricSelection {
    pub fn from_kinds(kinds: &[MetricKind]) -> Self {
        Self {
            allele_match_all: kinds.contains(&MetricKind::AlleleMatchAll),
            allele_match_seq: kinds.contains(&MetricKind::AlleleMatchSeq),
            phenotype: kinds.contains(&MetricKind::Phenotype),
        }
    }

    fn any_allele(&self) -> bool {
        self.allele_match_all || self.allele_match_seq
    }
}

/// Metric names accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum MetricKind {
    AlleleMatchAll,
    AlleleMatchSeq,
    /// the phenotype delta, stored under the phenotype name
    Phenotype,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// phenotype metric name, e.g. `median_tempo`
    pub phenotype: String,
    /// only compare this bird against the others
    pub single: Option<String>,
    /// with `single`, also compare against birds sorting before it
    pub full: bool,
    /// skip primary birds whose name sorts before this one
    pub start: Option<String>,
    pub commit: CommitPolicy,
    pub metrics: MetricSelection,
    pub assay: Assay,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            phenotype: "median_tempo".to_owned(),
            single: None,
            full: false,
            start: None,
            commit: CommitPolicy::default(),
            metrics: MetricSelection::default(),
            assay: Assay::default(),
        }
    }
}

pub struct Comparator<'s, S: ComparisonStore + ?Sized> {
    store: &'s mut S,
    opts: RunOptions,
    matcher: AlleleMatcher,
    relationships: RelationshipMap,
    processed: AHashSet<ComparisonKey>,
    sessions: SessionCache,
    counts: Counts,
    report: Report,
}

impl<'s, S: ComparisonStore + ?Sized> Comparator<'s, S> {
    /// Load relationships and already-processed keys from `store`.
    pub fn new(store: &'s mut S, opts: RunOptions, matcher: AlleleMatcher) -> Result<Self> {
        let relationships: RelationshipMap = store
            .relationships()
            .context(LoadSnafu {
                what: "relationships",
            })?
            .into_iter()
            .collect();
        let processed: AHashSet<ComparisonKey> = store
            .processed_keys()
            .context(LoadSnafu {
                what: "prior comparisons",
            })?
            .into_iter()
            .collect();
        info!("Relationships found: {}", relationships.len());
        info!("Prior comparisons found: {}", processed.len());
        let sessions = SessionCache::new(opts.assay.clone());
        Ok(Self {
            store,
            opts,
            matcher,
            relationships,
            processed,
            sessions,
            counts: Counts::default(),
            report: Report::default(),
        })
    }

    pub fn counts(&self) -> &Counts {
        &self.counts
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn options(&self) -> &RunOptions {
        &self.opts
    }

    /// upper bound of new comparisons this run can make
    pub fn estimate(&self, table: &MarkerTable) -> usize {
        let n = table.len();
        match self.opts.single {
            Some(_) => n.saturating_sub(1),
            None => (n * n.saturating_sub(1) / 2).saturating_sub(self.processed.len()),
        }
    }

    /// Compare all pairs of `table` allowed by the run options.
    ///
    /// Missing sessions and store failures while loading or committing end
    /// the run; a failed insert only loses that record.
    pub fn run(&mut self, table: &MarkerTable) -> Result<()> {
        if let Some(name) = self.opts.single.as_deref() {
            ensure!(
                table.rows().iter().any(|r| r.full_name == name),
                UnknownSubjectSnafu { name }
            );
        }
        let rows = table.rows();
        let n = rows.len();
        // rows that already served as primary; they are done
        let mut consumed = bitvec![0; n];

        for i in 0..n {
            let a = &rows[i];
            if let Some(single) = self.opts.single.as_deref() {
                if single != a.full_name {
                    continue;
                }
            }
            if let Some(start) = self.opts.start.as_deref() {
                if start > a.full_name.as_str() {
                    continue;
                }
            }
            consumed.set(i, true);
            if !a.has_name() {
                self.counts.removed += 1;
                continue;
            }
            eprint!("\r{:>8}/{} {}", i + 1, n, a.full_name);
            let pa = Participant::new(a, self.sessions.resolve(&mut *self.store, &a.full_name)?);

            for j in 0..n {
                if j == i || consumed[j] {
                    continue;
                }
                let b = &rows[j];
                if !b.has_name() {
                    self.counts.removed += 1;
                    continue;
                }
                if self.opts.single.is_some() && !self.opts.full && b.full_name < a.full_name {
                    self.counts.skipped += 1;
                    continue;
                }
                let pb = Participant::new(b, self.sessions.resolve(&mut *self.store, &b.full_name)?);
                self.compare_pair(pa, pb)?;
            }
        }
        eprintln!();

        match self.opts.commit {
            CommitPolicy::EndOfRun => self.store.commit().context(CommitSnafu { action: "commit" })?,
            CommitPolicy::Never => self
                .store
                .rollback()
                .context(CommitSnafu { action: "roll back" })?,
            CommitPolicy::EachPair => {}
        }
        if self.counts.skipped > 0 {
            warn!(
                "{} pairs with birds sorting before {} were skipped; use --full to compare them",
                self.counts.skipped,
                self.opts.single.as_deref().unwrap_or("")
            );
        }
        Ok(())
    }

    fn compare_pair(&mut self, a: Participant, b: Participant) -> Result<()> {
        let (first, second) = Participant::canonical(a, b);
        let key = Participant::key(first, second);
        self.counts.potential += 1;
        if self.processed.contains(&key) {
            self.counts.present += 1;
            return Ok(());
        }
        self.counts.comparisons += 1;
        self.processed.insert(key);

        let metrics = self.opts.metrics;
        if metrics.any_allele() {
            let m = self
                .matcher
                .compare(&first.row.markers, &second.row.markers)
                .context(DistanceSnafu {
                    bird1: first.name(),
                    bird2: second.name(),
                })?;
            self.report.push(ReportLine {
                bird1: first.name().to_owned(),
                bird2: second.name().to_owned(),
                phenotype1: first.row.phenotype_label().to_owned(),
                phenotype2: second.row.phenotype_label().to_owned(),
                all: m.all,
                seq: m.seq,
                relationship: self
                    .relationships
                    .between(first.name(), second.name())
                    .map(str::to_owned),
            });
            if metrics.allele_match_all {
                self.insert(key, Metric::AlleleMatchAll, m.all);
            }
            match m.seq {
                SeqMatch::Percent(v) if metrics.allele_match_seq => {
                    self.insert(key, Metric::AlleleMatchSeq, v)
                }
                SeqMatch::NoSequencedMarkers => {
                    debug!(
                        "no markers sequenced in both {} and {}",
                        first.name(),
                        second.name()
                    );
                    self.counts.no_sequenced += 1;
                }
                _ => {}
            }
        }
        if metrics.phenotype {
            if let (Some(p1), Some(p2)) = (first.row.phenotype_value(), second.row.phenotype_value()) {
                self.insert(key, Metric::Phenotype(self.opts.phenotype.clone()), p1 - p2);
            }
        }
        if self.opts.commit == CommitPolicy::EachPair {
            self.store
                .commit()
                .context(CommitSnafu { action: "commit" })?;
        }
        Ok(())
    }

    /// insert one record; failures are logged and counted, not returned
    fn insert(&mut self, key: ComparisonKey, metric: Metric, value: f64) {
        let rec = ComparisonRecord { key, metric, value };
        match self.store.insert_comparison(&rec) {
            Ok(_) => match &rec.metric {
                Metric::AlleleMatchAll => self.counts.allele_match_all += 1,
                Metric::AlleleMatchSeq => self.counts.allele_match_seq += 1,
                Metric::Phenotype(_) => self.counts.phenotype += 1,
            },
            Err(e) => {
                error!(
                    "Could not insert {} for {}<->{}: {}",
                    rec.metric, key.bird1_id, key.bird2_id, e
                );
                self.counts.failed += 1;
            }
        }
    }
}

#[cfg(test)]
use crate::marker::row;
#[cfg(test)]
use crate::store::memory::MemoryStore;

#[cfg(test)]
fn fixture(rows: Vec<crate::marker::MarkerRow>) -> (MarkerTable, MemoryStore) {
    let n = rows[0].markers.len();
    let names = (0..n).map(|i| format!("m{i}")).collect();
    let mut store = MemoryStore::new();
    for r in rows.iter() {
        store.add_bird(r.individual_id, &r.full_name, &r.sex);
        store.add_session(r.individual_id * 100, &r.full_name, &Assay::default(), 1);
    }
    (MarkerTable::from_rows(names, rows).unwrap(), store)
}

#[test]
fn test_phenotype_delta_record() {
    let (table, mut store) = fixture(vec![
        row(1, "a", Some("6.5"), &["A/A"]),
        row(2, "b", Some("4.5"), &["A/C"]),
    ]);
    let opts = RunOptions {
        commit: CommitPolicy::EachPair,
        ..Default::default()
    };
    let mut c = Comparator::new(&mut store, opts, AlleleMatcher::default()).unwrap();
    c.run(&table).unwrap();
    assert_eq!(c.counts().phenotype, 1);
    assert_eq!(c.counts().comparisons, 1);
    let recs: Vec<_> = store
        .comparisons()
        .iter()
        .filter(|r| r.metric == Metric::Phenotype("median_tempo".into()))
        .collect();
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].value, 2.0);
}

#[test]
fn test_already_present_is_skipped() {
    let (table, mut store) = fixture(vec![
        row(1, "a", None, &["A/A"]),
        row(2, "b", None, &["A/C"]),
    ]);
    store
        .insert_comparison(&ComparisonRecord {
            key: ComparisonKey {
                bird1_id: 1,
                session1_id: 100,
                bird2_id: 2,
                session2_id: 200,
            },
            metric: Metric::AlleleMatchAll,
            value: 50.0,
        })
        .unwrap();
    store.commit().unwrap();
    let calls = store.insert_calls();
    let mut c = Comparator::new(&mut store, RunOptions::default(), AlleleMatcher::default()).unwrap();
    c.run(&table).unwrap();
    assert_eq!(c.counts().present, 1);
    assert_eq!(c.counts().potential, 1);
    assert_eq!(c.counts().comparisons, 0);
    assert!(c.report().is_empty());
    assert_eq!(store.insert_calls(), calls);
}

#[test]
fn test_canonical_order_in_records() {
    // ids deliberately disagree with name order
    let (table, mut store) = fixture(vec![
        row(9, "zebra", Some("1.0"), &["A/A", "C/C"]),
        row(2, "alpha", Some("3.0"), &["A/A", "C/T"]),
    ]);
    let opts = RunOptions {
        commit: CommitPolicy::EndOfRun,
        ..Default::default()
    };
    let mut c = Comparator::new(&mut store, opts, AlleleMatcher::default()).unwrap();
    c.run(&table).unwrap();
    let line = &c.report().lines()[0];
    assert_eq!((line.bird1.as_str(), line.bird2.as_str()), ("alpha", "zebra"));
    assert_eq!(line.all, 75.0);
    assert_eq!(line.seq, SeqMatch::Percent(50.0));
    for r in store.comparisons() {
        assert_eq!(r.key.bird1_id, 2);
        assert_eq!(r.key.session1_id, 200);
    }
    let delta = store
        .comparisons()
        .iter()
        .find(|r| r.metric.name() == "median_tempo")
        .unwrap();
    assert_eq!(delta.value, 2.0);
}

#[test]
fn test_single_subject_modes() {
    let rows = vec![
        row(1, "a", None, &["A/A"]),
        row(2, "b", None, &["A/A"]),
        row(3, "c", None, &["A/A"]),
        row(4, "d", None, &["A/A"]),
    ];
    let (table, mut store) = fixture(rows.clone());
    let opts = RunOptions {
        single: Some("c".into()),
        ..Default::default()
    };
    let mut c = Comparator::new(&mut store, opts.clone(), AlleleMatcher::default()).unwrap();
    c.run(&table).unwrap();
    assert_eq!(c.counts().comparisons, 1);
    assert_eq!(c.counts().skipped, 2);
    assert_eq!(c.estimate(&table), 3);

    let (table, mut store) = fixture(rows);
    let opts = RunOptions { full: true, ..opts };
    let mut c = Comparator::new(&mut store, opts, AlleleMatcher::default()).unwrap();
    c.run(&table).unwrap();
    assert_eq!(c.counts().comparisons, 3);
    assert_eq!(c.counts().skipped, 0);
    let partners: Vec<_> = c
        .report()
        .lines()
        .iter()
        .map(|l| (l.bird1.as_str(), l.bird2.as_str()))
        .collect();
    assert_eq!(partners, vec![("a", "c"), ("b", "c"), ("c", "d")]);
}

#[test]
fn test_unknown_single_subject() {
    let (table, mut store) = fixture(vec![row(1, "a", None, &["A/A"])]);
    let opts = RunOptions {
        single: Some("nobody".into()),
        ..Default::default()
    };
    let mut c = Comparator::new(&mut store, opts, AlleleMatcher::default()).unwrap();
    assert!(matches!(c.run(&table), Err(Error::UnknownSubject { .. })));
}

#[test]
fn test_start_cutoff() {
    let (table, mut store) = fixture(vec![
        row(1, "a", None, &["A/A"]),
        row(2, "b", None, &["A/A"]),
        row(3, "c", None, &["A/A"]),
    ]);
    let opts = RunOptions {
        start: Some("b".into()),
        ..Default::default()
    };
    let mut c = Comparator::new(&mut store, opts, AlleleMatcher::default()).unwrap();
    c.run(&table).unwrap();
    // b-a, b-c, c-a: "a" never served as primary so it is still a partner
    assert_eq!(c.counts().comparisons, 3);
}

#[test]
fn test_unnamed_birds_removed() {
    let (table, mut store) = fixture(vec![
        row(1, "", None, &["A/A"]),
        row(2, "b", None, &["A/A"]),
        row(3, "c", None, &["A/A"]),
    ]);
    let mut c = Comparator::new(&mut store, RunOptions::default(), AlleleMatcher::default()).unwrap();
    c.run(&table).unwrap();
    assert_eq!(c.counts().removed, 1);
    assert_eq!(c.counts().comparisons, 1);
}

#[test]
fn test_missing_session_is_fatal() {
    let rows = vec![row(1, "a", None, &["A/A"]), row(2, "b", None, &["A/A"])];
    let table = MarkerTable::from_rows(vec!["m0".into()], rows).unwrap();
    let mut store = MemoryStore::new();
    store.add_session(100, "a", &Assay::default(), 1);
    let mut c = Comparator::new(&mut store, RunOptions::default(), AlleleMatcher::default()).unwrap();
    assert!(matches!(c.run(&table), Err(Error::Session { .. })));
}

#[test]
fn test_pairs_committed_before_missing_session_survive() {
    let rows = vec![
        row(1, "a", None, &["A/A"]),
        row(2, "b", None, &["A/A"]),
        row(3, "c", None, &["A/A"]),
    ];
    let table = MarkerTable::from_rows(vec!["m0".into()], rows).unwrap();
    let mut store = MemoryStore::new();
    store.add_session(100, "a", &Assay::default(), 1);
    store.add_session(200, "b", &Assay::default(), 1);
    let opts = RunOptions {
        commit: CommitPolicy::EachPair,
        ..Default::default()
    };
    {
        let mut c = Comparator::new(&mut store, opts.clone(), AlleleMatcher::default()).unwrap();
        assert!(matches!(c.run(&table), Err(Error::Session { .. })));
    }
    // a<->b was committed before c failed to resolve
    assert_eq!(store.comparisons().len(), 2);
    assert!(store
        .comparisons()
        .iter()
        .all(|r| (r.key.bird1_id, r.key.bird2_id) == (1, 2)));

    store.add_session(300, "c", &Assay::default(), 1);
    let mut c = Comparator::new(&mut store, opts, AlleleMatcher::default()).unwrap();
    c.run(&table).unwrap();
    assert_eq!(c.counts().present, 1);
    assert_eq!(c.counts().comparisons, 2);
    assert_eq!(store.comparisons().len(), 6);
}

#[test]
fn test_non_finite_phenotype_not_loaded() {
    let (table, mut store) = fixture(vec![
        row(1, "a", Some("NaN"), &["A/A"]),
        row(2, "b", Some("4.5"), &["A/A"]),
        row(3, "c", Some("inf"), &["A/A"]),
    ]);
    let opts = RunOptions {
        commit: CommitPolicy::EachPair,
        ..Default::default()
    };
    let mut c = Comparator::new(&mut store, opts, AlleleMatcher::default()).unwrap();
    c.run(&table).unwrap();
    assert_eq!(c.counts().comparisons, 3);
    assert_eq!(c.counts().phenotype, 0);
    assert!(store
        .comparisons()
        .iter()
        .all(|r| !matches!(r.metric, Metric::Phenotype(_))));
}

#[test]
fn test_failed_insert_does_not_stop_run() {
    let (table, mut store) = fixture(vec![
        row(1, "a", Some("1.0"), &["A/A"]),
        row(2, "b", Some("2.0"), &["A/A"]),
        row(3, "c", Some("3.0"), &["A/A"]),
    ]);
    store.reject_metric("median_tempo");
    let opts = RunOptions {
        commit: CommitPolicy::EachPair,
        ..Default::default()
    };
    let mut c = Comparator::new(&mut store, opts, AlleleMatcher::default()).unwrap();
    c.run(&table).unwrap();
    assert_eq!(c.counts().comparisons, 3);
    assert_eq!(c.counts().failed, 3);
    assert_eq!(c.counts().phenotype, 0);
    assert_eq!(c.counts().allele_match_all, 3);
    assert_eq!(store.comparisons().len(), 6);
}

#[test]
fn test_no_sequenced_markers_outcome() {
    let (table, mut store) = fixture(vec![
        row(1, "a", None, &["./.", "A/A"]),
        row(2, "b", None, &["A/A", "./."]),
    ]);
    let opts = RunOptions {
        commit: CommitPolicy::EachPair,
        ..Default::default()
    };
    let mut c = Comparator::new(&mut store, opts, AlleleMatcher::default()).unwrap();
    c.run(&table).unwrap();
    assert_eq!(c.counts().no_sequenced, 1);
    assert_eq!(c.counts().allele_match_seq, 0);
    assert_eq!(c.counts().allele_match_all, 1);
    assert!(store
        .comparisons()
        .iter()
        .all(|r| r.metric == Metric::AlleleMatchAll));
}

#[test]
fn test_metric_selection_from_kinds() {
    let sel = MetricSelection::from_kinds(&[MetricKind::AlleleMatchSeq, MetricKind::Phenotype]);
    assert!(!sel.allele_match_all);
    assert!(sel.allele_match_seq && sel.phenotype);
    assert!(!MetricSelection::from_kinds(&[MetricKind::Phenotype]).any_allele());
}

#[test]
fn test_metric_selection_and_dry_run() {
    let (table, mut store) = fixture(vec![
        row(1, "a", Some("1.0"), &["A/A"]),
        row(2, "b", Some("2.0"), &["A/A"]),
    ]);
    let opts = RunOptions {
        metrics: MetricSelection {
            allele_match_all: false,
            allele_match_seq: false,
            phenotype: true,
        },
        ..Default::default()
    };
    let mut c = Comparator::new(&mut store, opts, AlleleMatcher::default()).unwrap();
    c.run(&table).unwrap();
    assert_eq!(c.counts().phenotype, 1);
    assert_eq!(c.counts().allele_match_all, 0);
    assert!(c.report().is_empty());
    // default policy never commits
    assert!(store.comparisons().is_empty());
    assert!(store.pending().is_empty());
}
