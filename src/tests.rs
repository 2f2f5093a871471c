use crate::compare::{CommitPolicy, Comparator, RunOptions};
use crate::comparison::Metric;
use crate::config::{Assay, Config};
use crate::distance::{AlleleMatcher, SeqMatch};
use crate::io::IntoTsv;
use crate::marker::MarkerTable;
use crate::relatedness::Points;
use crate::store::memory::MemoryStore;
use crate::store::sqlite::SqliteStore;
use crate::store::ComparisonStore;

const MARKERS: &str = "testdata/markers.tsv";
const BLUE: &str = "20180101_blue1green2";
const GREEN: &str = "20180303_green7white9";
const RED: &str = "20190412_red12yellow3";
const ORANGE: &str = "20200620_orange4pink5";

fn colony() -> MemoryStore {
    let assay = Assay::default();
    let mut store = MemoryStore::new();
    for (id, name, sex) in [(1, BLUE, "M"), (2, GREEN, "F"), (3, RED, "M"), (4, ORANGE, "M")] {
        store.add_bird(id, name, sex);
        store.add_session(id * 10, name, &assay, 1);
    }
    // a newer session wins
    store.add_session(31, RED, &assay, 2);
    store.add_relationship(RED, "child", BLUE);
    store
}

fn write_opts() -> RunOptions {
    RunOptions {
        commit: CommitPolicy::EachPair,
        ..Default::default()
    }
}

#[test]
fn compare_marker_file() {
    let table = MarkerTable::from_tsv_file(MARKERS, "median_tempo", None).unwrap();
    let mut store = colony();
    let mut c = Comparator::new(&mut store, write_opts(), AlleleMatcher::default()).unwrap();
    assert_eq!(c.estimate(&table), 6);
    c.run(&table).unwrap();

    let counts = c.counts().clone();
    assert_eq!(counts.potential, 6);
    assert_eq!(counts.comparisons, 6);
    assert_eq!(counts.allele_match_all, 6);
    assert_eq!(counts.allele_match_seq, 6);
    assert_eq!(counts.phenotype, 1);
    assert_eq!(counts.failed, 0);

    let lines = c.report().lines();
    let blue_red = lines
        .iter()
        .find(|l| l.bird1 == BLUE && l.bird2 == RED)
        .unwrap();
    assert_eq!(blue_red.all, 50.0);
    assert_eq!(blue_red.seq.to_string(), "33.33%");
    assert_eq!(blue_red.relationship.as_deref(), Some("child"));
    let red_orange = lines
        .iter()
        .find(|l| l.bird1 == RED && l.bird2 == ORANGE)
        .unwrap();
    assert_eq!(red_orange.all, 75.0);
    assert_eq!(red_orange.seq, SeqMatch::Percent(100.0));
    assert_eq!(red_orange.phenotype2, "-");

    let tempo: Vec<_> = store
        .comparisons()
        .iter()
        .filter(|r| r.metric == Metric::Phenotype("median_tempo".into()))
        .collect();
    assert_eq!(tempo.len(), 1);
    assert_eq!(tempo[0].value, -2.0);
    assert_eq!(tempo[0].key.bird1_id, 1);
    assert_eq!(tempo[0].key.session2_id, 31);
    assert_eq!(store.comparisons().len(), 13);
}

#[test]
fn rerun_is_idempotent() {
    let table = MarkerTable::from_tsv_file(MARKERS, "median_tempo", None).unwrap();
    let mut store = colony();
    Comparator::new(&mut store, write_opts(), AlleleMatcher::default())
        .unwrap()
        .run(&table)
        .unwrap();
    let stored = store.comparisons().to_vec();
    let calls = store.insert_calls();

    let mut c = Comparator::new(&mut store, write_opts(), AlleleMatcher::default()).unwrap();
    assert_eq!(c.estimate(&table), 0);
    c.run(&table).unwrap();
    assert_eq!(c.counts().present, 6);
    assert_eq!(c.counts().comparisons, 0);
    assert!(c.report().is_empty());
    assert_eq!(store.insert_calls(), calls);
    assert_eq!(store.comparisons(), stored.as_slice());
}

#[test]
fn interrupted_run_resumes() {
    let table = MarkerTable::from_tsv_file(MARKERS, "median_tempo", None).unwrap();
    let mut store = colony();
    // first pass only covers one bird
    let opts = RunOptions {
        single: Some(BLUE.into()),
        ..write_opts()
    };
    let mut c = Comparator::new(&mut store, opts, AlleleMatcher::default()).unwrap();
    c.run(&table).unwrap();
    assert_eq!(c.counts().comparisons, 3);

    let mut c = Comparator::new(&mut store, write_opts(), AlleleMatcher::default()).unwrap();
    assert_eq!(c.estimate(&table), 3);
    c.run(&table).unwrap();
    assert_eq!(c.counts().present, 3);
    assert_eq!(c.counts().comparisons, 3);
    assert_eq!(store.comparisons().len(), 13);
}

#[test]
fn dry_run_leaves_store_untouched() {
    let table = MarkerTable::from_tsv_file(MARKERS, "median_tempo", None).unwrap();
    let mut store = colony();
    let mut c =
        Comparator::new(&mut store, RunOptions::default(), AlleleMatcher::default()).unwrap();
    c.run(&table).unwrap();
    assert_eq!(c.counts().comparisons, 6);
    assert_eq!(c.report().len(), 6);
    assert!(store.comparisons().is_empty());
    assert_eq!(store.commits(), 0);
}

#[test]
fn report_file_written() {
    let table = MarkerTable::from_tsv_file(MARKERS, "median_tempo", None).unwrap();
    let mut store = colony();
    let mut c = Comparator::new(&mut store, write_opts(), AlleleMatcher::default()).unwrap();
    c.run(&table).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(crate::report::REPORT_FILE);
    c.report().into_tsv(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 7);
    assert!(text.contains(&format!("{BLUE}\t{RED}\t4.5\t6.5\t50.00%\t33.33%\tchild\n")));
    assert!(text.contains(&format!("{BLUE}\t{GREEN}\t4.5\t.\t25.00%\t0.00%\t\n")));
}

#[test]
fn sqlite_end_to_end() {
    let config = Config::from_toml_file("testdata/birdsim.toml").unwrap();
    let assay = config.assay.clone();
    let table = MarkerTable::from_tsv_file(MARKERS, "median_tempo", None).unwrap();

    let mut store = SqliteStore::open("sqlite::memory:", true).unwrap();
    store.init_schema().unwrap();
    let mut ids = Vec::new();
    for (name, sex) in [(BLUE, "M"), (GREEN, "F"), (RED, "M"), (ORANGE, "M")] {
        let id = store.add_bird(name, sex).unwrap();
        store.add_session(id, &assay, "2021-01-01 00:00:00").unwrap();
        ids.push(id);
    }
    store.add_relationship(ids[2], "child", ids[0]).unwrap();

    let opts = RunOptions {
        commit: CommitPolicy::EndOfRun,
        assay: assay.clone(),
        ..Default::default()
    };
    let matcher = AlleleMatcher::new(&config.markers);
    let mut c = Comparator::new(&mut store, opts.clone(), matcher.clone()).unwrap();
    c.run(&table).unwrap();
    assert_eq!(c.counts().comparisons, 6);

    let mut c = Comparator::new(&mut store, opts, matcher).unwrap();
    c.run(&table).unwrap();
    assert_eq!(c.counts().present, 6);
    assert_eq!(c.counts().comparisons, 0);

    let seq = store.metric_values("allele_match_seq").unwrap();
    assert_eq!(seq.len(), 6);
    // blue-red is the only male pair with a tempo on both sides
    let pts = Points::from_store(&mut store, "allele_match_seq", "median_tempo").unwrap();
    assert_eq!(pts.len(), 1);
    assert_eq!(pts.points()[0].phenotype, 2.0);
    assert_eq!(pts.points()[0].genotype, 33.3333);
    assert!(pts.points()[0].related);
    store.close().unwrap();
}
