use crate::distance::{self, AlleleMatcher, SeqMatch};
use crate::indiv::Individuals;
use crate::io::IntoTsv;
use crate::marker::{MarkerRow, MarkerTable};
use itertools::Itertools;
use rayon::prelude::*;

/// Similarity of one pair of birds, bird1 sorting before bird2
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixEntry {
    pub bird1: String,
    pub bird2: String,
    pub all: f64,
    pub seq: SeqMatch,
}

/// Allele match scores of every pair of a marker table, in long format.
///
/// Computed in memory only; nothing is read from or written to the store.
#[derive(Debug, Default, Clone)]
pub struct SimilarityMatrix {
    entries: Vec<MatrixEntry>,
}

impl SimilarityMatrix {
    /// Score every unordered pair of named rows of `table`.
    ///
    /// With `subset`, only birds listed there are used. Pairs whose
    /// all-markers score is below `min_all` are dropped.
    pub fn compute(
        table: &MarkerTable,
        subset: Option<&Individuals>,
        matcher: &AlleleMatcher,
        min_all: Option<f64>,
    ) -> Result<Self, distance::Error> {
        let rows: Vec<&MarkerRow> = table
            .rows()
            .iter()
            .filter(|r| r.has_name())
            .filter(|r| subset.map_or(true, |s| s.contains(&r.full_name)))
            .collect();
        let pairs: Vec<(usize, usize)> = (0..rows.len()).tuple_combinations().collect();
        log::info!("scoring {} pairs of {} birds", pairs.len(), rows.len());

        // rows are name-sorted so i < j keeps bird1 < bird2
        let scored: Vec<Option<MatrixEntry>> = pairs
            .into_par_iter()
            .map(|(i, j)| -> Result<Option<MatrixEntry>, distance::Error> {
                let (a, b) = (rows[i], rows[j]);
                let m = matcher.compare(&a.markers, &b.markers)?;
                if min_all.map_or(false, |min| m.all < min) {
                    return Ok(None);
                }
                Ok(Some(MatrixEntry {
                    bird1: a.full_name.clone(),
                    bird2: b.full_name.clone(),
                    all: m.all,
                    seq: m.seq,
                }))
            })
            .collect::<Result<_, distance::Error>>()?;

        Ok(Self {
            entries: scored.into_iter().flatten().collect(),
        })
    }

    pub fn entries(&self) -> &[MatrixEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoTsv for SimilarityMatrix {
    fn header(&self) -> Vec<String> {
        ["Bird1", "Bird2", "AllMarkers", "SequencedMarkers"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn write_rows<W: std::io::Write>(&self, w: &mut csv::Writer<W>) -> csv::Result<()> {
        for e in &self.entries {
            w.write_record([
                e.bird1.clone(),
                e.bird2.clone(),
                format!("{:.2}%", e.all),
                e.seq.to_string(),
            ])?;
        }
        Ok(())
    }
}

#[test]
fn test_matrix_all_pairs() {
    let table = MarkerTable::from_tsv_file("testdata/markers.tsv", "median_tempo", None).unwrap();
    let m = SimilarityMatrix::compute(&table, None, &AlleleMatcher::default(), None).unwrap();
    assert_eq!(m.len(), 6);
    let names: Vec<_> = m
        .entries()
        .iter()
        .map(|e| (e.bird1.as_str(), e.bird2.as_str()))
        .collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
    assert!(m.entries().iter().all(|e| e.bird1 < e.bird2));
}

#[test]
fn test_matrix_subset_and_threshold() {
    let table = MarkerTable::from_tsv_file("testdata/markers.tsv", "median_tempo", None).unwrap();
    let subset = Individuals::from_iter(
        ["20180101_blue1green2", "20190412_red12yellow3", "20200620_orange4pink5"].into_iter(),
    );
    let matcher = AlleleMatcher::default();
    let m = SimilarityMatrix::compute(&table, Some(&subset), &matcher, None).unwrap();
    assert_eq!(m.len(), 3);
    let m = SimilarityMatrix::compute(&table, Some(&subset), &matcher, Some(60.0)).unwrap();
    assert_eq!(m.len(), 2);
    assert_eq!(
        m.into_tsv_string(),
        "Bird1\tBird2\tAllMarkers\tSequencedMarkers\n\
         20180101_blue1green2\t20200620_orange4pink5\t75.00%\t50.00%\n\
         20190412_red12yellow3\t20200620_orange4pink5\t75.00%\t100.00%\n"
    );
}
