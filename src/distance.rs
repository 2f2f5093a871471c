use crate::config::MarkerConventions;
use snafu::{ensure, Snafu};
use std::backtrace::Backtrace;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("marker layouts differ: {left} vs {right} markers"))]
    LayoutMismatch {
        left: usize,
        right: usize,
        backtrace: Option<Backtrace>,
    },
    #[snafu(display("cannot compare birds without markers"))]
    EmptyLayout { backtrace: Option<Backtrace> },
}

type Result<T> = std::result::Result<T, Error>;

/// Similarity restricted to markers sequenced in both birds
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeqMatch {
    Percent(f64),
    /// every marker is missing in at least one of the two birds
    NoSequencedMarkers,
}

impl SeqMatch {
    pub fn percent(&self) -> Option<f64> {
        match self {
            SeqMatch::Percent(x) => Some(*x),
            SeqMatch::NoSequencedMarkers => None,
        }
    }
}

impl std::fmt::Display for SeqMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeqMatch::Percent(x) => write!(f, "{x:.2}%"),
            SeqMatch::NoSequencedMarkers => write!(f, "NA"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlleleMatch {
    /// percent match over all markers, half credit for one shared allele
    pub all: f64,
    pub seq: SeqMatch,
    pub n_markers: usize,
    pub n_sequenced: usize,
}

/// Compares genotype calls of two birds marker by marker.
///
/// Calls are compared as raw strings: `"C/G"` equals `"C/G"` but not
/// `"G/C"`. A call equal to `missing_call` is never a match and does not
/// count as sequenced; an allele equal to `missing_allele` is never shared.
#[derive(Debug, Clone)]
pub struct AlleleMatcher {
    missing_call: String,
    missing_allele: String,
}

impl Default for AlleleMatcher {
    fn default() -> Self {
        Self::new(&MarkerConventions::default())
    }
}

impl AlleleMatcher {
    pub fn new(conv: &MarkerConventions) -> Self {
        Self {
            missing_call: conv.missing_call.clone(),
            missing_allele: conv.missing_allele.clone(),
        }
    }

    pub fn is_missing(&self, call: &str) -> bool {
        call == self.missing_call
    }

    fn shares_allele(&self, v1: &str, v2: &str) -> bool {
        v1.split('/')
            .filter(|a| *a != self.missing_allele)
            .any(|a| v2.split('/').any(|b| b == a))
    }

    pub fn compare<S1, S2>(&self, m1: &[S1], m2: &[S2]) -> Result<AlleleMatch>
    where
        S1: AsRef<str>,
        S2: AsRef<str>,
    {
        ensure!(
            m1.len() == m2.len(),
            LayoutMismatchSnafu {
                left: m1.len(),
                right: m2.len(),
            }
        );
        ensure!(!m1.is_empty(), EmptyLayoutSnafu);

        let mut score = 0.0f64;
        let mut seqscore = 0.0f64;
        let mut seqcount = 0usize;
        for (v1, v2) in m1.iter().zip(m2.iter()) {
            let (v1, v2) = (v1.as_ref(), v2.as_ref());
            if v1 == v2 && !self.is_missing(v1) {
                score += 1.0;
            } else if self.shares_allele(v1, v2) {
                score += 0.5;
            }
            if !self.is_missing(v1) && !self.is_missing(v2) {
                seqcount += 1;
                if v1 == v2 {
                    seqscore += 1.0;
                }
            }
        }

        let seq = match seqcount {
            0 => SeqMatch::NoSequencedMarkers,
            n => SeqMatch::Percent(seqscore / n as f64 * 100.0),
        };
        Ok(AlleleMatch {
            all: score / m1.len() as f64 * 100.0,
            seq,
            n_markers: m1.len(),
            n_sequenced: seqcount,
        })
    }
}

#[test]
fn test_partial_and_missing() {
    let m = AlleleMatcher::default();
    let r = m
        .compare(&["C/G", "C/C", "./."], &["C/G", "C/T", "C/C"])
        .unwrap();
    assert_eq!(r.all, 50.0);
    assert_eq!(r.seq, SeqMatch::Percent(50.0));
    assert_eq!(r.n_sequenced, 2);
}

#[test]
fn test_both_missing_contributes_nothing() {
    let m = AlleleMatcher::default();
    let r = m.compare(&["A/A", "./."], &["A/A", "./."]).unwrap();
    assert_eq!(r.all, 50.0);
    assert_eq!(r.seq, SeqMatch::Percent(100.0));
    assert_eq!(r.n_sequenced, 1);
}

#[test]
fn test_no_sequenced_markers() {
    let m = AlleleMatcher::default();
    let r = m.compare(&["./.", "A/A"], &["C/C", "./."]).unwrap();
    assert_eq!(r.seq, SeqMatch::NoSequencedMarkers);
    assert_eq!(r.seq.percent(), None);
    assert_eq!(format!("{}", r.seq), "NA");
    assert_eq!(r.all, 0.0);
}

#[test]
fn test_half_called_allele_is_not_shared() {
    let m = AlleleMatcher::default();
    // "." is not a real allele even though it occurs in both calls
    let r = m.compare(&["./A"], &["./C"]).unwrap();
    assert_eq!(r.all, 0.0);
    let r = m.compare(&["./A"], &["A/C"]).unwrap();
    assert_eq!(r.all, 50.0);
}

#[test]
fn test_custom_sentinel() {
    let m = AlleleMatcher::new(&MarkerConventions {
        missing_call: "N/N".to_owned(),
        missing_allele: "N".to_owned(),
    });
    let r = m.compare(&["N/N", "./."], &["N/N", "./."]).unwrap();
    // "./." is an ordinary call under this convention
    assert_eq!(r.all, 50.0);
    assert_eq!(r.seq, SeqMatch::Percent(100.0));
}

#[test]
fn test_layout_mismatch() {
    let m = AlleleMatcher::default();
    assert!(matches!(
        m.compare(&["A/A"], &["A/A", "C/C"]),
        Err(Error::LayoutMismatch { .. })
    ));
    let empty: [&str; 0] = [];
    assert!(matches!(
        m.compare(&empty, &empty),
        Err(Error::EmptyLayout { .. })
    ));
}

#[test]
fn test_all_score_monotone_in_exact_matches() {
    use rand::seq::SliceRandom;
    use rand::Rng;
    let calls = ["A/A", "A/C", "C/C", "C/T", "./."];
    let mut rng = rand::thread_rng();
    let m = AlleleMatcher::default();
    for _ in 0..50 {
        let n = rng.gen_range(1..30);
        let a: Vec<&str> = (0..n).map(|_| *calls.choose(&mut rng).unwrap()).collect();
        let mut b: Vec<&str> = (0..n).map(|_| *calls.choose(&mut rng).unwrap()).collect();
        let mut last = m.compare(&a, &b).unwrap().all;
        // turn columns into exact (non-missing) matches one at a time
        for i in 0..n {
            if a[i] == "./." {
                continue;
            }
            b[i] = a[i];
            let now = m.compare(&a, &b).unwrap().all;
            assert!(now >= last, "{now} < {last}");
            last = now;
        }
    }
}
