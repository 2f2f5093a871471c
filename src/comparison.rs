use crate::marker::MarkerRow;

pub const ALLELE_MATCH_ALL: &str = "allele_match_all";
pub const ALLELE_MATCH_SEQ: &str = "allele_match_seq";

/// Identity of one stored comparison, ignoring the metric.
///
/// Bird 1 is always the bird with the smaller full name, see
/// [`Participant::canonical`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComparisonKey {
    pub bird1_id: i64,
    pub session1_id: i64,
    pub bird2_id: i64,
    pub session2_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Metric {
    AlleleMatchAll,
    AlleleMatchSeq,
    /// difference of a phenotype measurement, named after the phenotype
    Phenotype(String),
}

impl Metric {
    pub fn name(&self) -> &str {
        match self {
            Metric::AlleleMatchAll => ALLELE_MATCH_ALL,
            Metric::AlleleMatchSeq => ALLELE_MATCH_SEQ,
            Metric::Phenotype(p) => p.as_str(),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRecord {
    pub key: ComparisonKey,
    pub metric: Metric,
    pub value: f64,
}

/// A bird entering a comparison together with its genotyping session
#[derive(Debug, Clone, Copy)]
pub struct Participant<'a> {
    pub row: &'a MarkerRow,
    pub session_id: i64,
}

impl<'a> Participant<'a> {
    pub fn new(row: &'a MarkerRow, session_id: i64) -> Self {
        Self { row, session_id }
    }

    pub fn name(&self) -> &'a str {
        &self.row.full_name
    }

    /// order a pair so that the smaller full name comes first
    pub fn canonical(a: Self, b: Self) -> (Self, Self) {
        if b.row.full_name < a.row.full_name {
            (b, a)
        } else {
            (a, b)
        }
    }

    /// key of the canonical ordering of `a` and `b`
    pub fn key(a: Self, b: Self) -> ComparisonKey {
        let (first, second) = Self::canonical(a, b);
        ComparisonKey {
            bird1_id: first.row.individual_id,
            session1_id: first.session_id,
            bird2_id: second.row.individual_id,
            session2_id: second.session_id,
        }
    }
}

#[test]
fn test_key_is_commutative() {
    use crate::marker::row;
    let a = row(10, "20190412_red12yellow3", None, &["A/A"]);
    let b = row(3, "20180101_blue1green2", None, &["A/A"]);
    let pa = Participant::new(&a, 100);
    let pb = Participant::new(&b, 200);
    let k1 = Participant::key(pa, pb);
    let k2 = Participant::key(pb, pa);
    assert_eq!(k1, k2);
    assert_eq!(
        k1,
        ComparisonKey {
            bird1_id: 3,
            session1_id: 200,
            bird2_id: 10,
            session2_id: 100
        }
    );
    let mut set = ahash::AHashSet::new();
    set.insert(k1);
    assert!(set.contains(&k2));
}

#[test]
fn test_metric_names() {
    assert_eq!(Metric::AlleleMatchAll.name(), "allele_match_all");
    assert_eq!(Metric::AlleleMatchSeq.to_string(), "allele_match_seq");
    assert_eq!(Metric::Phenotype("median_tempo".into()).name(), "median_tempo");
}
