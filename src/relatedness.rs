//! Phenotype difference vs genotype similarity of compared male pairs.
//!
//! Every pair with both a stored genotype metric and a stored phenotype
//! metric becomes one [`Point`]. Points of pairs with a known relationship
//! are kept apart from the others so the two groups can be summarised and
//! plotted side by side.

use crate::container::histogram::{self, Histogram};
use crate::io::IntoTsv;
use crate::relation::RelationshipMap;
use crate::store::{self, ComparisonStore};
use ahash::{AHashMap, AHashSet};
use log::{debug, info};
use snafu::{ResultExt, Snafu};
use statrs::statistics::Statistics;
use std::backtrace::Backtrace;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("cannot read {what} from store"))]
    Read {
        what: String,
        source: store::Error,
        backtrace: Option<Backtrace>,
    },
    #[snafu(transparent)]
    Histogram {
        #[snafu(backtrace)]
        source: histogram::Error,
    },
}

type Result<T> = std::result::Result<T, Error>;

pub const MALE: &str = "M";

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub bird1: String,
    pub bird2: String,
    /// absolute phenotype difference
    pub phenotype: f64,
    /// genotype metric, rounded to 4 decimals
    pub genotype: f64,
    pub related: bool,
}

#[derive(Debug, Default, Clone)]
pub struct Points {
    points: Vec<Point>,
}

fn round4(x: f64) -> f64 {
    (x * 1e4).round() / 1e4
}

impl Points {
    /// Join the stored `genotype` and `phenotype` metrics of male pairs.
    pub fn from_store<S: ComparisonStore + ?Sized>(
        store: &mut S,
        genotype: &str,
        phenotype: &str,
    ) -> Result<Self> {
        let males: AHashSet<String> = store
            .birds_with_sex(MALE)
            .context(ReadSnafu { what: "males" })?
            .into_iter()
            .collect();
        let relationships: RelationshipMap = store
            .relationships()
            .context(ReadSnafu {
                what: "relationships",
            })?
            .into_iter()
            .collect();
        info!("Males found: {}", males.len());

        let is_male_pair = |a: &str, b: &str| males.contains(a) && males.contains(b);
        let geno: AHashMap<(String, String), f64> = store
            .metric_values(genotype)
            .context(ReadSnafu { what: genotype })?
            .into_iter()
            .filter(|v| is_male_pair(&v.bird1, &v.bird2))
            .map(|v| ((v.bird1, v.bird2), v.value))
            .collect();

        let mut points = Vec::new();
        let mut unmatched = 0usize;
        for v in store
            .metric_values(phenotype)
            .context(ReadSnafu { what: phenotype })?
        {
            if !is_male_pair(&v.bird1, &v.bird2) {
                continue;
            }
            let Some(g) = geno.get(&(v.bird1.clone(), v.bird2.clone())) else {
                unmatched += 1;
                continue;
            };
            let related = relationships.between(&v.bird1, &v.bird2).is_some();
            points.push(Point {
                phenotype: v.value.abs(),
                genotype: round4(*g),
                related,
                bird1: v.bird1,
                bird2: v.bird2,
            });
        }
        if unmatched > 0 {
            debug!("{unmatched} {phenotype} pairs have no {genotype} value");
        }
        Ok(Self { points })
    }

    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn class(&self, related: bool) -> impl Iterator<Item = &Point> {
        self.points.iter().filter(move |p| p.related == related)
    }

    pub fn summary(&self, related: bool) -> Result<ClassSummary> {
        ClassSummary::new(self.class(related))
    }
}

impl IntoTsv for Points {
    fn header(&self) -> Vec<String> {
        ["Bird1", "Bird2", "Phenotype", "Genotype", "Related"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn write_rows<W: std::io::Write>(&self, w: &mut csv::Writer<W>) -> csv::Result<()> {
        for p in &self.points {
            w.write_record([
                p.bird1.clone(),
                p.bird2.clone(),
                p.phenotype.to_string(),
                p.genotype.to_string(),
                p.related.to_string(),
            ])?;
        }
        Ok(())
    }
}

/// Statistics of the genotype values of one class of points
#[derive(Debug, Clone)]
pub struct ClassSummary {
    pub count: usize,
    pub birds: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub histogram: Histogram<f64>,
}

impl ClassSummary {
    pub fn new<'a>(points: impl Iterator<Item = &'a Point>) -> Result<Self> {
        let mut birds = AHashSet::new();
        let mut values = Vec::new();
        for p in points {
            birds.insert(p.bird1.as_str());
            birds.insert(p.bird2.as_str());
            values.push(p.genotype);
        }
        let mut histogram = Histogram::uniform(0.0, 100.0, 10)?;
        histogram.analyze(values.iter().copied());
        Ok(Self {
            count: values.len(),
            birds: birds.len(),
            mean: values.iter().mean(),
            std_dev: values.iter().std_dev(),
            histogram,
        })
    }

    pub fn show(&self, label: &str) -> String {
        format!(
            "{label}: {} points, {} birds, mean {:.4}, sd {:.4}\n{}",
            self.count,
            self.birds,
            self.mean,
            self.std_dev,
            self.histogram.render(40)
        )
    }
}

#[cfg(test)]
fn male_store() -> crate::store::memory::MemoryStore {
    use crate::comparison::{ComparisonKey, ComparisonRecord, Metric};
    use crate::store::memory::MemoryStore;

    let mut store = MemoryStore::new();
    store.add_bird(1, "a", "M");
    store.add_bird(2, "b", "M");
    store.add_bird(3, "c", "M");
    store.add_bird(4, "f", "F");
    store.add_relationship("b", "sibling", "a");
    let mut put = |b1: i64, b2: i64, metric: Metric, value: f64| {
        store
            .insert_comparison(&ComparisonRecord {
                key: ComparisonKey {
                    bird1_id: b1,
                    session1_id: b1,
                    bird2_id: b2,
                    session2_id: b2,
                },
                metric,
                value,
            })
            .unwrap();
    };
    let tempo = || Metric::Phenotype("median_tempo".into());
    put(1, 2, Metric::AlleleMatchSeq, 87.123456);
    put(1, 2, tempo(), -1.5);
    put(1, 3, Metric::AlleleMatchSeq, 40.0);
    put(1, 3, tempo(), 2.0);
    put(2, 3, Metric::AlleleMatchSeq, 45.0);
    put(2, 3, tempo(), 0.5);
    // female pair and a pair without genotype are left out
    put(1, 4, Metric::AlleleMatchSeq, 90.0);
    put(1, 4, tempo(), 1.0);
    put(3, 2, tempo(), 9.0);
    store.commit().unwrap();
    store
}

#[test]
fn test_points_from_store() {
    let mut store = male_store();
    let pts = Points::from_store(&mut store, "allele_match_seq", "median_tempo").unwrap();
    assert_eq!(pts.len(), 3);
    let ab = &pts.points()[0];
    assert_eq!((ab.bird1.as_str(), ab.bird2.as_str()), ("a", "b"));
    assert_eq!(ab.phenotype, 1.5);
    assert_eq!(ab.genotype, 87.1235);
    assert!(ab.related);
    assert_eq!(pts.class(false).count(), 2);
}

#[test]
fn test_class_summary() {
    let mut store = male_store();
    let pts = Points::from_store(&mut store, "allele_match_seq", "median_tempo").unwrap();
    let s = pts.summary(false).unwrap();
    assert_eq!(s.count, 2);
    assert_eq!(s.birds, 3);
    assert!((s.mean - 42.5).abs() < 1e-9);
    assert!((s.std_dev - 12.5f64.sqrt()).abs() < 1e-9);
    assert_eq!(s.histogram.get_counts()[4], 2);
    assert!(s.show("unrelated").starts_with("unrelated: 2 points, 3 birds"));

    let empty = Points::default().summary(true).unwrap();
    assert_eq!(empty.count, 0);
    assert!(empty.mean.is_nan());
}

#[test]
fn test_points_tsv() {
    let pts = Points::from_points(vec![Point {
        bird1: "a".into(),
        bird2: "b".into(),
        phenotype: 1.5,
        genotype: 87.1235,
        related: true,
    }]);
    assert_eq!(
        pts.into_tsv_string(),
        "Bird1\tBird2\tPhenotype\tGenotype\tRelated\na\tb\t1.5\t87.1235\ttrue\n"
    );
}
