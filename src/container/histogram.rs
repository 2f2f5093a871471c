use snafu::{ensure, Snafu};
use std::backtrace::Backtrace;
use std::cmp::Ordering;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("histogram needs at least one bin"))]
    EmptyBoundary { backtrace: Option<Backtrace> },
    #[snafu(display("histogram boundaries must be strictly increasing"))]
    BoundaryNotIncreasing { backtrace: Option<Backtrace> },
}

type Result<T> = std::result::Result<T, Error>;

/// Counts of values per bin.
///
/// Bin `i` covers `[bins[i], bins[i + 1])`; the last bin is open to the
/// right. Values below the first boundary (and values that do not compare,
/// such as NaN) are counted as `ignored`.
#[derive(Debug, Clone)]
pub struct Histogram<T>
where
    T: PartialOrd + Copy,
{
    bins: Vec<T>,
    counts: Vec<usize>,
    ignored: usize,
}

impl<T> Histogram<T>
where
    T: PartialOrd + Copy,
{
    pub fn new(bins: impl IntoIterator<Item = T>) -> Result<Self> {
        let bins: Vec<T> = bins.into_iter().collect();
        ensure!(!bins.is_empty(), EmptyBoundarySnafu);
        ensure!(
            bins.windows(2).all(|w| w[0] < w[1]),
            BoundaryNotIncreasingSnafu
        );
        let n = bins.len();
        Ok(Self {
            bins,
            counts: vec![0; n],
            ignored: 0,
        })
    }

    pub fn analyze(&mut self, vals: impl IntoIterator<Item = T>) {
        let min = self.bins[0];
        for val in vals {
            if !matches!(val.partial_cmp(&min), Some(Ordering::Greater | Ordering::Equal)) {
                self.ignored += 1;
                continue;
            }
            let idx = self.bins.partition_point(|x| *x <= val);
            self.counts[idx - 1] += 1;
        }
    }

    pub fn get_bins(&self) -> &[T] {
        &self.bins
    }

    pub fn get_counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn ignored(&self) -> usize {
        self.ignored
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

impl Histogram<f64> {
    /// `nbins` bins of equal width starting at `lo`; the last one starts at
    /// `hi - width` and also takes values at or above `hi`
    pub fn uniform(lo: f64, hi: f64, nbins: usize) -> Result<Self> {
        ensure!(nbins > 0, EmptyBoundarySnafu);
        let width = (hi - lo) / nbins as f64;
        Self::new((0..nbins).map(|i| lo + width * i as f64))
    }

    /// one text line per bin: `[lo, hi) count bar`
    pub fn render(&self, width: usize) -> String {
        let max = self.counts.iter().copied().max().unwrap_or(0).max(1);
        let mut s = String::new();
        for (i, (lo, n)) in self.bins.iter().zip(self.counts.iter()).enumerate() {
            let hi = match self.bins.get(i + 1) {
                Some(hi) => format!("{hi:>6.1})"),
                None => "   inf)".to_owned(),
            };
            let bar = "#".repeat(n * width / max);
            s.push_str(&format!("[{lo:>6.1},{hi} {n:>6} {bar}\n"));
        }
        s
    }
}

#[test]
fn test_histogram_basic() {
    let mut hist = Histogram::new([1, 2, 3]).unwrap();
    hist.analyze([0, 1, 1, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 4]);
    assert_eq!(hist.get_counts(), &[2, 3, 9]);
    assert_eq!(hist.ignored(), 1);
    assert_eq!(hist.total(), 14);
}

#[test]
fn test_histogram_bad_boundaries() {
    assert!(matches!(
        Histogram::<i32>::new([]),
        Err(Error::EmptyBoundary { .. })
    ));
    assert!(matches!(
        Histogram::new([3, 1, 2]),
        Err(Error::BoundaryNotIncreasing { .. })
    ));
    assert!(matches!(
        Histogram::new([1.0, f64::NAN]),
        Err(Error::BoundaryNotIncreasing { .. })
    ));
}

#[test]
fn test_uniform_percent_bins() {
    let mut hist = Histogram::uniform(0.0, 100.0, 10).unwrap();
    assert_eq!(hist.get_bins().len(), 10);
    assert_eq!(hist.get_bins()[9], 90.0);
    hist.analyze([0.0, 9.99, 10.0, 55.5, 100.0, f64::NAN, -1.0]);
    assert_eq!(hist.get_counts(), &[2, 1, 0, 0, 0, 1, 0, 0, 0, 1]);
    assert_eq!(hist.ignored(), 2);
    let text = hist.render(10);
    assert_eq!(text.lines().count(), 10);
    assert!(text.lines().next().unwrap().ends_with("2 ##########"));
    assert!(text.lines().last().unwrap().contains("inf)"));
}
