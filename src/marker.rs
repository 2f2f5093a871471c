use snafu::{ensure, OptionExt, ResultExt, Snafu};
use std::backtrace::Backtrace;
use std::path::{Path, PathBuf};

pub const BIRD_COL: &str = "IND_ID";
pub const NAME_COL: &str = "IND_NAME";
pub const SEX_COL: &str = "SEX";

/// Phenotype values meaning "not measured"
const PHENOTYPE_PLACEHOLDERS: [&str; 2] = [".", "-"];

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("cannot read marker file {}", path.display()))]
    Csv {
        path: PathBuf,
        source: csv::Error,
        backtrace: Option<Backtrace>,
    },
    #[snafu(display("column {column} not found in {}", path.display()))]
    MissingColumn {
        path: PathBuf,
        column: String,
        backtrace: Option<Backtrace>,
    },
    #[snafu(display("invalid IND_ID '{value}' at line {line} of {}", path.display()))]
    InvalidBirdId {
        path: PathBuf,
        line: u64,
        value: String,
        source: std::num::ParseIntError,
        backtrace: Option<Backtrace>,
    },
    #[snafu(display("first marker column {first_marker} is beyond the {ncols} columns of the table"))]
    NoMarkers {
        first_marker: usize,
        ncols: usize,
        backtrace: Option<Backtrace>,
    },
    #[snafu(display("marker table layout has no marker columns"))]
    EmptyLayout { backtrace: Option<Backtrace> },
    #[snafu(display("row for '{name}' has {found} markers, table layout has {expected}"))]
    RaggedRow {
        name: String,
        expected: usize,
        found: usize,
        backtrace: Option<Backtrace>,
    },
}

type Result<T> = std::result::Result<T, Error>;

/// One bird's line of the genotype/phenotype extract
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerRow {
    pub individual_id: i64,
    /// display identity, e.g. `20190412_red12yellow3`; empty means the
    /// bird could not be matched to the colony database
    pub full_name: String,
    pub sex: String,
    pub phenotype: Option<String>,
    pub markers: Vec<String>,
}

impl MarkerRow {
    /// phenotype as a number, if it is present, not a placeholder and parses
    /// to a finite value
    pub fn phenotype_value(&self) -> Option<f64> {
        let p = self.phenotype.as_deref()?.trim();
        if p.is_empty() || PHENOTYPE_PLACEHOLDERS.contains(&p) {
            return None;
        }
        p.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// phenotype as it should appear in the report
    pub fn phenotype_label(&self) -> &str {
        match self.phenotype.as_deref() {
            Some(p) if !p.trim().is_empty() => p,
            _ => "-",
        }
    }

    pub fn has_name(&self) -> bool {
        !self.full_name.trim().is_empty()
    }
}

/// Marker rows sharing one column layout, sorted by full name
#[derive(Debug, Clone)]
pub struct MarkerTable {
    marker_names: Vec<String>,
    rows: Vec<MarkerRow>,
}

impl MarkerTable {
    /// Build a table from rows; rows are sorted by full name and must all
    /// carry `marker_names.len()` markers.
    pub fn from_rows(marker_names: Vec<String>, mut rows: Vec<MarkerRow>) -> Result<Self> {
        ensure!(!marker_names.is_empty(), EmptyLayoutSnafu);
        for r in rows.iter() {
            ensure!(
                r.markers.len() == marker_names.len(),
                RaggedRowSnafu {
                    name: r.full_name.clone(),
                    expected: marker_names.len(),
                    found: r.markers.len(),
                }
            );
        }
        rows.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(Self { marker_names, rows })
    }

    /// Read a tab-separated extract.
    ///
    /// The phenotype column is `phenotype` upper-cased. Markers start at
    /// `first_marker` (0-based column index) or, when not given, two columns
    /// after `SEX` as in the colony exports (`SEX`, phenotype, markers...).
    pub fn from_tsv_file(
        p: impl AsRef<Path>,
        phenotype: &str,
        first_marker: Option<usize>,
    ) -> Result<Self> {
        let path = p.as_ref().to_path_buf();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_path(&path)
            .context(CsvSnafu { path: path.clone() })?;

        let header: Vec<String> = reader
            .headers()
            .context(CsvSnafu { path: path.clone() })?
            .iter()
            .map(|s| s.trim().to_owned())
            .collect();
        let find = |column: &str| {
            header
                .iter()
                .position(|h| h == column)
                .context(MissingColumnSnafu {
                    path: path.clone(),
                    column: column.to_owned(),
                })
        };
        let id_col = find(BIRD_COL)?;
        let name_col = find(NAME_COL)?;
        let sex_col = find(SEX_COL)?;
        let phen_col = find(phenotype.to_uppercase().as_str())?;
        let first_marker = first_marker.unwrap_or(sex_col + 2);
        ensure!(
            first_marker < header.len(),
            NoMarkersSnafu {
                first_marker,
                ncols: header.len(),
            }
        );
        let marker_names = header[first_marker..].to_vec();

        let mut rows = Vec::new();
        for rec in reader.records() {
            let rec = rec.context(CsvSnafu { path: path.clone() })?;
            let line = rec.position().map(|p| p.line()).unwrap_or(0);
            let id_str = rec.get(id_col).unwrap_or("").trim();
            let individual_id = id_str.parse::<i64>().context(InvalidBirdIdSnafu {
                path: path.clone(),
                line,
                value: id_str.to_owned(),
            })?;
            let phenotype = rec
                .get(phen_col)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned);
            rows.push(MarkerRow {
                individual_id,
                full_name: rec.get(name_col).unwrap_or("").trim().to_owned(),
                sex: rec.get(sex_col).unwrap_or("").trim().to_owned(),
                phenotype,
                markers: rec.iter().skip(first_marker).map(|s| s.trim().to_owned()).collect(),
            });
        }
        log::info!(
            "{}: {} birds, {} markers",
            path.display(),
            rows.len(),
            marker_names.len()
        );
        Self::from_rows(marker_names, rows)
    }

    pub fn rows(&self) -> &[MarkerRow] {
        &self.rows
    }

    pub fn marker_names(&self) -> &[String] {
        &self.marker_names
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn row(id: i64, name: &str, phenotype: Option<&str>, markers: &[&str]) -> MarkerRow {
    MarkerRow {
        individual_id: id,
        full_name: name.to_owned(),
        sex: "M".to_owned(),
        phenotype: phenotype.map(str::to_owned),
        markers: markers.iter().map(|s| s.to_string()).collect(),
    }
}

#[test]
fn test_read_marker_file() {
    let table = MarkerTable::from_tsv_file("testdata/markers.tsv", "median_tempo", None).unwrap();
    assert_eq!(table.len(), 4);
    assert_eq!(table.marker_names(), &["m2", "m3", "m4", "m5"]);
    // sorted by full name, not by file order or id
    let names: Vec<_> = table.rows().iter().map(|r| r.full_name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "20180101_blue1green2",
            "20180303_green7white9",
            "20190412_red12yellow3",
            "20200620_orange4pink5"
        ]
    );
    let first = &table.rows()[0];
    assert_eq!(first.individual_id, 1);
    assert_eq!(first.markers, vec!["C/G", "C/T", "C/C", "A/G"]);
    assert_eq!(first.phenotype_value(), Some(4.5));
    // "." placeholder and empty cell
    assert_eq!(table.rows()[1].phenotype_value(), None);
    assert_eq!(table.rows()[3].phenotype, None);
    assert_eq!(table.rows()[3].phenotype_label(), "-");
}

#[test]
fn test_read_marker_file_missing_phenotype_column() {
    let res = MarkerTable::from_tsv_file("testdata/markers.tsv", "song_length", None);
    assert!(matches!(res, Err(Error::MissingColumn { .. })));
}

#[test]
fn test_read_marker_file_explicit_offset() {
    let table = MarkerTable::from_tsv_file("testdata/markers.tsv", "median_tempo", Some(6)).unwrap();
    assert_eq!(table.marker_names(), &["m4", "m5"]);
    assert!(MarkerTable::from_tsv_file("testdata/markers.tsv", "median_tempo", Some(8)).is_err());
}

#[test]
fn test_invalid_bird_id() {
    use std::io::Write;
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "IND_ID\tIND_NAME\tSEX\tMEDIAN_TEMPO\tm1").unwrap();
    writeln!(f, "x7\tbird\tM\t1.0\tA/A").unwrap();
    let res = MarkerTable::from_tsv_file(f.path(), "median_tempo", None);
    assert!(matches!(res, Err(Error::InvalidBirdId { .. })));
}

#[test]
fn test_phenotype_value() {
    assert_eq!(row(1, "a", Some("6.5"), &["A/A"]).phenotype_value(), Some(6.5));
    assert_eq!(row(1, "a", Some("-"), &["A/A"]).phenotype_value(), None);
    assert_eq!(row(1, "a", Some("fast"), &["A/A"]).phenotype_value(), None);
    assert_eq!(row(1, "a", None, &["A/A"]).phenotype_value(), None);
    for p in ["NaN", "nan", "inf", "-inf"] {
        assert_eq!(row(1, "a", Some(p), &["A/A"]).phenotype_value(), None, "{p}");
    }
}

#[test]
fn test_empty_layout_rejected() {
    let e = MarkerTable::from_rows(vec![], vec![row(1, "a", None, &[])]).unwrap_err();
    assert!(matches!(e, Error::EmptyLayout { .. }));
    assert_eq!(e.to_string(), "marker table layout has no marker columns");
}

#[test]
fn test_ragged_rows_rejected() {
    let names = vec!["m1".to_owned(), "m2".to_owned()];
    let rows = vec![row(1, "a", None, &["A/A", "C/C"]), row(2, "b", None, &["A/A"])];
    assert!(matches!(
        MarkerTable::from_rows(names, rows),
        Err(Error::RaggedRow { .. })
    ));
}
