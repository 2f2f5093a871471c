use crate::distance::SeqMatch;
use crate::io::IntoTsv;

pub const REPORT_FILE: &str = "analysis_results.tsv";

/// Run counters, printed at the end of a comparator run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counts {
    /// pairs skipped by the single-subject forward-only rule
    pub skipped: usize,
    pub potential: usize,
    pub present: usize,
    pub removed: usize,
    pub comparisons: usize,
    pub allele_match_all: usize,
    pub allele_match_seq: usize,
    pub phenotype: usize,
    pub no_sequenced: usize,
    pub failed: usize,
}

impl Counts {
    pub fn show(&self, phenotype: &str) -> String {
        let rows = [
            ("Comparisons skipped:", self.skipped),
            ("Potential comparisons:", self.potential),
            ("Comparisons already present:", self.present),
            ("Comparisons removed:", self.removed),
            ("Comparisons made:", self.comparisons),
            ("allele_match_all:", self.allele_match_all),
            ("allele_match_seq:", self.allele_match_seq),
            ("No sequenced markers:", self.no_sequenced),
            ("Failed inserts:", self.failed),
        ];
        let mut s = String::new();
        for (label, n) in rows {
            s.push_str(&format!("{label:<29}{n}\n"));
        }
        s.push_str(&format!("{:<29}{}\n", format!("{phenotype}:"), self.phenotype));
        s
    }
}

/// One novel comparison, as reported in the results file
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    pub bird1: String,
    pub bird2: String,
    pub phenotype1: String,
    pub phenotype2: String,
    pub all: f64,
    pub seq: SeqMatch,
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Report {
    lines: Vec<ReportLine>,
}

impl Report {
    pub fn push(&mut self, line: ReportLine) {
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[ReportLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl IntoTsv for Report {
    fn header(&self) -> Vec<String> {
        [
            "Bird1",
            "Bird2",
            "Phenotype1",
            "Phenotype2",
            "AllMarkers",
            "SequencedMarkers",
            "Relationship",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn write_rows<W: std::io::Write>(&self, w: &mut csv::Writer<W>) -> csv::Result<()> {
        for l in &self.lines {
            let all = format!("{:.2}%", l.all);
            let seq = l.seq.to_string();
            w.write_record([
                l.bird1.as_str(),
                l.bird2.as_str(),
                l.phenotype1.as_str(),
                l.phenotype2.as_str(),
                all.as_str(),
                seq.as_str(),
                l.relationship.as_deref().unwrap_or(""),
            ])?;
        }
        Ok(())
    }
}

#[test]
fn test_report_tsv() {
    let mut r = Report::default();
    r.push(ReportLine {
        bird1: "a".into(),
        bird2: "b".into(),
        phenotype1: "6.5".into(),
        phenotype2: "-".into(),
        all: 62.5,
        seq: SeqMatch::Percent(100.0 / 3.0),
        relationship: Some("sibling".into()),
    });
    r.push(ReportLine {
        bird1: "a".into(),
        bird2: "c".into(),
        phenotype1: "6.5".into(),
        phenotype2: "4.5".into(),
        all: 0.0,
        seq: SeqMatch::NoSequencedMarkers,
        relationship: None,
    });
    assert_eq!(
        r.into_tsv_string(),
        "Bird1\tBird2\tPhenotype1\tPhenotype2\tAllMarkers\tSequencedMarkers\tRelationship\n\
         a\tb\t6.5\t-\t62.50%\t33.33%\tsibling\n\
         a\tc\t6.5\t4.5\t0.00%\tNA\t\n"
    );
}

#[test]
fn test_counts_show() {
    let c = Counts {
        comparisons: 3,
        phenotype: 1,
        ..Default::default()
    };
    let s = c.show("median_tempo");
    assert!(s.contains("Comparisons made:            3\n"));
    assert!(s.ends_with("median_tempo:                1\n"));
}
