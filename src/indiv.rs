use crate::marker::MarkerTable;
use ahash::AHashMap;
use snafu::{ResultExt, Snafu};
use std::backtrace::Backtrace;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("cannot read bird list {}", path.display()))]
    ReadList {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Option<Backtrace>,
    },
}

type Result<T> = std::result::Result<T, Error>;

/// Bird names with their position, e.g. their row in a marker table
#[derive(Debug, Default, Clone)]
pub struct Individuals {
    vec: Vec<String>,
    map: AHashMap<String, usize>,
}

impl Individuals {
    /// one name per line; blank lines and duplicates are skipped
    pub fn from_txt_file(p: impl AsRef<Path>) -> Result<Individuals> {
        let path = p.as_ref().to_path_buf();
        let file = std::fs::File::open(&path).context(ReadListSnafu { path: path.clone() })?;
        let lines = BufReader::new(file)
            .lines()
            .collect::<std::io::Result<Vec<String>>>()
            .context(ReadListSnafu { path })?;
        Ok(Self::from_iter(
            lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()),
        ))
    }

    pub fn from_iter<'a>(it: impl Iterator<Item = &'a str> + 'a) -> Self {
        let mut v = Vec::<String>::new();
        let mut m = AHashMap::<String, usize>::new();
        for e in it {
            if m.contains_key(e) {
                continue;
            }
            m.insert(e.to_owned(), v.len());
            v.push(e.to_owned());
        }
        Self { vec: v, map: m }
    }

    /// index of the rows of `table` by full name; unnamed rows are left out
    pub fn from_table(table: &MarkerTable) -> Self {
        let mut inds = Self::default();
        for (i, r) in table.rows().iter().enumerate() {
            if r.has_name() {
                inds.map.entry(r.full_name.clone()).or_insert(i);
                inds.vec.push(r.full_name.clone());
            }
        }
        inds
    }

    pub fn v(&self) -> &[String] {
        &self.vec
    }

    pub fn m(&self) -> &AHashMap<String, usize> {
        &self.map
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.map.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }
}

#[test]
fn test_individuals_from_table() {
    let table = MarkerTable::from_tsv_file("testdata/markers.tsv", "median_tempo", None).unwrap();
    let inds = Individuals::from_table(&table);
    assert_eq!(inds.len(), 4);
    assert_eq!(inds.get("20180303_green7white9"), Some(1));
    assert!(!inds.contains("20990101_nobody"));
}

#[test]
fn test_individuals_from_txt_file() {
    use std::io::Write;
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "b\n\na\nb ").unwrap();
    let inds = Individuals::from_txt_file(f.path()).unwrap();
    assert_eq!(inds.v(), &["b", "a"]);
    assert_eq!(inds.get("a"), Some(1));
    assert!(Individuals::from_txt_file("testdata/no_such_list.txt").is_err());
}
