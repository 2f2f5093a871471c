use snafu::{ResultExt, Snafu};
use std::backtrace::Backtrace;
use std::path::{Path, PathBuf};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("cannot write {}", path.display()))]
    WriteTsv {
        path: PathBuf,
        source: csv::Error,
        backtrace: Option<Backtrace>,
    },
    #[snafu(display("cannot flush {}", path.display()))]
    Flush {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Option<Backtrace>,
    },
}

type Result<T> = std::result::Result<T, Error>;

/// Tables that can be written as tab-separated text with a header line
pub trait IntoTsv {
    fn header(&self) -> Vec<String>;

    fn write_rows<W: std::io::Write>(&self, w: &mut csv::Writer<W>) -> csv::Result<()>;

    fn into_tsv_writer<W: std::io::Write>(&self, w: W) -> csv::Result<csv::Writer<W>> {
        let mut w = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(w);
        w.write_record(self.header())?;
        self.write_rows(&mut w)?;
        Ok(w)
    }

    fn into_tsv(&self, p: impl AsRef<Path>) -> Result<()> {
        let path = p.as_ref().to_path_buf();
        let file = std::fs::File::create(&path)
            .map_err(csv::Error::from)
            .context(WriteTsvSnafu { path: path.clone() })?;
        let mut w = self
            .into_tsv_writer(std::io::BufWriter::new(file))
            .context(WriteTsvSnafu { path: path.clone() })?;
        w.flush().context(FlushSnafu { path })
    }

    fn into_tsv_string(&self) -> String {
        // writes into a Vec<u8> do not fail
        match self
            .into_tsv_writer(Vec::new())
            .map(|w| w.into_inner().map_err(|e| e.into_error()))
        {
            Ok(Ok(buf)) => String::from_utf8_lossy(&buf).into_owned(),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
struct Pairs(Vec<(&'static str, &'static str)>);

#[cfg(test)]
impl IntoTsv for Pairs {
    fn header(&self) -> Vec<String> {
        vec!["Bird1".into(), "Bird2".into()]
    }
    fn write_rows<W: std::io::Write>(&self, w: &mut csv::Writer<W>) -> csv::Result<()> {
        for (a, b) in &self.0 {
            w.write_record([a, b])?;
        }
        Ok(())
    }
}

#[test]
fn test_tsv_string_and_file() {
    let p = Pairs(vec![("a", "b"), ("c", "d")]);
    assert_eq!(p.into_tsv_string(), "Bird1\tBird2\na\tb\nc\td\n");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pairs.tsv");
    p.into_tsv(&path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), p.into_tsv_string());
    assert!(p.into_tsv(dir.path().join("missing_dir/pairs.tsv")).is_err());
}
