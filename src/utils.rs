use snafu::prelude::*;

/// Error of any birdsim operation, as seen by the binary
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(transparent)]
    Config {
        #[snafu(backtrace)]
        source: crate::config::Error,
    },
    #[snafu(transparent)]
    Marker {
        #[snafu(backtrace)]
        source: crate::marker::Error,
    },
    #[snafu(transparent)]
    Indiv {
        #[snafu(backtrace)]
        source: crate::indiv::Error,
    },
    #[snafu(transparent)]
    Store {
        #[snafu(backtrace)]
        source: crate::store::Error,
    },
    #[snafu(transparent)]
    Compare {
        #[snafu(backtrace)]
        source: crate::compare::Error,
    },
    #[snafu(transparent)]
    Distance {
        #[snafu(backtrace)]
        source: crate::distance::Error,
    },
    #[snafu(transparent)]
    Relatedness {
        #[snafu(backtrace)]
        source: crate::relatedness::Error,
    },
    #[snafu(transparent)]
    Io {
        #[snafu(backtrace)]
        source: crate::io::Error,
    },
    #[snafu(transparent)]
    Path {
        #[snafu(backtrace)]
        source: path::Error,
    },
    #[snafu(display("cannot draw {what}: {message}"))]
    Plot {
        what: String,
        message: String,
        backtrace: Option<std::backtrace::Backtrace>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod path {
    use snafu::prelude::*;
    use std::{backtrace::Backtrace, path::*};

    type Result<T> = std::result::Result<T, Error>;

    #[derive(Debug, Snafu)]
    pub enum Error {
        #[snafu(display("cannot create directory {}", dir.display()))]
        CreateDir {
            dir: PathBuf,
            source: std::io::Error,
            backtrace: Option<Backtrace>,
        },
    }

    /// Path of an output file from a prefix and an extension.
    ///
    /// Missing parent folders are created. `suffix` may itself contain dots,
    /// e.g. `points.tsv`; the prefix keeps everything up to its last
    /// extension.
    pub fn from_prefix(prefix: impl AsRef<Path>, suffix: &str) -> Result<PathBuf> {
        if let Some(parent) = prefix.as_ref().parent() {
            if parent != Path::new("") && !parent.exists() {
                std::fs::create_dir_all(parent).context(CreateDirSnafu { dir: parent })?;
            }
        }
        let mut o = prefix.as_ref().to_path_buf();
        while o.extension().is_some() {
            o.set_extension("");
        }
        let mut name = o.file_name().map(|s| s.to_os_string()).unwrap_or_default();
        name.push(".");
        name.push(suffix);
        o.set_file_name(name);
        Ok(o)
    }

    #[test]
    fn test_from_prefix() {
        assert_eq!(
            Path::new("/tmp/1/2/x.svg"),
            from_prefix("/tmp/1/2/x.cdf", "svg").unwrap()
        );
        assert_eq!(
            Path::new("/tmp/1/2/x.points.tsv"),
            from_prefix("/tmp/1/2/x.cdf.efg", "points.tsv").unwrap()
        );
        let dir = tempfile::tempdir().unwrap();
        let p = from_prefix(dir.path().join("sub/run"), "points.tsv").unwrap();
        assert!(dir.path().join("sub").is_dir());
        assert_eq!(p, dir.path().join("sub/run.points.tsv"));
    }
}

pub mod error {
    use regex::Regex;
    use snafu::{AsErrorSource, Backtrace, ErrorCompat};

    #[derive(Debug)]
    struct Frame {
        func: String,
        file: String,
        line: u32,
    }

    fn extract_frames(bt: &Backtrace) -> Vec<Frame> {
        let bt_str = format!("{bt:?}");
        let Ok(re) = Regex::new(r#"fn: "([^"]+)", file: "([^"]+)", line: (\d+)"#) else {
            return Vec::new();
        };
        re.captures_iter(&bt_str)
            .filter_map(|cap| {
                Some(Frame {
                    func: cap.get(1)?.as_str().to_string(),
                    file: cap.get(2)?.as_str().to_string(),
                    line: cap.get(3)?.as_str().parse().ok()?,
                })
            })
            .collect()
    }

    /// print the error chain, then the backtrace frames of this crate
    pub fn show_snafu_error<E>(e: E)
    where
        E: ErrorCompat + AsErrorSource,
    {
        for (ic, c) in ErrorCompat::iter_chain(&e).enumerate() {
            if ic == 0 {
                eprintln!("ERROR");
            }
            eprintln!("{ic:>4}: {c}");
        }
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("BACKTRACE");
            let frames = extract_frames(bt).into_iter().filter(|f| {
                !(f.file.contains("/rustc/")
                    || f.file.contains("crates.io")
                    || f.file.contains("toolchains")
                    || f.func.contains("as snafu::IntoError"))
            });
            for (iframe, frame) in frames.enumerate() {
                eprintln!("{iframe:>4}: {}\n        {}:{}", frame.func, frame.file, frame.line);
            }
        }
    }
}
