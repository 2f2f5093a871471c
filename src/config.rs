use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, Snafu};
use std::backtrace::Backtrace;
use ahash::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("cannot read config file {}", path.display()))]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Option<Backtrace>,
    },
    #[snafu(display("cannot parse config file {}", path.display()))]
    ParseConfig {
        path: PathBuf,
        source: toml::de::Error,
        backtrace: Option<Backtrace>,
    },
    #[snafu(display("no [database.{manifold}] section in config file"))]
    MissingDatabase {
        manifold: Manifold,
        backtrace: Option<Backtrace>,
    },
}

type Result<T> = std::result::Result<T, Error>;

/// Which deployment of the colony database to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Manifold {
    Dev,
    Prod,
}

impl std::fmt::Display for Manifold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Manifold::Dev => write!(f, "dev"),
            Manifold::Prod => write!(f, "prod"),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// sqlx connection url, e.g. `sqlite://colony.db`
    pub url: String,
}

/// The session type a bird must have been assayed with to be compared
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Assay {
    #[serde(default = "default_assay_cv")]
    pub cv: String,
    #[serde(rename = "type", default = "default_assay_type")]
    pub kind: String,
}

impl Default for Assay {
    fn default() -> Self {
        Self {
            cv: default_assay_cv(),
            kind: default_assay_type(),
        }
    }
}

fn default_assay_cv() -> String {
    "genotype".to_owned()
}

fn default_assay_type() -> String {
    "allelic_state".to_owned()
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MarkerConventions {
    /// genotype call meaning "not sequenced"
    #[serde(default = "default_missing_call")]
    pub missing_call: String,
    /// allele token inside a call meaning "not called"
    #[serde(default = "default_missing_allele")]
    pub missing_allele: String,
}

impl Default for MarkerConventions {
    fn default() -> Self {
        Self {
            missing_call: default_missing_call(),
            missing_allele: default_missing_allele(),
        }
    }
}

fn default_missing_call() -> String {
    "./.".to_owned()
}

fn default_missing_allele() -> String {
    ".".to_owned()
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub database: HashMap<String, DatabaseConfig>,
    #[serde(default)]
    pub assay: Assay,
    #[serde(default)]
    pub markers: MarkerConventions,
}

impl Config {
    pub fn from_toml_str(s: &str, path: impl AsRef<Path>) -> Result<Self> {
        toml::from_str(s).context(ParseConfigSnafu {
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let p = path.as_ref();
        let s = std::fs::read_to_string(p).context(ReadConfigSnafu {
            path: p.to_path_buf(),
        })?;
        Self::from_toml_str(&s, p)
    }

    pub fn database(&self, manifold: Manifold) -> Result<&DatabaseConfig> {
        self.database
            .get(&manifold.to_string())
            .context(MissingDatabaseSnafu { manifold })
    }
}

#[test]
fn test_config_defaults() {
    let s = r#"
        [database.dev]
        url = "sqlite://colony_dev.db"
    "#;
    let cfg = Config::from_toml_str(s, "inline.toml").unwrap();
    assert_eq!(cfg.database(Manifold::Dev).unwrap().url, "sqlite://colony_dev.db");
    assert!(cfg.database(Manifold::Prod).is_err());
    assert_eq!(cfg.assay, Assay::default());
    assert_eq!(cfg.markers.missing_call, "./.");
    assert_eq!(cfg.markers.missing_allele, ".");
}

#[test]
fn test_config_overrides() {
    let s = r#"
        [database.prod]
        url = "sqlite:///srv/colony.db"

        [assay]
        cv = "genotype"
        type = "snp_panel"

        [markers]
        missing_call = "N/N"
        missing_allele = "N"
    "#;
    let cfg = Config::from_toml_str(s, "inline.toml").unwrap();
    assert_eq!(cfg.assay.kind, "snp_panel");
    assert_eq!(cfg.markers.missing_call, "N/N");
    assert_eq!(cfg.markers.missing_allele, "N");
    assert!(cfg.database(Manifold::Dev).is_err());
}

#[test]
fn test_config_file() {
    let cfg = Config::from_toml_file("testdata/birdsim.toml").unwrap();
    assert!(cfg.database(Manifold::Dev).unwrap().url.starts_with("sqlite:"));
    assert!(Config::from_toml_file("testdata/does_not_exist.toml").is_err());
}
