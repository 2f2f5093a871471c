use birdsim::compare::MetricKind;
use birdsim::config::Manifold;
use birdsim::report::REPORT_FILE;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name="birdsim", author, version, about, long_about=None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short = 'c', long, global = true, default_value = "birdsim.toml")]
    pub config: PathBuf,
    /// Chatty: log progress at info level
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,
    /// Very chatty: log at debug level
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare every pair of birds in a marker file and load new comparisons
    /// into the colony database
    Compare {
        /// Path to the tab-separated marker file
        file: PathBuf,
        /// Phenotype column (upper-cased in the file) and metric name
        #[arg(short = 'p', long, default_value = "median_tempo")]
        phenotype: String,
        /// Only compare this bird (full name) against the others
        #[arg(short = 's', long)]
        single: Option<String>,
        /// With --single, also compare against birds whose name sorts
        /// before it
        #[arg(long, default_value_t = false, requires = "single")]
        full: bool,
        /// Skip birds whose name sorts before this one as primary bird
        #[arg(long)]
        start: Option<String>,
        /// Database section of the configuration file
        #[arg(short = 'm', long, value_enum, default_value_t = Manifold::Dev)]
        manifold: Manifold,
        /// Commit comparisons to the database; without it the run is a dry run
        #[arg(short = 'w', long, default_value_t = false)]
        write: bool,
        /// With --write, commit once at the end instead of after every pair
        #[arg(long, default_value_t = false, requires = "write")]
        commit_at_end: bool,
        /// Metrics to load, comma separated
        #[arg(
            long,
            value_enum,
            value_delimiter = ',',
            default_values = ["allele_match_all", "allele_match_seq", "phenotype"]
        )]
        metrics: Vec<MetricKind>,
        /// 0-based column of the first marker; defaults to two columns after SEX
        #[arg(long)]
        first_marker: Option<usize>,
        /// Path to the report of new comparisons
        #[arg(short = 'o', long, default_value = REPORT_FILE)]
        output: PathBuf,
    },
    /// Score all pairs of a marker file without touching the database
    Matrix {
        /// Path to the tab-separated marker file
        file: PathBuf,
        /// Phenotype column of the marker file
        #[arg(short = 'p', long, default_value = "median_tempo")]
        phenotype: String,
        /// 0-based column of the first marker
        #[arg(long)]
        first_marker: Option<usize>,
        /// Path to a list of bird names (one per line) to restrict the pairs
        #[arg(short = 's', long)]
        samples: Option<PathBuf>,
        /// Drop pairs with an all-markers score below this percentage
        #[arg(long)]
        min_all: Option<f64>,
        /// Number of worker threads; all cores by default
        #[arg(short = 't', long)]
        threads: Option<usize>,
        /// Path to the output file; printed to stdout if not given
        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },
    /// Summarise phenotype difference against genotype similarity of male
    /// pairs, related and unrelated
    Relatedness {
        /// Genotype metric
        #[arg(short = 'g', long, default_value = "allele_match_seq")]
        genotype: String,
        /// Phenotype metric
        #[arg(short = 'p', long, default_value = "median_tempo")]
        phenotype: String,
        /// Database section of the configuration file
        #[arg(short = 'm', long, value_enum, default_value_t = Manifold::Dev)]
        manifold: Manifold,
        /// Prefix of the output files
        #[arg(short = 'o', long, default_value = "relatedness")]
        out_prefix: PathBuf,
    },
    /// Create the comparison tables in the configured database
    Init {
        /// Database section of the configuration file
        #[arg(short = 'm', long, value_enum, default_value_t = Manifold::Dev)]
        manifold: Manifold,
    },
}
