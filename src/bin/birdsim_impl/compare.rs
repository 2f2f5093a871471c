use super::args::Commands;
use super::utils::open_store;
use birdsim::compare::{CommitPolicy, Comparator, MetricSelection, RunOptions};
use birdsim::config::Config;
use birdsim::distance::AlleleMatcher;
use birdsim::io::IntoTsv;
use birdsim::marker::MarkerTable;
use birdsim::utils::Result;
use log::*;

pub fn main_compare(args: &Commands, config: &Config) -> Result<()> {
    if let Commands::Compare {
        file,
        phenotype,
        single,
        full,
        start,
        manifold,
        write,
        commit_at_end,
        metrics,
        first_marker,
        output,
    } = args
    {
        info!("read marker file");
        let table = MarkerTable::from_tsv_file(file, phenotype, *first_marker)?;
        info!("Birds found: {}", table.len());

        let commit = match (*write, *commit_at_end) {
            (false, _) => CommitPolicy::Never,
            (true, false) => CommitPolicy::EachPair,
            (true, true) => CommitPolicy::EndOfRun,
        };
        if commit == CommitPolicy::Never {
            warn!("dry run: comparisons will not be committed (use --write)");
        }
        let opts = RunOptions {
            phenotype: phenotype.clone(),
            single: single.clone(),
            full: *full,
            start: start.clone(),
            commit,
            metrics: MetricSelection::from_kinds(metrics),
            assay: config.assay.clone(),
        };

        let mut store = open_store(config, *manifold, false)?;
        let mut comparator = Comparator::new(&mut store, opts, AlleleMatcher::new(&config.markers))?;
        let estimate = comparator.estimate(&table);
        comparator.run(&table)?;

        let counts = comparator.counts();
        print!("{}", counts.show(phenotype));
        println!("{}/{} results", counts.comparisons, estimate);
        let report = comparator.report();
        if !report.is_empty() {
            report.into_tsv(output)?;
            info!("report written to {}", output.display());
        }
        store.close()?;
    }
    Ok(())
}
