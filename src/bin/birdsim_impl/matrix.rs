use super::args::Commands;
use birdsim::config::Config;
use birdsim::distance::AlleleMatcher;
use birdsim::indiv::Individuals;
use birdsim::io::IntoTsv;
use birdsim::marker::MarkerTable;
use birdsim::matrix::SimilarityMatrix;
use birdsim::utils::Result;
use log::*;

pub fn main_matrix(args: &Commands, config: &Config) -> Result<()> {
    if let Commands::Matrix {
        file,
        phenotype,
        first_marker,
        samples,
        min_all,
        threads,
        out,
    } = args
    {
        if let Some(n) = threads {
            // fails if a global pool already exists
            if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(*n).build_global() {
                warn!("cannot set thread count: {e}");
            }
        }
        info!("read marker file");
        let table = MarkerTable::from_tsv_file(file, phenotype, *first_marker)?;
        let subset = match samples {
            Some(p) => {
                let inds = Individuals::from_txt_file(p)?;
                let known = Individuals::from_table(&table);
                for name in inds.v().iter().filter(|n| !known.contains(n)) {
                    warn!("{name} is not in the marker file");
                }
                Some(inds)
            }
            None => None,
        };
        let matcher = AlleleMatcher::new(&config.markers);
        let matrix = SimilarityMatrix::compute(&table, subset.as_ref(), &matcher, *min_all)?;
        info!("pairs kept: {}", matrix.len());
        match out {
            Some(p) => matrix.into_tsv(p)?,
            None => print!("{}", matrix.into_tsv_string()),
        }
    }
    Ok(())
}
