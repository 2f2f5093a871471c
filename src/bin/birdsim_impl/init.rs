use super::args::Commands;
use super::utils::open_store;
use birdsim::config::Config;
use birdsim::utils::Result;

pub fn main_init(args: &Commands, config: &Config) -> Result<()> {
    if let Commands::Init { manifold } = args {
        let mut store = open_store(config, *manifold, true)?;
        store.init_schema()?;
        store.close()?;
        eprintln!("schema ready in {manifold} database");
    }
    Ok(())
}
