use birdsim::config::{Config, Manifold};
use birdsim::store::sqlite::SqliteStore;
use birdsim::utils::Result;
use log::{info, warn};
use std::path::Path;

pub fn init_logger(verbose: bool, debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter(None, level)
        .format_module_path(false)
        .init();
}

/// a missing file gives the defaults, which know no database
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        warn!("{} not found, using default configuration", path.display());
        return Ok(Config::default());
    }
    info!("read configuration {}", path.display());
    Ok(Config::from_toml_file(path)?)
}

/// connect to the database of `manifold`; `create` makes a missing file
pub fn open_store(config: &Config, manifold: Manifold, create: bool) -> Result<SqliteStore> {
    let db = config.database(manifold)?;
    info!("connecting to {manifold} database");
    Ok(SqliteStore::open(&db.url, create)?)
}
