use std::path::Path;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;

use crate::buffer_pool::BufferPool;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{DbError, DbResult};
use crate::log_file::LogFile;

/// Wires a `Catalog`, `BufferPool`, and `LogFile` together under one
/// `Config`. Per the storage core's design, this explicit context is what
/// every operator and test should be passed; the process-wide singleton
/// below exists only so the CLI binary has something to hold onto.
pub struct Database {
    catalog: Arc<Catalog>,
    buffer_pool: Arc<BufferPool>,
    log: Arc<LogFile>,
    config: Config,
}

impl Database {
    pub fn open(data_dir: impl AsRef<Path>, config: Config) -> DbResult<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        let log = Arc::new(LogFile::open(data_dir.join("wal.log"))?);
        let catalog = Arc::new(Catalog::new());
        let buffer_pool = Arc::new(BufferPool::new(config, catalog.clone(), log.clone()));
        Ok(Database {
            catalog,
            buffer_pool,
            log,
            config,
        })
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }

    pub fn log(&self) -> &Arc<LogFile> {
        &self.log
    }

    pub fn config(&self) -> Config {
        self.config
    }
}

lazy_static! {
    static ref GLOBAL_DB: Mutex<Option<Arc<Database>>> = Mutex::new(None);
}

/// Initializes the process-wide database used by the CLI binary. Calling
/// this more than once replaces the previous instance.
pub fn init_global(data_dir: impl AsRef<Path>, config: Config) -> DbResult<Arc<Database>> {
    let db = Arc::new(Database::open(data_dir, config)?);
    *GLOBAL_DB.lock().unwrap() = Some(db.clone());
    Ok(db)
}

/// Retrieves the process-wide database. Panics if `init_global` has not
/// been called yet.
pub fn get_global_db() -> Arc<Database> {
    GLOBAL_DB
        .lock()
        .unwrap()
        .clone()
        .unwrap_or_else(|| panic!("database not initialized: call init_global first"))
}

pub fn try_get_global_db() -> DbResult<Arc<Database>> {
    GLOBAL_DB
        .lock()
        .unwrap()
        .clone()
        .ok_or_else(|| DbError::InvalidState("database not initialized".into()))
}
