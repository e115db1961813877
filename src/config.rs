use std::time::Duration;

/// Tunables for the storage core, passed explicitly into the types that
/// need them instead of baked in as compile-time constants. A process-wide
/// default is provided for convenience, but every end-to-end test that
/// needs a tiny page or a one-page buffer pool builds its own `Config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub page_size: usize,
    pub buffer_pool_pages: usize,
    pub lock_wait_unit: Duration,
    pub lock_wait_max_rounds: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            page_size: 4096,
            buffer_pool_pages: 50,
            lock_wait_unit: Duration::from_secs(10),
            lock_wait_max_rounds: 2,
        }
    }
}

impl Config {
    /// Total time a blocked `acquire` call may wait before the lock
    /// manager gives up and aborts it as a backstop against missed cycles.
    pub fn lock_wait_budget(&self) -> Duration {
        self.lock_wait_unit * self.lock_wait_max_rounds
    }

    /// Starts from `Default::default()` and overlays any of
    /// `HEAPCORE_PAGE_SIZE`, `HEAPCORE_BUFFER_POOL_PAGES`,
    /// `HEAPCORE_LOCK_WAIT_UNIT_MS`, `HEAPCORE_LOCK_WAIT_MAX_ROUNDS` found in
    /// the environment. Unset or unparsable variables are left at their
    /// default value. Intended for tests that want to shrink page size or
    /// buffer pool capacity without editing the test source.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Some(v) = Self::env_usize("HEAPCORE_PAGE_SIZE") {
            config.page_size = v;
        }
        if let Some(v) = Self::env_usize("HEAPCORE_BUFFER_POOL_PAGES") {
            config.buffer_pool_pages = v;
        }
        if let Some(v) = Self::env_usize("HEAPCORE_LOCK_WAIT_UNIT_MS") {
            config.lock_wait_unit = Duration::from_millis(v as u64);
        }
        if let Some(v) = Self::env_usize("HEAPCORE_LOCK_WAIT_MAX_ROUNDS") {
            config.lock_wait_max_rounds = v as u32;
        }
        config
    }

    fn env_usize(name: &str) -> Option<usize> {
        std::env::var(name).ok()?.parse().ok()
    }
}
