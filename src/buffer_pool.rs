use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rand::Rng;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::DbResult;
use crate::heap_page::HeapPage;
use crate::lock_manager::LockManager;
use crate::log_file::LogFile;
use crate::page_id::{PageId, Permission};
use crate::transaction::TransactionId;
use crate::tuple::Tuple;

/// The shared, bounded cache of pages that every access to the storage
/// layer goes through. Implements STEAL (a dirty page may reach disk
/// before its transaction commits, as long as its WAL record is forced
/// first) and NO-FORCE is not assumed the other way: commit flushes every
/// page the transaction touched rather than relying on a prior steal.
/// Eviction picks a random resident page, per the data model's policy.
pub struct BufferPool {
    cache: RwLock<HashMap<PageId, Arc<RwLock<HeapPage>>>>,
    lock_manager: LockManager,
    catalog: Arc<Catalog>,
    log: Arc<LogFile>,
    config: Config,
}

impl BufferPool {
    pub fn new(config: Config, catalog: Arc<Catalog>, log: Arc<LogFile>) -> Self {
        BufferPool {
            cache: RwLock::new(HashMap::new()),
            lock_manager: LockManager::new(config),
            catalog,
            log,
            config,
        }
    }

    pub fn capacity(&self) -> usize {
        self.config.buffer_pool_pages
    }

    pub fn resident_pages(&self) -> usize {
        self.cache.read().unwrap().len()
    }

    /// Acquires `perm` on `pid` and returns the cached page, loading it
    /// from disk (evicting a random resident page first if the pool is
    /// full) on a cache miss.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permission,
    ) -> DbResult<Arc<RwLock<HeapPage>>> {
        self.lock_manager.acquire(tid, pid, perm)?;

        if let Some(page) = self.cache.read().unwrap().get(&pid) {
            return Ok(page.clone());
        }

        let mut cache = self.cache.write().unwrap();
        if let Some(page) = cache.get(&pid) {
            return Ok(page.clone());
        }
        if cache.len() >= self.config.buffer_pool_pages {
            self.evict_one(&mut cache)?;
        }
        let heap_file = self.catalog.heap_file(pid.table_id())?;
        let page = heap_file.read_page(&pid)?;
        let arc = Arc::new(RwLock::new(page));
        cache.insert(pid, arc.clone());
        Ok(arc)
    }

    fn evict_one(&self, cache: &mut HashMap<PageId, Arc<RwLock<HeapPage>>>) -> DbResult<()> {
        let keys: Vec<PageId> = cache.keys().copied().collect();
        if keys.is_empty() {
            return Err(crate::error::DbError::NoEvictable);
        }
        let victim = keys[rand::rng().random_range(0..keys.len())];
        let page_arc = cache.get(&victim).unwrap().clone();
        {
            let mut page = page_arc.write().unwrap();
            self.flush_locked(victim, &mut page)?;
        }
        cache.remove(&victim);
        log::debug!("buffer_pool: evicted {:?}", victim);
        Ok(())
    }

    /// Writes a dirty page's WAL record, forces it, then writes the page.
    /// A no-op if the page isn't dirty.
    fn flush_locked(&self, pid: PageId, page: &mut HeapPage) -> DbResult<()> {
        let Some(tid) = page.is_dirty() else {
            return Ok(());
        };
        let heap_file = self.catalog.heap_file(pid.table_id())?;
        let before = page.before_image_bytes().to_vec();
        let after = page.serialize();
        self.log.log_write(tid, pid, before, after)?;
        self.log.force()?;
        heap_file.write_page(page)?;
        page.mark_dirty(false, tid);
        page.set_before_image();
        Ok(())
    }

    pub fn flush_page(&self, pid: PageId) -> DbResult<()> {
        if let Some(page_arc) = self.cache.read().unwrap().get(&pid).cloned() {
            let mut page = page_arc.write().unwrap();
            self.flush_locked(pid, &mut page)?;
        }
        Ok(())
    }

    pub fn flush_pages(&self, tid: TransactionId) -> DbResult<()> {
        for pid in self.lock_manager.locked_pages(tid) {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    pub fn flush_all_pages(&self) -> DbResult<()> {
        let pids: Vec<PageId> = self.cache.read().unwrap().keys().copied().collect();
        for pid in pids {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    pub fn discard_page(&self, pid: PageId) {
        self.cache.write().unwrap().remove(&pid);
    }

    pub fn release_page(&self, tid: TransactionId, pid: PageId) {
        self.lock_manager.release(tid, pid);
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> Option<Permission> {
        self.lock_manager.holds_lock(tid, pid)
    }

    fn mark_touched_dirty(&self, tid: TransactionId, pids: &[PageId]) {
        let cache = self.cache.read().unwrap();
        for pid in pids {
            if let Some(page) = cache.get(pid) {
                page.write().unwrap().mark_dirty(true, tid);
            }
        }
    }

    pub fn insert_tuple(&self, tid: TransactionId, table_id: i64, tuple: Tuple) -> DbResult<()> {
        let heap_file = self.catalog.heap_file(table_id)?;
        let touched = heap_file.insert_tuple(tid, tuple, self)?;
        self.mark_touched_dirty(tid, &touched);
        Ok(())
    }

    pub fn delete_tuple(&self, tid: TransactionId, table_id: i64, tuple: &mut Tuple) -> DbResult<()> {
        let heap_file = self.catalog.heap_file(table_id)?;
        let pid = heap_file.delete_tuple(tid, tuple, self)?;
        self.mark_touched_dirty(tid, &[pid]);
        Ok(())
    }

    /// Commits or aborts `tid`: on commit, flushes every page it dirtied
    /// (after forcing the WAL) before releasing its locks; on abort,
    /// restores each dirtied page to its before-image instead.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> DbResult<()> {
        let pids = self.lock_manager.locked_pages(tid);
        if commit {
            for pid in &pids {
                self.flush_page(*pid)?;
            }
        } else {
            for pid in &pids {
                if let Some(page_arc) = self.cache.read().unwrap().get(pid).cloned() {
                    let mut page = page_arc.write().unwrap();
                    if page.is_dirty().is_some() {
                        *page = page.before_image();
                        page.mark_dirty(false, tid);
                    }
                }
            }
        }
        self.lock_manager.release_all(tid);
        log::debug!(
            "buffer_pool: {:?} {} touching {} pages",
            tid,
            if commit { "committed" } else { "aborted" },
            pids.len()
        );
        Ok(())
    }
}
