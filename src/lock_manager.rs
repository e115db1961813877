use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex};

use crate::config::Config;
use crate::error::{DbError, DbResult};
use crate::page_id::{PageId, Permission};
use crate::transaction::TransactionId;

#[derive(Debug, Clone)]
enum Holders {
    Shared(HashSet<TransactionId>),
    Exclusive(TransactionId),
}

struct State {
    locks: HashMap<PageId, Holders>,
    held_by_tid: HashMap<TransactionId, HashSet<PageId>>,
    /// tid -> the set of tids it is currently blocked behind, rebuilt on
    /// every failed attempt so deadlock detection only ever sees live edges.
    waits_for: HashMap<TransactionId, HashSet<TransactionId>>,
}

enum Attempt {
    Granted,
    Blocked(HashSet<TransactionId>),
}

/// Page-granularity two-phase locking: shared/exclusive locks with upgrade
/// support, a wait-for graph checked by DFS before a caller blocks, and a
/// bounded timeout as a backstop for any cycle the graph missed.
pub struct LockManager {
    state: Mutex<State>,
    cond: Condvar,
    config: Config,
}

impl LockManager {
    pub fn new(config: Config) -> Self {
        LockManager {
            state: Mutex::new(State {
                locks: HashMap::new(),
                held_by_tid: HashMap::new(),
                waits_for: HashMap::new(),
            }),
            cond: Condvar::new(),
            config,
        }
    }

    fn attempt(state: &mut State, tid: TransactionId, pid: PageId, perm: Permission) -> Attempt {
        match state.locks.get(&pid).cloned() {
            None => {
                Self::grant(state, tid, pid, perm);
                Attempt::Granted
            }
            Some(Holders::Exclusive(holder)) => {
                if holder == tid {
                    Attempt::Granted
                } else {
                    Attempt::Blocked(HashSet::from([holder]))
                }
            }
            Some(Holders::Shared(set)) => match perm {
                Permission::ReadOnly => {
                    if set.contains(&tid) {
                        Attempt::Granted
                    } else {
                        Self::grant(state, tid, pid, perm);
                        Attempt::Granted
                    }
                }
                Permission::ReadWrite => {
                    let others: HashSet<_> =
                        set.iter().copied().filter(|&h| h != tid).collect();
                    if others.is_empty() {
                        state.locks.insert(pid, Holders::Exclusive(tid));
                        state.held_by_tid.entry(tid).or_default().insert(pid);
                        Attempt::Granted
                    } else {
                        Attempt::Blocked(others)
                    }
                }
            },
        }
    }

    fn grant(state: &mut State, tid: TransactionId, pid: PageId, perm: Permission) {
        match perm {
            Permission::ReadOnly => {
                state
                    .locks
                    .entry(pid)
                    .and_modify(|h| {
                        if let Holders::Shared(set) = h {
                            set.insert(tid);
                        }
                    })
                    .or_insert_with(|| Holders::Shared(HashSet::from([tid])));
            }
            Permission::ReadWrite => {
                state.locks.insert(pid, Holders::Exclusive(tid));
            }
        }
        state.held_by_tid.entry(tid).or_default().insert(pid);
    }

    fn unlock_page(state: &mut State, pid: PageId, tid: TransactionId) {
        if let Some(holders) = state.locks.get_mut(&pid) {
            let now_empty = match holders {
                Holders::Exclusive(holder) if *holder == tid => true,
                Holders::Shared(set) => {
                    set.remove(&tid);
                    set.is_empty()
                }
                _ => false,
            };
            if now_empty {
                state.locks.remove(&pid);
            }
        }
    }

    fn has_cycle(graph: &HashMap<TransactionId, HashSet<TransactionId>>, start: TransactionId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if let Some(neighbors) = graph.get(&node) {
                for &next in neighbors {
                    if next == start {
                        return true;
                    }
                    if visited.insert(next) {
                        stack.push(next);
                    }
                }
            }
        }
        false
    }

    /// Blocks until `tid` holds at least `perm` on `pid`, aborting with
    /// `TransactionAborted` if granting would create a wait-for cycle or
    /// the bounded wait budget (`Config::lock_wait_budget`) is exhausted.
    pub fn acquire(&self, tid: TransactionId, pid: PageId, perm: Permission) -> DbResult<()> {
        let mut guard = self.state.lock().unwrap();
        let mut rounds = 0u32;
        loop {
            match Self::attempt(&mut guard, tid, pid, perm) {
                Attempt::Granted => {
                    guard.waits_for.remove(&tid);
                    self.cond.notify_all();
                    return Ok(());
                }
                Attempt::Blocked(holders) => {
                    guard.waits_for.insert(tid, holders);
                    if Self::has_cycle(&guard.waits_for, tid) {
                        guard.waits_for.remove(&tid);
                        log::warn!(
                            "lock_manager: aborting {:?} to break a wait-for cycle on {:?}",
                            tid,
                            pid
                        );
                        return Err(DbError::TransactionAborted);
                    }
                    if rounds >= self.config.lock_wait_max_rounds {
                        guard.waits_for.remove(&tid);
                        log::warn!("lock_manager: {:?} timed out waiting on {:?}", tid, pid);
                        return Err(DbError::TransactionAborted);
                    }
                    let (g, result) = self
                        .cond
                        .wait_timeout(guard, self.config.lock_wait_unit)
                        .unwrap();
                    guard = g;
                    if result.timed_out() {
                        rounds += 1;
                    }
                }
            }
        }
    }

    /// Releases a single page early, outside the usual end-of-transaction
    /// release. Breaks strict two-phase locking if used mid-transaction;
    /// reserved for read-only scans that choose to release as they go.
    pub fn release(&self, tid: TransactionId, pid: PageId) {
        let mut guard = self.state.lock().unwrap();
        Self::unlock_page(&mut guard, pid, tid);
        if let Some(set) = guard.held_by_tid.get_mut(&tid) {
            set.remove(&pid);
        }
        self.cond.notify_all();
    }

    pub fn release_all(&self, tid: TransactionId) {
        let mut guard = self.state.lock().unwrap();
        if let Some(pids) = guard.held_by_tid.remove(&tid) {
            for pid in pids {
                Self::unlock_page(&mut guard, pid, tid);
            }
        }
        guard.waits_for.remove(&tid);
        self.cond.notify_all();
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> Option<Permission> {
        let guard = self.state.lock().unwrap();
        match guard.locks.get(&pid)? {
            Holders::Exclusive(holder) if *holder == tid => Some(Permission::ReadWrite),
            Holders::Shared(set) if set.contains(&tid) => Some(Permission::ReadOnly),
            _ => None,
        }
    }

    pub fn locked_pages(&self, tid: TransactionId) -> HashSet<PageId> {
        self.state
            .lock()
            .unwrap()
            .held_by_tid
            .get(&tid)
            .cloned()
            .unwrap_or_default()
    }
}
