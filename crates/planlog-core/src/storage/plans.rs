//! Plan record store
//!
//! Maps plan ids to serialized plans inside caller-supplied transactions and
//! keeps an approximate live count that drives the retention trigger.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tracing::{debug, info};

use super::cursor::{key_of, Cursor};
use super::database::SharedDatabase;
use crate::config::PlanStoreConfig;
use crate::constants::storage::PLANS_TABLE;
use crate::error::{Error, Result};
use crate::host::PlanHost;
use crate::plan::Plan;
use crate::retention::{PruneObserver, PrunerHandle};

/// State shared between the store and its pruning thread
pub(crate) struct StoreShared {
    pub(crate) db: SharedDatabase,
    pub(crate) config: PlanStoreConfig,
    pub(crate) host: Arc<dyn PlanHost>,
    pub(crate) observer: Option<Arc<dyn PruneObserver>>,
    /// Approximate live record count, exact only right after reconciliation
    pub(crate) estimate: AtomicI64,
    /// Highest plan id written so far
    high_water: AtomicU64,
    pub(crate) closed: AtomicBool,
    pub(crate) latest_pruning: Mutex<Option<String>>,
}

impl StoreShared {
    /// Exact record count by scanning the table
    pub(crate) fn count(&self) -> Result<u64> {
        let db = self.db.lock();
        count_rows(db.conn())
    }
}

fn count_rows(conn: &Connection) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", PLANS_TABLE);
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

fn max_key(conn: &Connection) -> Result<u64> {
    let sql = format!("SELECT COALESCE(MAX(id), 0) FROM {}", PLANS_TABLE);
    let max: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(max.max(0) as u64)
}

/// Durable, size-bounded store of plans
///
/// Foreground operations run on the caller's thread inside the caller's
/// transaction. Writes of new ids may start one background pruning run.
pub struct PlanStore {
    pub(crate) shared: Arc<StoreShared>,
    /// Current pruning thread, if one was started
    pub(crate) pruner: Mutex<Option<PrunerHandle>>,
}

impl std::fmt::Debug for PlanStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanStore").finish_non_exhaustive()
    }
}

impl PlanStore {
    /// Open a store over a migrated database
    pub fn open(
        db: SharedDatabase,
        config: PlanStoreConfig,
        host: Arc<dyn PlanHost>,
    ) -> Result<Self> {
        Self::open_with_observer(db, config, host, None)
    }

    /// Open a store with hooks invoked around each pruning run
    pub fn open_with_observer(
        db: SharedDatabase,
        config: PlanStoreConfig,
        host: Arc<dyn PlanHost>,
        observer: Option<Arc<dyn PruneObserver>>,
    ) -> Result<Self> {
        config.validate()?;

        let (count, high_water) = {
            let guard = db.lock();
            (count_rows(guard.conn())?, max_key(guard.conn())?)
        };
        info!(
            "Opened plan store: {} plans, highest id {}, limit {}",
            count, high_water, config.plan_limit
        );

        Ok(Self {
            shared: Arc::new(StoreShared {
                db,
                config,
                host,
                observer,
                estimate: AtomicI64::new(count as i64),
                high_water: AtomicU64::new(high_water),
                closed: AtomicBool::new(false),
                latest_pruning: Mutex::new(None),
            }),
            pruner: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &PlanStoreConfig {
        &self.shared.config
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Run `f` in a transaction: commit on `Ok`, roll back on `Err`
    ///
    /// The database stays locked for the duration, so `f` must not call
    /// methods that lock it again (`count`, `actual_num_plans`,
    /// `with_transaction`). `count_in` counts through `txn` instead.
    pub fn with_transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        self.ensure_open()?;
        let mut db = self.shared.db.lock();
        let txn = db.conn_mut().transaction()?;
        let value = f(&txn)?;
        txn.commit()?;
        Ok(value)
    }

    /// Write `plan` under its id, replacing any previous record
    ///
    /// Holding `&Plan` for the whole call keeps the serialized record
    /// consistent. A write of a new highest id bumps the live-count
    /// estimate and may start a pruning run without waiting for it.
    pub fn put(&self, txn: &Connection, plan: &Plan) -> Result<()> {
        self.ensure_open()?;
        let key = key_of(plan.id)?;
        let data = plan.encode()?;

        let sql = format!(
            "INSERT INTO {} (id, data) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data",
            PLANS_TABLE
        );
        txn.prepare_cached(&sql)?.execute(params![key, data])?;

        self.note_write(plan.id);
        Ok(())
    }

    fn note_write(&self, id: u64) {
        let previous = self.shared.high_water.fetch_max(id, Ordering::SeqCst);
        if id <= previous {
            return;
        }

        let estimate = self.shared.estimate.fetch_add(1, Ordering::SeqCst) + 1;
        if estimate > self.shared.config.prune_trigger() as i64 && self.start_pruning() {
            debug!(
                "Plan estimate {} exceeds trigger {}, pruning started",
                estimate,
                self.shared.config.prune_trigger()
            );
        }
    }

    /// Read a plan by id
    pub fn get(&self, txn: &Connection, id: u64) -> Result<Option<Plan>> {
        self.ensure_open()?;
        let Ok(key) = key_of(id) else {
            return Ok(None);
        };

        let sql = format!("SELECT data FROM {} WHERE id = ?1", PLANS_TABLE);
        let data: Option<Vec<u8>> = txn
            .prepare_cached(&sql)?
            .query_row([key], |row| row.get(0))
            .optional()?;

        data.map(|bytes| Plan::decode(&bytes)).transpose()
    }

    /// Open a cursor over plans, starting at `start_id` when given
    pub fn plan_cursor<'t>(&self, txn: &'t Connection, start_id: Option<u64>) -> Cursor<'t, Plan> {
        Cursor::open(txn, PLANS_TABLE, Plan::decode, start_id)
    }

    /// Exact number of stored plans
    ///
    /// Scans the table under the database lock; meant for diagnostics and
    /// reconciliation, not the write path. The lock is not reentrant, so
    /// inside `with_transaction` use [`count_in`](Self::count_in) instead.
    pub fn count(&self) -> Result<u64> {
        self.ensure_open()?;
        self.shared.count()
    }

    /// Exact number of stored plans as seen by `txn`
    pub fn count_in(&self, txn: &Connection) -> Result<u64> {
        self.ensure_open()?;
        count_rows(txn)
    }

    /// Live-count estimate maintained by writes and pruning
    pub fn cached_num_plans(&self) -> u64 {
        self.shared.estimate.load(Ordering::SeqCst).max(0) as u64
    }

    /// Exact live count
    ///
    /// Takes the database lock like `count`; never call it from inside
    /// `with_transaction`.
    pub fn actual_num_plans(&self) -> Result<u64> {
        self.count()
    }

    /// Summary of the most recent finished pruning run
    pub fn latest_pruning_info(&self) -> Option<String> {
        self.shared.latest_pruning.lock().clone()
    }

    /// Mark the store closed and stop any pruning run
    ///
    /// Waits up to `shutdown_wait_ms` for the run to notice. Calling it
    /// again does nothing. The connection is released once the last handle
    /// to the database is dropped.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Closing plan store");
        self.stop_pruning(self.shared.config.shutdown_wait());
    }
}

impl Drop for PlanStore {
    fn drop(&mut self) {
        self.close();
    }
}
