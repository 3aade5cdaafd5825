//! Batch-then-fallback push orchestration.

use crate::remote::{RemoteError, RemoteTableWriter};
use crate::report::{PushFailure, PushReport};
use chrono::{DateTime, Utc};
use hearth_core::{EntityTable, IdentityProvider, InFlightRegistry, EVENT_VERSION};
use hearth_store::{queries, Store, StoreResult};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use sync_error_classifier::{self as classifier, SyncError};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Capacity of the notification queue.
const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Configuration for push batching and retry behavior.
///
/// Retry delay follows binary exponential backoff: `base * 2^(n-1)` capped
/// at `backoff_max`. Once a table's cursor exceeds `max_retries` the sweep
/// skips it until a success resets the count.
#[derive(Debug, Clone)]
pub struct PushWorkerConfig {
    /// Maximum rows pushed per table per sweep.
    pub batch_size: usize,
    /// How often the background loop sweeps for pending rows.
    pub flush_interval: Duration,
    /// Base duration for exponential backoff on retries.
    pub backoff_base: Duration,
    /// Cap for the backoff delay.
    pub backoff_max: Duration,
    /// Retries before a table's sweep is abandoned until the next success.
    pub max_retries: i32,
}

impl Default for PushWorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            flush_interval: Duration::from_millis(500),
            backoff_base: Duration::from_secs(2),
            backoff_max: Duration::from_secs(300),
            max_retries: 20,
        }
    }
}

/// Classify a remote endpoint error into the sync taxonomy.
pub fn classify_remote(err: &RemoteError, table: EntityTable) -> SyncError {
    match err {
        RemoteError::Http(e) => classifier::classify_transport(e),
        RemoteError::Api { status, .. } => classifier::classify_status(*status, Some(table.as_str())),
        RemoteError::Json(e) => classifier::classify_encode(e, table),
        RemoteError::Config(message) => SyncError::Unknown(message.clone()),
    }
}

/// Pushes locally pending rows to the remote store.
///
/// One sweep handles one table at a time: bulk upsert first, strictly
/// sequential per-row fallback when the bulk call fails. Sequential matters
/// - it keeps the in-flight bookkeeping deterministic and avoids two
/// interleaved partial writes for the same table. Different tables may be
/// swept concurrently by independent callers; the store serializes the
/// actual row writes either way.
pub struct PushWorker<R> {
    config: PushWorkerConfig,
    store: Store,
    remote: Arc<R>,
    identity: Arc<dyn IdentityProvider>,
    inflight: InFlightRegistry,
    sender: mpsc::Sender<EntityTable>,
    receiver: Mutex<Option<mpsc::Receiver<EntityTable>>>,
}

impl<R: RemoteTableWriter + 'static> PushWorker<R> {
    pub fn new(
        config: PushWorkerConfig,
        store: Store,
        remote: Arc<R>,
        identity: Arc<dyn IdentityProvider>,
        inflight: InFlightRegistry,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(DEFAULT_QUEUE_CAPACITY);
        Self {
            config,
            store,
            remote,
            identity,
            inflight,
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Nudge the background loop: a table has fresh local edits.
    ///
    /// Purely advisory - the sweep reads the store, so a dropped
    /// notification only delays a push until the next tick.
    pub fn notify(&self, table: EntityTable) {
        if let Err(err) = self.sender.try_send(table) {
            debug!(error = %err, "Push notification dropped");
        }
    }

    /// Starts the background sweep loop.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn start(self: &Arc<Self>) {
        let mut receiver = self
            .receiver
            .lock()
            .expect("lock poisoned")
            .take()
            .expect("PushWorker already started");

        let worker = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(worker.config.flush_interval);
            let mut nudged: HashSet<EntityTable> = HashSet::new();

            loop {
                tokio::select! {
                    maybe_table = receiver.recv() => {
                        match maybe_table {
                            Some(table) => {
                                nudged.insert(table);
                            }
                            None => break,
                        }
                    }
                    _ = ticker.tick() => {
                        nudged.clear();
                        worker.sweep_all().await;
                    }
                }
            }
            debug!("Push worker stopped (channel closed)");
        });
    }

    /// Sweep every table once, honoring per-table backoff.
    pub async fn sweep_all(&self) {
        let now = Utc::now();
        for table in EntityTable::ALL {
            let cursor = match self
                .store
                .call(move |conn| queries::get_push_cursor(conn, table))
                .await
            {
                Ok(cursor) => cursor,
                Err(err) => {
                    warn!(table = %table, error = %err, "Failed to read push cursor");
                    continue;
                }
            };

            if let Some(cursor) = &cursor {
                if cursor.retry_count > self.config.max_retries {
                    debug!(
                        table = %table,
                        retry_count = cursor.retry_count,
                        max_retries = self.config.max_retries,
                        "Skipping push sweep (max retries exceeded)"
                    );
                    continue;
                }
                if !is_due(cursor.last_attempt_at, cursor.retry_count, now, &self.config) {
                    continue;
                }
            }

            match self.push_pending(table).await {
                Ok(report) if report.attempted > 0 => {
                    info!(
                        table = %table,
                        attempted = report.attempted,
                        succeeded = report.success_count,
                        failed = report.failure_count,
                        "Push sweep finished"
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(table = %table, error = %err, "Push sweep failed");
                }
            }
        }
    }

    /// Push the pending rows of one table.
    ///
    /// Bulk first; on bulk failure, one sequential upsert per row. Row
    /// outcomes are written back to the store (`synced`, or `failed` with
    /// the classified user-facing message). Storage faults abort the sweep
    /// and propagate raw.
    pub async fn push_pending(&self, table: EntityTable) -> StoreResult<PushReport> {
        let batch_size = self.config.batch_size;
        let rows = self
            .store
            .call(move |conn| queries::collect_pending(conn, table, batch_size))
            .await?;
        if rows.is_empty() {
            return Ok(PushReport::empty(table));
        }

        let origin = self.identity.current_user_id();
        let payloads: Vec<(Uuid, Value)> = rows
            .into_iter()
            .map(|row| (row.id, stamp_outbound(row.payload, origin)))
            .collect();
        let attempted = payloads.len();

        debug!(table = %table, count = attempted, "Pushing pending rows");

        // The whole batch is parked in-flight for the bulk call so echoes
        // of the bulk write are suppressed as well. Guards are held until
        // the local marks commit.
        let guards: Vec<_> = payloads.iter().map(|(id, _)| self.inflight.track(*id)).collect();

        let bulk_rows: Vec<Value> = payloads.iter().map(|(_, payload)| payload.clone()).collect();
        match self.remote.upsert_batch(table, bulk_rows).await {
            Ok(()) => {
                let ids: Vec<Uuid> = payloads.iter().map(|(id, _)| *id).collect();
                self.store
                    .call(move |conn| {
                        for id in &ids {
                            queries::mark_row_synced(conn, table, *id)?;
                        }
                        Ok(())
                    })
                    .await?;
                self.store
                    .call(move |conn| queries::record_push_success(conn, table))
                    .await?;
                drop(guards);

                info!(table = %table, count = attempted, "Bulk push succeeded");
                Ok(PushReport {
                    table,
                    attempted,
                    success_count: attempted,
                    failure_count: 0,
                    failures: Vec::new(),
                    used_fallback: false,
                })
            }
            Err(bulk_err) => {
                drop(guards);
                let classified = classify_remote(&bulk_err, table);
                warn!(
                    table = %table,
                    error = %bulk_err,
                    retryable = classified.is_retryable(),
                    "Bulk push failed; falling back to per-row pushes"
                );
                self.push_rows_individually(table, payloads).await
            }
        }
    }

    /// Sequential per-row fallback after a failed bulk call.
    async fn push_rows_individually(
        &self,
        table: EntityTable,
        payloads: Vec<(Uuid, Value)>,
    ) -> StoreResult<PushReport> {
        let attempted = payloads.len();
        let mut success_count = 0;
        let mut failures: Vec<PushFailure> = Vec::new();

        for (id, payload) in payloads {
            let guard = self.inflight.track(id);
            match self.remote.upsert_one(table, payload).await {
                Ok(()) => {
                    self.store
                        .call(move |conn| queries::mark_row_synced(conn, table, id))
                        .await?;
                    success_count += 1;
                }
                Err(err) => {
                    let classified = classify_remote(&err, table);
                    warn!(
                        table = %table,
                        id = %id,
                        error = %err,
                        retryable = classified.is_retryable(),
                        "Row push failed"
                    );
                    let message = classified.user_message();
                    self.store
                        .call(move |conn| queries::mark_row_failed(conn, table, id, &message))
                        .await?;
                    failures.push(PushFailure {
                        id,
                        error: classified,
                    });
                }
            }
            drop(guard);
        }

        let failure_count = failures.len();
        if failure_count == 0 {
            self.store
                .call(move |conn| queries::record_push_success(conn, table))
                .await?;
        } else {
            let last_error = failures[failure_count - 1].error.to_string();
            self.store
                .call(move |conn| queries::record_push_failure(conn, table, &last_error))
                .await?;
        }

        Ok(PushReport {
            table,
            attempted,
            success_count,
            failure_count,
            failures,
            used_fallback: true,
        })
    }
}

/// Stamp a wire payload with the actor identity and event version.
///
/// The origin stamp is what lets the broadcast parser recognize the remote
/// echo of this very push as our own.
fn stamp_outbound(mut payload: Value, origin: Option<Uuid>) -> Value {
    if let Value::Object(map) = &mut payload {
        if let Some(origin) = origin {
            map.insert(
                "_origin_user_id".to_string(),
                Value::String(origin.to_string()),
            );
        }
        map.insert("_event_version".to_string(), Value::from(EVENT_VERSION));
    }
    payload
}

/// Whether a table is due for another push attempt under backoff.
fn is_due(
    last_attempt_at: Option<DateTime<Utc>>,
    retry_count: i32,
    now: DateTime<Utc>,
    config: &PushWorkerConfig,
) -> bool {
    let Some(last_attempt) = last_attempt_at else {
        return true;
    };
    now >= last_attempt + compute_backoff(retry_count, config)
}

/// Binary exponential backoff: `base * 2^(n-1)`, capped at `backoff_max`.
fn compute_backoff(retry_count: i32, config: &PushWorkerConfig) -> chrono::Duration {
    if retry_count <= 0 {
        return chrono::Duration::zero();
    }

    let base_ms = config.backoff_base.as_millis() as u64;
    let max_ms = config.backoff_max.as_millis() as u64;
    let shift = retry_count.saturating_sub(1) as u32;
    let multiplier = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
    let delay_ms = base_ms.saturating_mul(multiplier).min(max_ms);

    chrono::Duration::milliseconds(delay_ms as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::{StaticIdentity, SyncState, Task};
    use std::sync::atomic::{AtomicBool, Ordering};

    // =========================================================================
    // Mock remote
    // =========================================================================

    struct MockRemote {
        fail_bulk: AtomicBool,
        fail_ids: Mutex<HashSet<Uuid>>,
        failure_status: u16,
        bulk_calls: Mutex<Vec<usize>>,
        single_calls: Mutex<Vec<Uuid>>,
        payloads: Mutex<Vec<Value>>,
        /// When set, records whether each pushed id was in-flight at the
        /// moment the mock saw the request.
        registry_probe: Option<InFlightRegistry>,
        observed_inflight: Mutex<Vec<bool>>,
    }

    impl MockRemote {
        fn new() -> Self {
            Self {
                fail_bulk: AtomicBool::new(false),
                fail_ids: Mutex::new(HashSet::new()),
                failure_status: 503,
                bulk_calls: Mutex::new(Vec::new()),
                single_calls: Mutex::new(Vec::new()),
                payloads: Mutex::new(Vec::new()),
                registry_probe: None,
                observed_inflight: Mutex::new(Vec::new()),
            }
        }

        fn failing_bulk(self) -> Self {
            self.fail_bulk.store(true, Ordering::SeqCst);
            self
        }

        fn with_status(mut self, status: u16) -> Self {
            self.failure_status = status;
            self
        }

        fn with_probe(mut self, registry: InFlightRegistry) -> Self {
            self.registry_probe = Some(registry);
            self
        }

        fn fail_id(&self, id: Uuid) {
            self.fail_ids.lock().unwrap().insert(id);
        }

        fn api_error(&self) -> RemoteError {
            RemoteError::Api {
                status: self.failure_status,
                message: "mock failure".to_string(),
            }
        }

        fn probe(&self, id: Uuid) {
            if let Some(registry) = &self.registry_probe {
                self.observed_inflight.lock().unwrap().push(registry.contains(id));
            }
        }
    }

    fn payload_id(payload: &Value) -> Uuid {
        Uuid::parse_str(payload["id"].as_str().unwrap()).unwrap()
    }

    impl RemoteTableWriter for MockRemote {
        async fn upsert_batch(
            &self,
            _table: EntityTable,
            rows: Vec<Value>,
        ) -> Result<(), RemoteError> {
            self.bulk_calls.lock().unwrap().push(rows.len());
            for row in &rows {
                self.probe(payload_id(row));
            }
            self.payloads.lock().unwrap().extend(rows);
            if self.fail_bulk.load(Ordering::SeqCst) {
                return Err(self.api_error());
            }
            Ok(())
        }

        async fn upsert_one(&self, _table: EntityTable, row: Value) -> Result<(), RemoteError> {
            let id = payload_id(&row);
            self.single_calls.lock().unwrap().push(id);
            self.probe(id);
            self.payloads.lock().unwrap().push(row);
            if self.fail_ids.lock().unwrap().contains(&id) {
                return Err(self.api_error());
            }
            Ok(())
        }

        async fn delete_row(&self, _table: EntityTable, _id: Uuid) -> Result<(), RemoteError> {
            Ok(())
        }
    }

    // =========================================================================
    // Harness
    // =========================================================================

    async fn store_with_pending_tasks(count: usize) -> (Store, Vec<Uuid>) {
        let store = Store::open_in_memory().await.unwrap();
        let mut ids = Vec::new();
        for i in 0..count {
            let task = Task::new_local(format!("task {}", i));
            ids.push(task.id);
            store
                .call(move |conn| queries::upsert_task(conn, &task))
                .await
                .unwrap();
        }
        (store, ids)
    }

    fn make_worker(
        store: Store,
        remote: MockRemote,
        inflight: InFlightRegistry,
        identity: Option<Uuid>,
    ) -> Arc<PushWorker<MockRemote>> {
        Arc::new(PushWorker::new(
            PushWorkerConfig::default(),
            store,
            Arc::new(remote),
            Arc::new(StaticIdentity(identity)),
            inflight,
        ))
    }

    async fn task_state(store: &Store, id: Uuid) -> (SyncState, Option<String>) {
        let task = store
            .call(move |conn| queries::get_task(conn, id))
            .await
            .unwrap()
            .unwrap();
        (task.sync_state, task.last_sync_error)
    }

    // =========================================================================
    // Bulk path
    // =========================================================================

    #[tokio::test]
    async fn bulk_success_marks_every_row_synced() {
        let (store, ids) = store_with_pending_tasks(3).await;
        let worker = make_worker(store.clone(), MockRemote::new(), InFlightRegistry::new(), None);

        let report = worker.push_pending(EntityTable::Tasks).await.unwrap();

        assert_eq!(report.attempted, 3);
        assert_eq!(report.success_count, 3);
        assert_eq!(report.failure_count, 0);
        assert!(!report.used_fallback);
        assert!(!report.has_failures());
        assert_eq!(report.success_count + report.failure_count, report.attempted);

        for id in ids {
            let (state, error) = task_state(&store, id).await;
            assert_eq!(state, SyncState::Synced);
            assert!(error.is_none());
        }

        assert_eq!(*worker.remote.bulk_calls.lock().unwrap(), vec![3]);
        assert!(worker.remote.single_calls.lock().unwrap().is_empty());

        let cursor = store
            .call(|conn| queries::get_push_cursor(conn, EntityTable::Tasks))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cursor.retry_count, 0);
    }

    #[tokio::test]
    async fn empty_pending_set_makes_no_remote_calls() {
        let (store, _) = store_with_pending_tasks(0).await;
        let worker = make_worker(store, MockRemote::new(), InFlightRegistry::new(), None);

        let report = worker.push_pending(EntityTable::Tasks).await.unwrap();

        assert_eq!(report.attempted, 0);
        assert!(worker.remote.bulk_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn outbound_payloads_carry_origin_and_version() {
        let me = Uuid::new_v4();
        let (store, _) = store_with_pending_tasks(1).await;
        let worker = make_worker(store, MockRemote::new(), InFlightRegistry::new(), Some(me));

        worker.push_pending(EntityTable::Tasks).await.unwrap();

        let payloads = worker.remote.payloads.lock().unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0]["_origin_user_id"], me.to_string());
        assert_eq!(payloads[0]["_event_version"], EVENT_VERSION);
        assert!(payloads[0].get("sync_state").is_none());
    }

    #[tokio::test]
    async fn signed_out_push_omits_origin() {
        let (store, _) = store_with_pending_tasks(1).await;
        let worker = make_worker(store, MockRemote::new(), InFlightRegistry::new(), None);

        worker.push_pending(EntityTable::Tasks).await.unwrap();

        let payloads = worker.remote.payloads.lock().unwrap();
        assert!(payloads[0].get("_origin_user_id").is_none());
    }

    // =========================================================================
    // Fallback path
    // =========================================================================

    #[tokio::test]
    async fn bulk_failure_falls_back_to_sequential_pushes() {
        let (store, ids) = store_with_pending_tasks(3).await;
        let worker = make_worker(
            store.clone(),
            MockRemote::new().failing_bulk(),
            InFlightRegistry::new(),
            None,
        );

        let report = worker.push_pending(EntityTable::Tasks).await.unwrap();

        assert!(report.used_fallback);
        assert_eq!(report.attempted, 3);
        assert_eq!(report.success_count, 3);
        assert_eq!(report.failure_count, 0);
        assert_eq!(worker.remote.single_calls.lock().unwrap().len(), 3);

        for id in ids {
            assert_eq!(task_state(&store, id).await.0, SyncState::Synced);
        }
    }

    #[tokio::test]
    async fn partial_failure_marks_rows_individually() {
        let (store, ids) = store_with_pending_tasks(3).await;
        let remote = MockRemote::new().failing_bulk();
        remote.fail_id(ids[1]);
        let worker = make_worker(store.clone(), remote, InFlightRegistry::new(), None);

        let report = worker.push_pending(EntityTable::Tasks).await.unwrap();

        assert_eq!(report.attempted, 3);
        assert_eq!(report.success_count, 2);
        assert_eq!(report.failure_count, 1);
        assert_eq!(report.success_count + report.failure_count, report.attempted);
        assert!(report.has_failures());
        assert_eq!(report.failures[0].id, ids[1]);

        let (state, error) = task_state(&store, ids[1]).await;
        assert_eq!(state, SyncState::Failed);
        assert_eq!(
            error.as_deref(),
            Some("The server reported a problem (503).")
        );
        assert_eq!(task_state(&store, ids[0]).await.0, SyncState::Synced);
        assert_eq!(task_state(&store, ids[2]).await.0, SyncState::Synced);

        let cursor = store
            .call(|conn| queries::get_push_cursor(conn, EntityTable::Tasks))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cursor.retry_count, 1);
        assert!(cursor.last_error.is_some());
    }

    #[tokio::test]
    async fn failures_partition_into_retryable_and_fatal() {
        let (store, ids) = store_with_pending_tasks(2).await;
        let remote = MockRemote::new().failing_bulk().with_status(403);
        remote.fail_id(ids[0]);
        remote.fail_id(ids[1]);
        let worker = make_worker(store, remote, InFlightRegistry::new(), None);

        let report = worker.push_pending(EntityTable::Tasks).await.unwrap();

        assert_eq!(report.failure_count, 2);
        assert!(report.retryable_failures().is_empty());
        assert_eq!(report.fatal_failures().len(), 2);
        assert!(!report.should_retry());
        assert!(matches!(
            report.failures[0].error,
            SyncError::PermissionDenied { .. }
        ));
    }

    #[tokio::test]
    async fn retryable_server_errors_request_retry() {
        let (store, ids) = store_with_pending_tasks(1).await;
        let remote = MockRemote::new().failing_bulk().with_status(502);
        remote.fail_id(ids[0]);
        let worker = make_worker(store, remote, InFlightRegistry::new(), None);

        let report = worker.push_pending(EntityTable::Tasks).await.unwrap();

        assert!(report.should_retry());
        assert_eq!(report.retryable_failures().len(), 1);
    }

    // =========================================================================
    // In-flight bookkeeping
    // =========================================================================

    #[tokio::test]
    async fn ids_are_in_flight_during_pushes_and_cleared_after() {
        let inflight = InFlightRegistry::new();
        let (store, ids) = store_with_pending_tasks(2).await;
        let remote = MockRemote::new()
            .failing_bulk()
            .with_probe(inflight.clone());
        remote.fail_id(ids[0]);
        let worker = make_worker(store, remote, inflight.clone(), None);

        worker.push_pending(EntityTable::Tasks).await.unwrap();

        // Every remote attempt (bulk probe + per-row probes) saw its id
        // registered, and nothing lingers after completion - success or
        // failure.
        let observed = worker.remote.observed_inflight.lock().unwrap().clone();
        assert!(!observed.is_empty());
        assert!(observed.iter().all(|seen| *seen));
        assert!(inflight.is_empty());
    }

    // =========================================================================
    // Backoff schedule
    // =========================================================================

    #[test]
    fn compute_backoff_caps_and_grows() {
        let config = PushWorkerConfig {
            backoff_base: Duration::from_secs(2),
            backoff_max: Duration::from_secs(10),
            ..PushWorkerConfig::default()
        };

        assert_eq!(compute_backoff(0, &config), chrono::Duration::zero());
        assert_eq!(compute_backoff(1, &config), chrono::Duration::seconds(2));
        assert_eq!(compute_backoff(2, &config), chrono::Duration::seconds(4));
        assert_eq!(compute_backoff(3, &config), chrono::Duration::seconds(8));
        assert_eq!(compute_backoff(4, &config), chrono::Duration::seconds(10));
        assert_eq!(compute_backoff(10, &config), chrono::Duration::seconds(10));
    }

    #[test]
    fn compute_backoff_zero_for_non_positive_retries() {
        let config = PushWorkerConfig::default();
        assert_eq!(compute_backoff(0, &config), chrono::Duration::zero());
        assert_eq!(compute_backoff(-1, &config), chrono::Duration::zero());
    }

    #[test]
    fn compute_backoff_large_retry_count_saturates() {
        let config = PushWorkerConfig::default();
        assert_eq!(compute_backoff(100, &config), chrono::Duration::seconds(300));
        assert_eq!(
            compute_backoff(i32::MAX, &config),
            chrono::Duration::seconds(300)
        );
    }

    #[test]
    fn is_due_respects_backoff() {
        let config = PushWorkerConfig {
            backoff_base: Duration::from_secs(2),
            backoff_max: Duration::from_secs(10),
            ..PushWorkerConfig::default()
        };

        let now = Utc::now();
        assert!(is_due(None, 0, now, &config));

        let last_attempt = now;
        assert!(!is_due(Some(last_attempt), 1, now, &config));
        assert!(is_due(
            Some(last_attempt),
            1,
            now + chrono::Duration::seconds(3),
            &config
        ));
        assert!(!is_due(
            Some(last_attempt),
            1,
            now + chrono::Duration::milliseconds(1999),
            &config
        ));
    }

    // =========================================================================
    // Background loop
    // =========================================================================

    #[tokio::test]
    async fn background_loop_pushes_pending_rows() {
        let (store, ids) = store_with_pending_tasks(1).await;
        let worker = Arc::new(PushWorker::new(
            PushWorkerConfig {
                flush_interval: Duration::from_millis(50),
                ..PushWorkerConfig::default()
            },
            store.clone(),
            Arc::new(MockRemote::new()),
            Arc::new(StaticIdentity(None)),
            InFlightRegistry::new(),
        ));

        worker.start();
        worker.notify(EntityTable::Tasks);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(task_state(&store, ids[0]).await.0, SyncState::Synced);
    }

    #[tokio::test]
    async fn sweep_skips_tables_past_max_retries() {
        let (store, ids) = store_with_pending_tasks(1).await;
        store
            .call(|conn| {
                for _ in 0..3 {
                    queries::record_push_failure(conn, EntityTable::Tasks, "mock failure")?;
                }
                Ok(())
            })
            .await
            .unwrap();

        let worker = Arc::new(PushWorker::new(
            PushWorkerConfig {
                max_retries: 2,
                ..PushWorkerConfig::default()
            },
            store.clone(),
            Arc::new(MockRemote::new()),
            Arc::new(StaticIdentity(None)),
            InFlightRegistry::new(),
        ));

        worker.sweep_all().await;

        // Cursor is past max retries, so the row stays pending and the
        // remote never hears about it.
        assert_eq!(task_state(&store, ids[0]).await.0, SyncState::Pending);
        assert!(worker.remote.bulk_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn notify_on_full_queue_does_not_panic() {
        let (store, _) = store_with_pending_tasks(0).await;
        let worker = make_worker(store, MockRemote::new(), InFlightRegistry::new(), None);
        for _ in 0..(DEFAULT_QUEUE_CAPACITY + 10) {
            worker.notify(EntityTable::Tasks);
        }
    }
}
