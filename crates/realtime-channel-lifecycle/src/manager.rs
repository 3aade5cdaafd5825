//! The channel lifecycle manager.

use crate::status::{map_connection_state, ChannelConnectionState, SyncStatus};
use crate::transport::BroadcastTransport;
use broadcast_event_parser::{BroadcastDelegate, BroadcastEventParser};
use hearth_core::{
    ActivityDto, EntityTable, ExecutionMode, IdentityProvider, InFlightRegistry, ListingDto,
    NoteDto, PropertyDto, TaskDto, UserDto,
};
use hearth_store::Store;
use record_sync_appliers::{
    apply_activity, apply_delete, apply_listing, apply_note, apply_property, apply_task,
    apply_user,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outward callbacks from the channel manager.
///
/// The per-kind callbacks fire after the record has been applied to the
/// local store; the status callback mirrors the watch stream; the restart
/// request asks the host to (re)establish the underlying broadcast
/// transport.
pub trait ChannelDelegate: Send + Sync {
    fn did_receive_task(&self, _dto: TaskDto) {}
    fn did_receive_activity(&self, _dto: ActivityDto) {}
    fn did_receive_listing(&self, _dto: ListingDto) {}
    fn did_receive_property(&self, _dto: PropertyDto) {}
    fn did_receive_user(&self, _dto: UserDto) {}
    fn did_receive_note(&self, _dto: NoteDto) {}
    fn did_receive_delete(&self, _table: EntityTable, _id: Uuid) {}
    fn sync_status_changed(&self, _status: SyncStatus) {}

    /// The event stream ended or errored; the transport needs a restart.
    fn request_transport_restart(&self);
}

/// A parsed inbound change queued for serialized application.
#[derive(Debug, Clone)]
enum ApplyCommand {
    Task(TaskDto),
    Activity(ActivityDto),
    Listing(ListingDto),
    Property(PropertyDto),
    User(UserDto),
    Note(NoteDto),
    Delete(EntityTable, Uuid),
}

/// Routes parser callbacks into the apply queue.
///
/// The queue has a single consumer, so application order matches arrival
/// order - the per-table FIFO guarantee rides on this.
struct RouteDelegate {
    apply_tx: mpsc::UnboundedSender<ApplyCommand>,
}

impl RouteDelegate {
    fn push(&self, command: ApplyCommand) {
        if self.apply_tx.send(command).is_err() {
            debug!("Apply worker gone; dropping inbound change");
        }
    }
}

impl BroadcastDelegate for RouteDelegate {
    fn did_receive_task(&self, dto: TaskDto) {
        self.push(ApplyCommand::Task(dto));
    }
    fn did_receive_activity(&self, dto: ActivityDto) {
        self.push(ApplyCommand::Activity(dto));
    }
    fn did_receive_listing(&self, dto: ListingDto) {
        self.push(ApplyCommand::Listing(dto));
    }
    fn did_receive_property(&self, dto: PropertyDto) {
        self.push(ApplyCommand::Property(dto));
    }
    fn did_receive_user(&self, dto: UserDto) {
        self.push(ApplyCommand::User(dto));
    }
    fn did_receive_note(&self, dto: NoteDto) {
        self.push(ApplyCommand::Note(dto));
    }
    fn did_receive_delete(&self, table: EntityTable, id: Uuid) {
        self.push(ApplyCommand::Delete(table, id));
    }
}

/// Owns the realtime subscription tasks and the sync status.
///
/// One listener task per synchronized table plus one status-watch task.
/// Under [`ExecutionMode::Test`] / [`ExecutionMode::Preview`] no real
/// subscription is opened and the manager deterministically reports
/// [`SyncStatus::Idle`].
pub struct ChannelLifecycleManager {
    store: Store,
    transport: Arc<dyn BroadcastTransport>,
    identity: Arc<dyn IdentityProvider>,
    mode: ExecutionMode,
    inflight: InFlightRegistry,
    delegate: Arc<dyn ChannelDelegate>,
    listener_tasks: Mutex<HashMap<EntityTable, JoinHandle<()>>>,
    status_task: Mutex<Option<JoinHandle<()>>>,
    apply_task: Mutex<Option<JoinHandle<()>>>,
    status_tx: watch::Sender<SyncStatus>,
}

impl ChannelLifecycleManager {
    pub fn new(
        store: Store,
        transport: Arc<dyn BroadcastTransport>,
        identity: Arc<dyn IdentityProvider>,
        mode: ExecutionMode,
        inflight: InFlightRegistry,
        delegate: Arc<dyn ChannelDelegate>,
    ) -> Self {
        let (status_tx, _) = watch::channel(SyncStatus::Idle);
        Self {
            store,
            transport,
            identity,
            mode,
            inflight,
            delegate,
            listener_tasks: Mutex::new(HashMap::new()),
            status_task: Mutex::new(None),
            apply_task: Mutex::new(None),
            status_tx,
        }
    }

    /// Current sync status.
    pub fn status(&self) -> SyncStatus {
        *self.status_tx.borrow()
    }

    /// Watch stream of sync status changes.
    pub fn status_stream(&self) -> watch::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    /// Whether listener tasks are currently held.
    pub fn is_listening(&self) -> bool {
        !self.listener_tasks.lock().expect("lock poisoned").is_empty()
    }

    /// Open one listener task per table plus the status-watch task.
    ///
    /// Must be called on the runtime. Does nothing if listeners are already
    /// held; call [`cancel_all_tasks`](Self::cancel_all_tasks) and
    /// [`clear_task_references`](Self::clear_task_references) first to
    /// restart from a clean slate.
    pub fn start_listening(&self) {
        if !self.mode.subscribes_to_realtime() {
            info!(mode = ?self.mode, "Skipping realtime subscription in non-production mode");
            self.publish_status(SyncStatus::Idle);
            return;
        }

        {
            let listeners = self.listener_tasks.lock().expect("lock poisoned");
            if !listeners.is_empty() {
                debug!("Already listening; ignoring start request");
                return;
            }
        }

        let (apply_tx, apply_rx) = mpsc::unbounded_channel();
        *self.apply_task.lock().expect("lock poisoned") = Some(spawn_apply_worker(
            self.store.clone(),
            self.delegate.clone(),
            apply_rx,
        ));

        let parser = Arc::new(BroadcastEventParser::new(
            self.identity.clone(),
            self.inflight.clone(),
            Arc::new(RouteDelegate { apply_tx }),
        ));

        {
            let mut listeners = self.listener_tasks.lock().expect("lock poisoned");
            for table in EntityTable::ALL {
                let receiver = self.transport.subscribe(table);
                listeners.insert(
                    table,
                    spawn_listener(table, receiver, parser.clone(), self.delegate.clone()),
                );
            }
        }

        *self.status_task.lock().expect("lock poisoned") = Some(spawn_status_watch(
            self.transport.status_stream(),
            self.status_tx.clone(),
            self.delegate.clone(),
        ));

        self.publish_status(SyncStatus::Syncing);
        info!(tables = EntityTable::ALL.len(), "Started realtime listeners");
    }

    /// Cancel every per-table task and the status task in one sweep.
    ///
    /// Handles are kept; pair with
    /// [`clear_task_references`](Self::clear_task_references) before the
    /// next [`start_listening`](Self::start_listening). An in-progress
    /// outbound push is not affected.
    pub fn cancel_all_tasks(&self) {
        {
            let listeners = self.listener_tasks.lock().expect("lock poisoned");
            for (table, handle) in listeners.iter() {
                handle.abort();
                debug!(table = %table, "Listener task cancelled");
            }
        }
        if let Some(handle) = self.status_task.lock().expect("lock poisoned").as_ref() {
            handle.abort();
        }
        if let Some(handle) = self.apply_task.lock().expect("lock poisoned").as_ref() {
            handle.abort();
        }
        info!("Cancelled all channel tasks");
    }

    /// Drop all task handles so a later start begins from a clean slate.
    pub fn clear_task_references(&self) {
        self.listener_tasks.lock().expect("lock poisoned").clear();
        *self.status_task.lock().expect("lock poisoned") = None;
        *self.apply_task.lock().expect("lock poisoned") = None;
    }

    /// Full teardown: unsubscribe every table, cancel and clear tasks, and
    /// report idle.
    pub fn stop_listening(&self) {
        for table in EntityTable::ALL {
            self.transport.unsubscribe(table);
        }
        self.cancel_all_tasks();
        self.clear_task_references();
        self.publish_status(SyncStatus::Idle);
    }

    fn publish_status(&self, status: SyncStatus) {
        publish_status(&self.status_tx, self.delegate.as_ref(), status);
    }
}

fn publish_status(
    status_tx: &watch::Sender<SyncStatus>,
    delegate: &dyn ChannelDelegate,
    status: SyncStatus,
) {
    let previous = status_tx.send_replace(status);
    if previous != status {
        debug!(status = %status, "Sync status changed");
        delegate.sync_status_changed(status);
    }
}

fn spawn_listener(
    table: EntityTable,
    mut receiver: mpsc::Receiver<serde_json::Value>,
    parser: Arc<BroadcastEventParser>,
    delegate: Arc<dyn ChannelDelegate>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            parser.handle(&event);
        }
        debug!(table = %table, "Broadcast stream ended");
        delegate.request_transport_restart();
    })
}

fn spawn_status_watch(
    mut receiver: broadcast::Receiver<ChannelConnectionState>,
    status_tx: watch::Sender<SyncStatus>,
    delegate: Arc<dyn ChannelDelegate>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(state) => {
                    publish_status(&status_tx, delegate.as_ref(), map_connection_state(state));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Status stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    publish_status(&status_tx, delegate.as_ref(), SyncStatus::Error);
                    delegate.request_transport_restart();
                    break;
                }
            }
        }
    })
}

fn spawn_apply_worker(
    store: Store,
    delegate: Arc<dyn ChannelDelegate>,
    mut receiver: mpsc::UnboundedReceiver<ApplyCommand>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(command) = receiver.recv().await {
            apply_command(&store, delegate.as_ref(), command).await;
        }
        debug!("Apply worker stopped (channel closed)");
    })
}

/// Applies one inbound change inside the store's serialized confinement,
/// then forwards it to the outward delegate. Apply failures are logged and
/// swallowed; inbound processing never takes the engine down.
async fn apply_command(store: &Store, delegate: &dyn ChannelDelegate, command: ApplyCommand) {
    match command {
        ApplyCommand::Task(dto) => {
            let applied = dto.clone();
            match store.call(move |conn| apply_task(conn, &applied)).await {
                Ok(outcome) => {
                    debug!(table = "tasks", id = %dto.id, ?outcome, "Applied inbound record");
                    delegate.did_receive_task(dto);
                }
                Err(err) => {
                    warn!(table = "tasks", id = %dto.id, error = %err, "Failed to apply inbound record");
                }
            }
        }
        ApplyCommand::Activity(dto) => {
            let applied = dto.clone();
            match store.call(move |conn| apply_activity(conn, &applied)).await {
                Ok(outcome) => {
                    debug!(table = "activities", id = %dto.id, ?outcome, "Applied inbound record");
                    delegate.did_receive_activity(dto);
                }
                Err(err) => {
                    warn!(table = "activities", id = %dto.id, error = %err, "Failed to apply inbound record");
                }
            }
        }
        ApplyCommand::Listing(dto) => {
            let applied = dto.clone();
            match store.call(move |conn| apply_listing(conn, &applied)).await {
                Ok(outcome) => {
                    debug!(table = "listings", id = %dto.id, ?outcome, "Applied inbound record");
                    delegate.did_receive_listing(dto);
                }
                Err(err) => {
                    warn!(table = "listings", id = %dto.id, error = %err, "Failed to apply inbound record");
                }
            }
        }
        ApplyCommand::Property(dto) => {
            let applied = dto.clone();
            match store.call(move |conn| apply_property(conn, &applied)).await {
                Ok(outcome) => {
                    debug!(table = "properties", id = %dto.id, ?outcome, "Applied inbound record");
                    delegate.did_receive_property(dto);
                }
                Err(err) => {
                    warn!(table = "properties", id = %dto.id, error = %err, "Failed to apply inbound record");
                }
            }
        }
        ApplyCommand::User(dto) => {
            let applied = dto.clone();
            match store.call(move |conn| apply_user(conn, &applied)).await {
                Ok(outcome) => {
                    debug!(table = "users", id = %dto.id, ?outcome, "Applied inbound record");
                    delegate.did_receive_user(dto);
                }
                Err(err) => {
                    warn!(table = "users", id = %dto.id, error = %err, "Failed to apply inbound record");
                }
            }
        }
        ApplyCommand::Note(dto) => {
            let applied = dto.clone();
            match store.call(move |conn| apply_note(conn, &applied)).await {
                Ok(outcome) => {
                    debug!(table = "notes", id = %dto.id, ?outcome, "Applied inbound record");
                    delegate.did_receive_note(dto);
                }
                Err(err) => {
                    warn!(table = "notes", id = %dto.id, error = %err, "Failed to apply inbound record");
                }
            }
        }
        ApplyCommand::Delete(table, id) => {
            match store.call(move |conn| apply_delete(conn, table, id)).await {
                Ok(existed) => {
                    debug!(table = %table, id = %id, existed, "Applied inbound delete");
                    delegate.did_receive_delete(table, id);
                }
                Err(err) => {
                    warn!(table = %table, id = %id, error = %err, "Failed to apply inbound delete");
                }
            }
        }
    }
}
