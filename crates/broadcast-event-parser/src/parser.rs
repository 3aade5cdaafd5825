//! Filtering and dispatch.

use crate::event::{self, extract_record_id, BroadcastEventType};
use hearth_core::{
    ActivityDto, EntityTable, IdentityProvider, InFlightRegistry, ListingDto, NoteDto, PropertyDto,
    TaskDto, UserDto, EVENT_VERSION,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Receiver for parsed broadcast events, one callback per entity kind plus
/// a generic delete.
///
/// Implementors decide what an upsert means (typically: run the matching
/// record applier inside the store). Callbacks are synchronous and should
/// enqueue rather than block.
pub trait BroadcastDelegate: Send + Sync {
    fn did_receive_task(&self, dto: TaskDto);
    fn did_receive_activity(&self, dto: ActivityDto);
    fn did_receive_listing(&self, dto: ListingDto);
    fn did_receive_property(&self, dto: PropertyDto);
    fn did_receive_user(&self, dto: UserDto);
    fn did_receive_note(&self, dto: NoteDto);
    fn did_receive_delete(&self, table: EntityTable, id: Uuid);
}

/// Decodes wire events and routes them to the delegate.
pub struct BroadcastEventParser {
    identity: Arc<dyn IdentityProvider>,
    inflight: InFlightRegistry,
    delegate: Arc<dyn BroadcastDelegate>,
}

impl BroadcastEventParser {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        inflight: InFlightRegistry,
        delegate: Arc<dyn BroadcastDelegate>,
    ) -> Self {
        Self {
            identity,
            inflight,
            delegate,
        }
    }

    /// Handle one raw broadcast payload.
    ///
    /// Filter order: self-echo, then in-flight, then shape checks. A dropped
    /// event produces zero delegate callbacks; nothing in here raises.
    pub fn handle(&self, payload: &Value) {
        let Some(table_name) = event::event_table(payload) else {
            debug!("Dropping broadcast event without table");
            return;
        };
        let Some(table) = EntityTable::parse(table_name) else {
            debug!(table = table_name, "Dropping broadcast event for unknown table");
            return;
        };
        let Some(event_type) = event::event_type(payload) else {
            debug!(table = %table, "Dropping broadcast event without recognized type");
            return;
        };

        match event_type {
            BroadcastEventType::Insert | BroadcastEventType::Update => {
                self.handle_upsert(table, payload);
            }
            BroadcastEventType::Delete => {
                self.handle_delete(table, payload);
            }
        }
    }

    fn handle_upsert(&self, table: EntityTable, payload: &Value) {
        let Some(record) = event::record(payload) else {
            debug!(table = %table, "Dropping upsert event without record");
            return;
        };

        if !self.passes_filters(table, record) {
            return;
        }
        let Some(id) = extract_record_id(record) else {
            debug!(table = %table, "Dropping upsert event without usable id");
            return;
        };

        match table {
            EntityTable::Tasks => self.dispatch::<TaskDto>(table, id, record, |d, dto| {
                d.did_receive_task(dto);
            }),
            EntityTable::Activities => self.dispatch::<ActivityDto>(table, id, record, |d, dto| {
                d.did_receive_activity(dto);
            }),
            EntityTable::Listings => self.dispatch::<ListingDto>(table, id, record, |d, dto| {
                d.did_receive_listing(dto);
            }),
            EntityTable::Properties => self.dispatch::<PropertyDto>(table, id, record, |d, dto| {
                d.did_receive_property(dto);
            }),
            EntityTable::Users => self.dispatch::<UserDto>(table, id, record, |d, dto| {
                d.did_receive_user(dto);
            }),
            EntityTable::Notes => self.dispatch::<NoteDto>(table, id, record, |d, dto| {
                d.did_receive_note(dto);
            }),
        }
    }

    fn handle_delete(&self, table: EntityTable, payload: &Value) {
        let Some(old_record) = event::old_record(payload) else {
            debug!(table = %table, "Dropping delete event without old_record");
            return;
        };

        if !self.passes_filters(table, old_record) {
            return;
        }
        // Deletes carry identity only; no field mutation rides along.
        let Some(id) = extract_record_id(old_record) else {
            debug!(table = %table, "Dropping delete event without usable id");
            return;
        };

        self.delegate.did_receive_delete(table, id);
    }

    /// Self-echo and in-flight filtering, shared by upserts and deletes.
    fn passes_filters(&self, table: EntityTable, record: &Value) -> bool {
        // An event attributed to the current actor is an echo of our own
        // write; an absent origin is system-originated and always processed.
        if let Some(origin) = event::origin_user_id(record) {
            if self.identity.current_user_id() == Some(origin) {
                debug!(table = %table, origin = %origin, "Dropping self-echo event");
                return false;
            }
        }

        if let Some(id) = extract_record_id(record) {
            if self.inflight.contains(id) {
                debug!(table = %table, id = %id, "Dropping event for in-flight record");
                return false;
            }
        }

        if let Some(version) = event::event_version(record) {
            if version != EVENT_VERSION {
                // Forward compatible: still processed.
                debug!(table = %table, version, "Processing event with unrecognized version");
            }
        }

        true
    }

    fn dispatch<T: serde::de::DeserializeOwned>(
        &self,
        table: EntityTable,
        id: Uuid,
        record: &Value,
        deliver: impl FnOnce(&dyn BroadcastDelegate, T),
    ) {
        match serde_json::from_value::<T>(record.clone()) {
            Ok(dto) => deliver(self.delegate.as_ref(), dto),
            Err(err) => {
                debug!(table = %table, id = %id, error = %err, "Dropping undecodable record");
            }
        }
    }
}
