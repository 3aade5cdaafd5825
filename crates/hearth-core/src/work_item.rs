//! Unified work items for agenda-style display.
//!
//! A [`WorkItem`] wraps either a task or an activity as an immutable value
//! snapshot captured at construction time. Views hold these snapshots, never
//! live references into the store, so a store reset mid-render cannot be
//! observed; mutation paths re-fetch by id instead of writing through a
//! snapshot.

use crate::entities::{Activity, ActivityKind, SyncState, Task};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Display snapshot of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub id: Uuid,
    pub title: String,
    pub due_at: Option<DateTime<Utc>>,
    pub completed: bool,
    pub sync_state: SyncState,
}

/// Display snapshot of an activity.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySnapshot {
    pub id: Uuid,
    pub kind: ActivityKind,
    pub subject: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sync_state: SyncState,
}

/// A task-or-activity wrapper for mixed agenda lists.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkItem {
    Task(TaskSnapshot),
    Activity(ActivitySnapshot),
}

impl WorkItem {
    /// Captures a snapshot of a task row.
    pub fn from_task(task: &Task) -> Self {
        Self::Task(TaskSnapshot {
            id: task.id,
            title: task.title.clone(),
            due_at: task.due_at,
            completed: task.completed_at.is_some(),
            sync_state: task.sync_state,
        })
    }

    /// Captures a snapshot of an activity row.
    pub fn from_activity(activity: &Activity) -> Self {
        Self::Activity(ActivitySnapshot {
            id: activity.id,
            kind: activity.kind,
            subject: activity.subject.clone(),
            scheduled_at: activity.scheduled_at,
            sync_state: activity.sync_state,
        })
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Task(t) => t.id,
            Self::Activity(a) => a.id,
        }
    }

    /// Headline text for list rows.
    pub fn headline(&self) -> &str {
        match self {
            Self::Task(t) => &t.title,
            Self::Activity(a) => &a.subject,
        }
    }

    /// The timestamp agenda lists sort by (due date or scheduled time).
    pub fn sort_key(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Task(t) => t.due_at,
            Self::Activity(a) => a.scheduled_at,
        }
    }

    pub fn sync_state(&self) -> SyncState {
        match self {
            Self::Task(t) => t.sync_state,
            Self::Activity(a) => a.sync_state,
        }
    }
}
