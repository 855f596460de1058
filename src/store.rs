//! Shared store of per-tool tracking state.
//!
//! `PoseStore` is the single point of truth for tool poses and visibility,
//! shared between the poller thread (writer) and the UI thread (readers).
//! Mutation and change detection happen under one mutex; events are
//! delivered on a channel only after the lock is released, so no observer
//! ever runs inside the store's critical section.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender};

use crate::error::TrackError;
use crate::protocol::STATUS_OK;
use crate::types::{ToolIdentity, Transform, POSE_TOLERANCE};
use crate::Result;

/// Change event emitted by the store, in per-tool causal order:
/// `ToolAdded` for a uid always precedes any other event for that uid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    ToolAdded(String),
    VisibilityChanged(String),
    PoseChanged(String),
}

/// State of one tool slot in the arena.
struct ToolSlot {
    identity: ToolIdentity,
    visible: bool,
    /// `None` until the first visible update, so the first real pose is
    /// always treated as a change.
    pose: Option<Transform>,
}

struct StoreInner {
    /// Tool slots in creation order; never removed for the session.
    slots: Vec<ToolSlot>,
    /// uid -> slot index.
    index: HashMap<String, usize>,
    /// Tracking systems seen so far.
    systems: Vec<i32>,
}

/// Concurrent map from tool identity to latest pose/visibility, with
/// change-detection-based event emission.
///
/// All operations are internally synchronized; callers need no external
/// locking. Events for one uid are delivered in update order because the
/// poller thread is the only writer and the channel is FIFO.
pub struct PoseStore {
    inner: Mutex<StoreInner>,
    events: Sender<StoreEvent>,
}

impl PoseStore {
    /// Create a store and the receiving end of its event channel.
    pub fn new() -> (Arc<PoseStore>, Receiver<StoreEvent>) {
        let (events, receiver) = crossbeam_channel::unbounded();
        let store = Arc::new(PoseStore {
            inner: Mutex::new(StoreInner {
                slots: Vec::new(),
                index: HashMap::new(),
                systems: Vec::new(),
            }),
            events,
        });
        (store, receiver)
    }

    /// Apply one tool-position report.
    ///
    /// Creates the tool on first sight (`ToolAdded`), flips visibility
    /// when the status code changes meaning (`VisibilityChanged`), and
    /// stores `candidate` when the tool is visible and the pose moved
    /// beyond [`POSE_TOLERANCE`] (`PoseChanged`). The pose is never
    /// inspected or updated while the tool is invisible.
    pub fn update_pose(
        &self,
        system_id: i32,
        tool_id: i32,
        status: i32,
        candidate: Option<Transform>,
    ) {
        let identity = ToolIdentity::new(system_id, tool_id);
        let uid = identity.uid();
        let mut pending: Vec<StoreEvent> = Vec::new();

        {
            let mut inner = self.inner.lock().unwrap();
            let idx = match inner.index.get(&uid).copied() {
                Some(idx) => idx,
                None => {
                    let idx = inner.slots.len();
                    inner.slots.push(ToolSlot {
                        identity,
                        visible: false,
                        pose: None,
                    });
                    inner.index.insert(uid.clone(), idx);
                    log::info!("new tool {uid}");
                    pending.push(StoreEvent::ToolAdded(uid.clone()));
                    idx
                }
            };

            let slot = &mut inner.slots[idx];
            let visible = status == STATUS_OK;
            if visible != slot.visible {
                slot.visible = visible;
                pending.push(StoreEvent::VisibilityChanged(uid.clone()));
            }

            if visible {
                if let Some(pose) = candidate {
                    let moved = match &slot.pose {
                        Some(stored) => !stored.approx_eq(&pose, POSE_TOLERANCE),
                        None => true,
                    };
                    if moved {
                        slot.pose = Some(pose);
                        pending.push(StoreEvent::PoseChanged(uid.clone()));
                    }
                }
            }
        }

        // Lock released; deliver in order.
        for event in pending {
            let _ = self.events.send(event);
        }
    }

    /// Latest pose of the tool, identity until its first visible update.
    pub fn pose(&self, uid: &str) -> Result<Transform> {
        self.with_slot(uid, |slot| slot.pose.unwrap_or(Transform::IDENTITY))
    }

    /// Whether the tool is currently visible to the tracker.
    pub fn visible(&self, uid: &str) -> Result<bool> {
        self.with_slot(uid, |slot| slot.visible)
    }

    pub fn system_id(&self, uid: &str) -> Result<i32> {
        self.with_slot(uid, |slot| slot.identity.system_id)
    }

    pub fn tool_id(&self, uid: &str) -> Result<i32> {
        self.with_slot(uid, |slot| slot.identity.tool_id)
    }

    /// Record a tracking system. Idempotent; returns whether it was new.
    pub fn register_system(&self, system_id: i32) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.systems.contains(&system_id) {
            false
        } else {
            inner.systems.push(system_id);
            log::info!("registered tracking system {system_id}");
            true
        }
    }

    /// Snapshot of the known system ids.
    pub fn list_systems(&self) -> Vec<i32> {
        self.inner.lock().unwrap().systems.clone()
    }

    fn with_slot<T>(&self, uid: &str, f: impl FnOnce(&ToolSlot) -> T) -> Result<T> {
        let inner = self.inner.lock().unwrap();
        match inner.index.get(uid) {
            Some(&idx) => Ok(f(&inner.slots[idx])),
            None => Err(TrackError::UnknownTool(uid.to_string())),
        }
    }
}
