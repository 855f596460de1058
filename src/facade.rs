//! Per-tool view handed out to the rest of the application.

use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::store::PoseStore;
use crate::types::{Notification, ToolKind, Transform};
use crate::Result;

/// Read-only handle bound to one tool uid.
///
/// Holds no tool state of its own; every query goes to the shared store.
/// The registry asks it to raise outward notifications when the store
/// reports a change for its uid.
pub struct ToolFacade {
    uid: String,
    store: Arc<PoseStore>,
    notify: Sender<Notification>,
}

impl ToolFacade {
    pub(crate) fn new(uid: String, store: Arc<PoseStore>, notify: Sender<Notification>) -> Self {
        Self { uid, store, notify }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Classify the tool from its identity code.
    /// Fails if the tool has never been reported by the hardware.
    pub fn kind(&self) -> Result<ToolKind> {
        Ok(ToolKind::from_code(self.store.tool_id(&self.uid)?))
    }

    /// Latest pose of the tool.
    pub fn pose(&self) -> Result<Transform> {
        self.store.pose(&self.uid)
    }

    /// Whether the tool is currently visible to the tracker.
    pub fn visible(&self) -> Result<bool> {
        self.store.visible(&self.uid)
    }

    /// Publish the current pose with a host-relative timestamp.
    pub(crate) fn raise_transform_notification(&self, timestamp_s: f64) {
        if let Ok(pose) = self.store.pose(&self.uid) {
            let _ = self.notify.send(Notification::TransformAndTimestamp {
                uid: self.uid.clone(),
                pose,
                timestamp_s,
            });
        }
    }

    /// Publish the current visibility flag.
    pub(crate) fn raise_visibility_notification(&self) {
        if let Ok(visible) = self.store.visible(&self.uid) {
            let _ = self.notify.send(Notification::Visible {
                uid: self.uid.clone(),
                visible,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::STATUS_OK;

    fn facade_for(uid: &str, store: Arc<PoseStore>) -> (ToolFacade, crossbeam_channel::Receiver<Notification>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (ToolFacade::new(uid.to_string(), store, tx), rx)
    }

    #[test]
    fn queries_delegate_to_store() {
        let (store, _events) = PoseStore::new();
        store.update_pose(7, 3, STATUS_OK, Some(Transform::IDENTITY));
        let (facade, _rx) = facade_for("tool_7:3", store);

        assert_eq!(facade.kind().unwrap(), ToolKind::Pointer);
        assert!(facade.visible().unwrap());
        assert_eq!(facade.pose().unwrap(), Transform::IDENTITY);
    }

    #[test]
    fn unknown_tool_queries_fail() {
        let (store, _events) = PoseStore::new();
        let (facade, _rx) = facade_for("tool_0:0", store);
        assert!(facade.kind().is_err());
        assert!(facade.pose().is_err());
        assert!(facade.visible().is_err());
    }

    #[test]
    fn notifications_carry_current_state() {
        let (store, _events) = PoseStore::new();
        store.update_pose(1, 0, STATUS_OK, Some(Transform::IDENTITY));
        let (facade, rx) = facade_for("tool_1:0", store);

        facade.raise_transform_notification(1.5);
        facade.raise_visibility_notification();

        assert_eq!(
            rx.try_recv().unwrap(),
            Notification::TransformAndTimestamp {
                uid: "tool_1:0".into(),
                pose: Transform::IDENTITY,
                timestamp_s: 1.5,
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Notification::Visible {
                uid: "tool_1:0".into(),
                visible: true,
            }
        );
    }
}
