//! Process-scoped coordinator owning the store, the poller, and the
//! per-tool facades.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::bus::HardwareBus;
use crate::error::TrackError;
use crate::facade::ToolFacade;
use crate::poller::{EventSink, TrackingPoller};
use crate::store::PoseStore;
use crate::types::Notification;
use crate::Result;

/// Facade arena: slots in creation order plus a uid lookup.
#[derive(Default)]
struct FacadeTable {
    slots: Vec<Arc<ToolFacade>>,
    index: HashMap<String, usize>,
}

/// State shared between the registry handle and the poller-side sink.
struct RegistryShared {
    store: Arc<PoseStore>,
    facades: Mutex<FacadeTable>,
    notify: Sender<Notification>,
    /// Zero point for host-relative notification timestamps.
    epoch: Instant,
    tracking_lost: AtomicBool,
}

impl RegistryShared {
    fn get_or_create(&self, uid: &str) -> Arc<ToolFacade> {
        let mut table = self.facades.lock().unwrap();
        if let Some(&idx) = table.index.get(uid) {
            return table.slots[idx].clone();
        }
        let facade = Arc::new(ToolFacade::new(
            uid.to_string(),
            self.store.clone(),
            self.notify.clone(),
        ));
        let idx = table.slots.len();
        table.slots.push(facade.clone());
        table.index.insert(uid.to_string(), idx);
        facade
    }
}

impl EventSink for RegistryShared {
    fn on_tool_added(&self, uid: &str) {
        // Creating the facade up front keeps ToolAdded ahead of any
        // notification that facade will ever raise.
        self.get_or_create(uid);
    }

    fn on_visibility_changed(&self, uid: &str) {
        self.get_or_create(uid).raise_visibility_notification();
    }

    fn on_pose_changed(&self, uid: &str) {
        self.get_or_create(uid)
            .raise_transform_notification(self.epoch.elapsed().as_secs_f64());
    }

    fn on_disconnected(&self) {
        self.tracking_lost.store(true, Ordering::Relaxed);
        let _ = self.notify.send(Notification::TrackingStopped);
    }
}

/// Entry point binding the whole tracking core together.
///
/// Construct exactly one per process at the application's composition
/// root and inject it where needed; nothing here is a hidden global.
/// Dropping the registry stops the poller thread.
pub struct ToolRegistry {
    shared: Arc<RegistryShared>,
    poller: TrackingPoller,
    notifications: Receiver<Notification>,
}

impl ToolRegistry {
    /// Wire a store to the given bus and spawn the polling thread.
    pub fn new(bus: Arc<dyn HardwareBus>) -> Result<ToolRegistry> {
        let (store, events) = PoseStore::new();
        let (notify, notifications) = crossbeam_channel::unbounded();

        let shared = Arc::new(RegistryShared {
            store: store.clone(),
            facades: Mutex::new(FacadeTable::default()),
            notify,
            epoch: Instant::now(),
            tracking_lost: AtomicBool::new(false),
        });

        let poller = TrackingPoller::spawn(bus, store, events, shared.clone())?;
        log::info!("tool registry started");

        Ok(ToolRegistry {
            shared,
            poller,
            notifications,
        })
    }

    /// Send the session "begin" control message to the hardware.
    pub fn initialize(&self) {
        self.poller.initialize();
    }

    /// Start pose streaming on every known tracking system.
    pub fn start_tracking(&self) {
        self.poller.start_tracking();
    }

    /// Pause pose streaming on every known tracking system.
    pub fn stop_tracking(&self) {
        self.poller.stop_tracking();
    }

    /// Return the facade for `uid`, creating it on first reference.
    /// Idempotent under concurrent calls for the same uid.
    pub fn get_or_create_facade(&self, uid: &str) -> Arc<ToolFacade> {
        self.shared.get_or_create(uid)
    }

    /// Snapshot of every facade created so far, in creation order.
    pub fn list_tools(&self) -> Vec<Arc<ToolFacade>> {
        self.shared.facades.lock().unwrap().slots.clone()
    }

    /// Snapshot of every known tool uid, in creation order.
    pub fn list_uids(&self) -> Vec<String> {
        self.shared
            .facades
            .lock()
            .unwrap()
            .slots
            .iter()
            .map(|f| f.uid().to_string())
            .collect()
    }

    /// Outward notification stream for the UI thread.
    pub fn notifications(&self) -> &Receiver<Notification> {
        &self.notifications
    }

    /// Receive the next notification (blocks until one arrives).
    pub fn recv_notification(&self) -> Result<Notification> {
        self.notifications
            .recv()
            .map_err(|_| TrackError::ChannelDisconnected)
    }

    /// Receive the next notification with a timeout.
    pub fn recv_notification_timeout(&self, timeout: Duration) -> Result<Notification> {
        self.notifications.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => TrackError::Timeout,
            RecvTimeoutError::Disconnected => TrackError::ChannelDisconnected,
        })
    }

    /// Whether the hardware feed ended unexpectedly.
    pub fn tracking_lost(&self) -> bool {
        self.shared.tracking_lost.load(Ordering::Relaxed)
    }

    /// The tool the user is currently working with.
    // TODO: wire to a selection concept once the application exposes one.
    pub fn active_tool(&self) -> Option<Arc<ToolFacade>> {
        None
    }

    /// Whether the hardware session has been initialized.
    // TODO: track the begin handshake once the firmware acknowledges it.
    pub fn is_initialized(&self) -> bool {
        false
    }

    /// Stop the poller thread and wait for it to finish.
    pub fn shutdown(&mut self) {
        self.poller.stop();
        log::info!("tool registry shut down");
    }
}

impl Drop for ToolRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::fake::{ScriptedBus, Word};
    use crate::protocol::{
        SIG_INIT, SIG_SYSTEM_DISCOVERED, SIG_TOOL_POSITION, SIG_TOOL_REQUEST, STATUS_OK,
    };
    use crate::types::{ToolKind, Transform};

    const RECV_TIMEOUT: Duration = Duration::from_secs(2);

    fn tool_position(system_id: i32, tool_id: i32, status: i32) -> Vec<Word> {
        let mut words = vec![
            Word::Int(SIG_TOOL_POSITION),
            Word::Int(system_id),
            Word::Int(tool_id),
            Word::Uint(123),
            Word::Int(status),
        ];
        if status == STATUS_OK {
            words.push(Word::Doubles(Transform::IDENTITY.0.to_vec()));
        }
        words
    }

    #[test]
    fn end_to_end_notifications() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut script = vec![Word::Int(SIG_SYSTEM_DISCOVERED), Word::Int(7)];
        script.extend(tool_position(7, 2, STATUS_OK));
        script.extend(tool_position(7, 2, STATUS_OK)); // identical repeat
        script.extend(tool_position(7, 2, 1)); // tool lost

        let bus = Arc::new(ScriptedBus::new(script));
        let registry = ToolRegistry::new(bus.clone()).unwrap();

        assert_eq!(
            registry.recv_notification_timeout(RECV_TIMEOUT).unwrap(),
            Notification::Visible {
                uid: "tool_7:2".into(),
                visible: true,
            }
        );
        match registry.recv_notification_timeout(RECV_TIMEOUT).unwrap() {
            Notification::TransformAndTimestamp { uid, pose, timestamp_s } => {
                assert_eq!(uid, "tool_7:2");
                assert_eq!(pose, Transform::IDENTITY);
                assert!(timestamp_s >= 0.0);
            }
            other => panic!("expected transform notification, got {other:?}"),
        }
        // The identical repeat produced nothing; next is the loss flip.
        assert_eq!(
            registry.recv_notification_timeout(RECV_TIMEOUT).unwrap(),
            Notification::Visible {
                uid: "tool_7:2".into(),
                visible: false,
            }
        );
        // Script exhausted: the bus disconnects.
        assert_eq!(
            registry.recv_notification_timeout(RECV_TIMEOUT).unwrap(),
            Notification::TrackingStopped
        );

        assert!(registry.tracking_lost());
        assert_eq!(registry.list_uids(), vec!["tool_7:2"]);
        assert_eq!(
            registry.get_or_create_facade("tool_7:2").kind().unwrap(),
            ToolKind::UltrasoundProbe
        );
        assert_eq!(
            bus.sent(),
            vec![(SIG_INIT, vec![7]), (SIG_TOOL_REQUEST, vec![7])]
        );
    }

    #[test]
    fn facade_creation_is_idempotent_under_race() {
        let bus = Arc::new(ScriptedBus::new(vec![]));
        let registry = Arc::new(ToolRegistry::new(bus).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.get_or_create_facade("tool_1:1"))
            })
            .collect();

        let facades: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for facade in &facades[1..] {
            assert!(Arc::ptr_eq(&facades[0], facade));
        }
        assert_eq!(registry.list_uids(), vec!["tool_1:1"]);
        assert_eq!(registry.list_tools().len(), 1);
    }

    #[test]
    fn shutdown_stops_the_poller() {
        let bus = Arc::new(ScriptedBus::new(vec![]));
        let mut registry = ToolRegistry::new(bus).unwrap();
        registry.shutdown();
        // Idempotent; Drop performs it again harmlessly.
        registry.shutdown();
    }

    #[test]
    fn open_interface_points_stay_neutral() {
        let bus = Arc::new(ScriptedBus::new(vec![]));
        let registry = ToolRegistry::new(bus).unwrap();
        assert!(registry.active_tool().is_none());
        assert!(!registry.is_initialized());
    }
}
