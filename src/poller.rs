//! Background polling loop decoding hardware-bus messages.
//!
//! One dedicated thread owns the receive side of the bus for the session
//! lifetime, turning inbound messages into `PoseStore` mutations and
//! forwarding the resulting change events to an [`EventSink`] outside the
//! store's lock. Outbound control messages are serialized by a send lock
//! so any thread may issue commands concurrently with polling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::bus::HardwareBus;
use crate::error::TrackError;
use crate::protocol::{
    self, SIG_BEGIN, SIG_IDLE, SIG_PAUSE, SIG_START_TRACKING, SIG_SYSTEM_DISCOVERED,
    SIG_TOOL_POSITION, SIG_TOOL_REQUEST,
};
use crate::store::{PoseStore, StoreEvent};
use crate::Result;

/// Backoff while the hardware reports nothing pending.
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Consumer of store change events and the disconnect condition.
///
/// Called on the poller thread, after the store lock has been released.
pub trait EventSink: Send + Sync {
    fn on_tool_added(&self, uid: &str);
    fn on_visibility_changed(&self, uid: &str);
    fn on_pose_changed(&self, uid: &str);
    /// The bus receive side closed; the poll loop is about to exit.
    fn on_disconnected(&self);
}

/// Bus connection plus the lock guaranteeing at-most-one in-flight write.
///
/// Never held while the store lock is held: the poll loop decodes without
/// taking it, and control sends touch nothing but the bus.
struct BusLink {
    bus: Arc<dyn HardwareBus>,
    send_lock: Mutex<()>,
}

impl BusLink {
    fn send_control(&self, id: i32, args: &[i32]) {
        let _guard = self.send_lock.lock().unwrap();
        self.bus.begin_message(id);
        for &arg in args {
            self.bus.append_int(arg);
        }
        self.bus.send_message();
    }
}

/// Owns the sole connection to the hardware bus and the background thread
/// that drains it.
pub struct TrackingPoller {
    link: Arc<BusLink>,
    store: Arc<PoseStore>,
    stop_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl TrackingPoller {
    /// Spawn the poll thread, wiring store change events to `sink`.
    pub fn spawn(
        bus: Arc<dyn HardwareBus>,
        store: Arc<PoseStore>,
        events: Receiver<StoreEvent>,
        sink: Arc<dyn EventSink>,
    ) -> Result<TrackingPoller> {
        let link = Arc::new(BusLink {
            bus,
            send_lock: Mutex::new(()),
        });
        let stop_flag = Arc::new(AtomicBool::new(false));

        let thread = {
            let link = link.clone();
            let store = store.clone();
            let stop = stop_flag.clone();
            std::thread::Builder::new()
                .name("nav-poller".into())
                .spawn(move || poll_loop(link, store, events, sink, stop))
                .map_err(|e| TrackError::Thread(e.to_string()))?
        };

        Ok(TrackingPoller {
            link,
            store,
            stop_flag,
            thread: Some(thread),
        })
    }

    /// Send the session "begin" control message.
    pub fn initialize(&self) {
        self.link.send_control(SIG_BEGIN, &[]);
    }

    /// Start pose streaming on every known tracking system.
    pub fn start_tracking(&self) {
        for system_id in self.store.list_systems() {
            self.link.send_control(SIG_START_TRACKING, &[system_id]);
        }
    }

    /// Pause pose streaming on every known tracking system.
    pub fn stop_tracking(&self) {
        for system_id in self.store.list_systems() {
            self.link.send_control(SIG_PAUSE, &[system_id]);
        }
    }

    /// Whether the poll loop is still running.
    pub fn is_active(&self) -> bool {
        !self.stop_flag.load(Ordering::Relaxed)
    }

    /// Request the poll loop to quit and wait for the thread to finish.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for TrackingPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Forward queued store events to the sink, preserving channel order.
fn dispatch_pending(events: &Receiver<StoreEvent>, sink: &dyn EventSink) {
    for event in events.try_iter() {
        log::trace!("dispatching {event:?}");
        match event {
            StoreEvent::ToolAdded(uid) => sink.on_tool_added(&uid),
            StoreEvent::VisibilityChanged(uid) => sink.on_visibility_changed(&uid),
            StoreEvent::PoseChanged(uid) => sink.on_pose_changed(&uid),
        }
    }
}

/// The poll loop runs on its own thread until stopped or disconnected.
///
/// Bad data never ends the loop: malformed or short reads are dropped and
/// unrecognized signal ids are ignored.
fn poll_loop(
    link: Arc<BusLink>,
    store: Arc<PoseStore>,
    events: Receiver<StoreEvent>,
    sink: Arc<dyn EventSink>,
    stop_flag: Arc<AtomicBool>,
) {
    log::info!("tracking poller started");

    loop {
        if stop_flag.load(Ordering::Relaxed) {
            log::info!("tracking poller stopping (stop requested)");
            break;
        }

        let id = match link.bus.next_signal_id() {
            Some(id) => id,
            None => {
                log::warn!("hardware bus disconnected, tracking stopped");
                stop_flag.store(true, Ordering::Relaxed);
                sink.on_disconnected();
                break;
            }
        };

        match id {
            SIG_IDLE => {
                std::thread::sleep(IDLE_BACKOFF);
            }
            SIG_SYSTEM_DISCOVERED => match link.bus.read_int() {
                Some(system_id) => {
                    if store.register_system(system_id) {
                        link.send_control(protocol::SIG_INIT, &[system_id]);
                        link.send_control(SIG_TOOL_REQUEST, &[system_id]);
                    }
                }
                None => log::debug!("short system-discovered message dropped"),
            },
            SIG_TOOL_POSITION => match protocol::read_tool_position(&*link.bus) {
                Some(msg) => {
                    store.update_pose(msg.system_id, msg.tool_id, msg.status, msg.pose);
                }
                None => log::debug!("malformed tool-position message dropped"),
            },
            other => {
                log::trace!("ignoring unrecognized signal id {other}");
            }
        }

        dispatch_pending(&events, &*sink);
    }

    // Deliver whatever the last mutation produced before exiting.
    dispatch_pending(&events, &*sink);
}
