//! # navtrack - Tool-tracking core for surgical navigation
//!
//! Keeps the latest pose and visibility of every tracked tool (pointers,
//! probes, reference frames) reported by an external tracking subsystem,
//! and publishes changes to the application with low latency. Safe under
//! concurrent access from a UI thread and the hardware-polling thread.
//!
//! Three cooperating pieces:
//! - [`PoseStore`](store::PoseStore): thread-safe per-tool state with
//!   change-detection-based event emission
//! - [`TrackingPoller`](poller::TrackingPoller): background thread that
//!   decodes bus messages into store mutations
//! - [`ToolRegistry`]: owns both, hands out per-tool [`ToolFacade`]
//!   handles, and republishes changes as UI-facing notifications
//!
//! ## Quick Start
//! ```no_run
//! use navtrack::{HardwareBus, Notification, ToolRegistry};
//! use std::sync::Arc;
//!
//! fn run(bus: Arc<dyn HardwareBus>) -> navtrack::Result<()> {
//!     let registry = ToolRegistry::new(bus)?;
//!     registry.initialize();
//!     registry.start_tracking();
//!
//!     for notification in registry.notifications().iter() {
//!         match notification {
//!             Notification::TransformAndTimestamp { uid, pose, .. } => {
//!                 println!("{uid} moved: {:?}", pose.0);
//!             }
//!             Notification::Visible { uid, visible } => {
//!                 println!("{uid} visible: {visible}");
//!             }
//!             Notification::TrackingStopped => break,
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod bus;
pub mod error;
pub mod facade;
pub mod poller;
pub mod protocol;
pub mod registry;
pub mod store;
pub mod types;

pub use bus::HardwareBus;
pub use error::TrackError;
pub use facade::ToolFacade;
pub use poller::TrackingPoller;
pub use registry::ToolRegistry;
pub use store::{PoseStore, StoreEvent};
pub use types::{Notification, ToolIdentity, ToolKind, Transform};

/// Result type alias for tracking-core operations.
pub type Result<T> = std::result::Result<T, TrackError>;
