//! Controller subsystem for gamepad monitoring
//!
//! 1. [`listener`] - applies connect/disconnect events to the registry
//! 2. [`registry`] - tracked devices under a single lock
//! 3. [`poll_loop`] - periodic readings, edge detection and haptics
//! 4. [`controller_handle`] - spawning and shutdown of the above
//!
//! # Architecture
//!
//! ```text
//! Platform ──► Poll Loop ──[ConnectionEvent]──► Listener ──► Registry
//!                  │                                            ▲
//!                  └───────────── for_each per tick ────────────┘
//! ```

pub mod controller_handle;
pub mod device;
pub mod edge;
pub mod listener;
pub mod poll_loop;
pub mod registry;

pub use controller_handle::{ControllerError, ControllerHandle, ControllerSettings};
pub use device::{DeviceHandle, DeviceInfo, TrackedDevice, VidPid};
pub use listener::{ConnectionEvent, ConnectionListener};
pub use poll_loop::{PollLoop, PollReport, PollStats, TickOutcome};
pub use registry::{AddOutcome, DeviceRegistry};
