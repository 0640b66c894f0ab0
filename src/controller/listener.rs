//! Connection Listener
//!
//! Consumes connect/disconnect notifications from an mpsc channel and applies
//! them to the [`DeviceRegistry`]. The poll thread only ever sends into the
//! channel, so notification delivery never waits on the registry lock held by
//! a poll tick.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::device::{DeviceHandle, DeviceInfo};
use super::registry::{AddOutcome, DeviceRegistry};

/// Platform notification about a device coming or going
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected {
        handle: DeviceHandle,
        info: DeviceInfo,
    },
    Disconnected {
        handle: DeviceHandle,
    },
}

/// What applying a [`ConnectionEvent`] changed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionChange {
    Connected { handle: DeviceHandle, line: String },
    Disconnected { handle: DeviceHandle, line: String },
    Unchanged,
}

impl fmt::Display for ConnectionChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionChange::Connected { line, .. }
            | ConnectionChange::Disconnected { line, .. } => f.write_str(line),
            ConnectionChange::Unchanged => f.write_str("unchanged"),
        }
    }
}

pub struct ConnectionListener;

impl ConnectionListener {
    /// Applies one event to the registry. Nothing is logged here.
    pub fn apply(registry: &DeviceRegistry, event: ConnectionEvent) -> ConnectionChange {
        match event {
            ConnectionEvent::Connected { handle, info } => match registry.add(handle, info) {
                AddOutcome::Added { name, vid_pid } => ConnectionChange::Connected {
                    handle,
                    line: format!("Connected: {} {}", name, vid_pid),
                },
                AddOutcome::AlreadyTracked => ConnectionChange::Unchanged,
            },
            ConnectionEvent::Disconnected { handle } => match registry.remove(handle) {
                Some(device) => ConnectionChange::Disconnected {
                    handle,
                    line: format!("Disconnected: {}", device.name),
                },
                None => ConnectionChange::Unchanged,
            },
        }
    }

    /// Spawns the listener task.
    ///
    /// Runs until the sending side is dropped or `token` is cancelled.
    pub fn spawn(
        registry: Arc<DeviceRegistry>,
        mut receiver: mpsc::Receiver<ConnectionEvent>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Connection listener started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Connection listener cancelled");
                        break;
                    }
                    event = receiver.recv() => {
                        let Some(event) = event else {
                            debug!("Connection event channel closed");
                            break;
                        };
                        debug!("Received connection event: {:?}", event);
                        match Self::apply(&registry, event) {
                            ConnectionChange::Unchanged => {}
                            change => info!("{}", change),
                        }
                    }
                }
            }
            info!("Connection listener stopped");
        })
    }
}
