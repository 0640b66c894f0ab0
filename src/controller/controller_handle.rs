//! Controller Handle - lifecycle of the controller subsystem
//!
//! Spawns the two moving parts and owns their shutdown:
//!
//! ```text
//! poll thread ─[ConnectionEvent]→ ConnectionListener task ─→ DeviceRegistry
//!      │                                                         ▲
//!      └──────────────── for_each (readings, haptics) ───────────┘
//! ```
//!
//! The platform backend is built by a factory on the poll thread itself, so
//! backends that are not `Send` (gilrs holds platform handles) never cross a
//! thread boundary.

use std::sync::Arc;
use std::thread::JoinHandle as ThreadHandle;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::listener::ConnectionListener;
use super::poll_loop::{PollLoop, PollStats};
use super::registry::DeviceRegistry;
use crate::config::{AppConfig, PollInterval, PollMode};
use crate::haptics::Waveform;
use crate::platform::{ButtonType, InputBackend, PlatformError};

const EVENT_CHANNEL_CAPACITY: usize = 1000;
const POLL_THREAD_NAME: &str = "padwatch-poll";

/// Settings for the whole controller subsystem
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerSettings {
    pub mode: PollMode,
    /// Button whose rising edges are reported and cycle the haptic channel
    pub tracked_button: ButtonType,
    pub interval: PollInterval,
    /// How often the poll loop logs its counters
    pub stats_interval: Duration,
    pub waveform: Waveform,
    pub reset_inactive_channels: bool,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ControllerSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            mode: config.poll.mode,
            tracked_button: config.poll.tracked_button,
            interval: config.poll.interval,
            stats_interval: Duration::from_secs(config.poll.stats_interval_secs),
            waveform: config.haptics.waveform(),
            reset_inactive_channels: config.haptics.reset_inactive_channels,
        }
    }
}

// Controller errors
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Platform error: {0}")]
    PlatformError(#[from] PlatformError),

    #[error("Thread error: {0}")]
    ThreadError(String),

    #[error("Initialization error: {0}")]
    InitializationError(String),
}

/// Handle for the running controller subsystem
pub struct ControllerHandle {
    registry: Arc<DeviceRegistry>,
    token: CancellationToken,
    poll_thread: Option<ThreadHandle<PollStats>>,
    listener_task: Option<JoinHandle<()>>,
}

impl ControllerHandle {
    /// Spawns the connection listener and the poll thread.
    ///
    /// Resolves once the backend has been created on the poll thread; a
    /// backend that fails to initialise is reported here and nothing keeps
    /// running.
    pub async fn spawn<B, F>(
        settings: Option<ControllerSettings>,
        backend_factory: F,
    ) -> Result<Self, ControllerError>
    where
        B: InputBackend + 'static,
        F: FnOnce() -> Result<B, PlatformError> + Send + 'static,
    {
        let settings = settings.unwrap_or_default();
        info!("Initializing controller subsystem with settings: {:?}", settings);

        let registry = Arc::new(DeviceRegistry::new());
        let token = CancellationToken::new();

        let (event_sender, event_receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        debug!(
            "Created connection event channel with capacity {}",
            EVENT_CHANNEL_CAPACITY
        );

        let listener_task =
            ConnectionListener::spawn(registry.clone(), event_receiver, token.child_token());

        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), PlatformError>>();
        let poll_registry = registry.clone();
        let poll_token = token.clone();

        let spawned = std::thread::Builder::new()
            .name(POLL_THREAD_NAME.to_string())
            .spawn(move || {
                let backend = match backend_factory() {
                    Ok(backend) => {
                        let _ = ready_tx.send(Ok(()));
                        backend
                    }
                    Err(e) => {
                        error!("Failed to create input backend: {}", e);
                        let _ = ready_tx.send(Err(e));
                        return PollStats::default();
                    }
                };

                let running =
                    PollLoop::create(Box::new(backend), poll_registry, event_sender, Some(settings))
                        .start();
                running.run_until_cancelled(&poll_token).stats()
            });

        let poll_thread = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                token.cancel();
                return Err(ControllerError::ThreadError(format!(
                    "Failed to spawn poll thread: {}",
                    e
                )));
            }
        };

        let mut handle = Self {
            registry,
            token,
            poll_thread: Some(poll_thread),
            listener_task: Some(listener_task),
        };

        match ready_rx.await {
            Ok(Ok(())) => {
                info!("Controller subsystem started");
                Ok(handle)
            }
            Ok(Err(e)) => {
                handle.stop().await;
                Err(e.into())
            }
            Err(_) => {
                handle.stop().await;
                Err(ControllerError::InitializationError(
                    "poll thread exited before the backend was ready".to_string(),
                ))
            }
        }
    }

    pub fn registry(&self) -> Arc<DeviceRegistry> {
        self.registry.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stops the poll loop, joins its thread and waits for the listener.
    ///
    /// The join has no timeout; the poll loop notices the request at its next
    /// iteration boundary.
    pub async fn shutdown(mut self) -> Result<PollStats, ControllerError> {
        info!("Shutting down controller subsystem");
        self.stop().await.unwrap_or_else(|| {
            Err(ControllerError::ThreadError(
                "poll thread already joined".to_string(),
            ))
        })
    }

    async fn stop(&mut self) -> Option<Result<PollStats, ControllerError>> {
        self.token.cancel();

        let result = match self.poll_thread.take() {
            Some(thread) => {
                let joined = tokio::task::spawn_blocking(move || thread.join()).await;
                Some(match joined {
                    Ok(Ok(stats)) => {
                        debug!("Poll thread joined");
                        Ok(stats)
                    }
                    Ok(Err(_)) => Err(ControllerError::ThreadError(
                        "poll thread panicked".to_string(),
                    )),
                    Err(e) => Err(ControllerError::ThreadError(format!(
                        "Failed to join poll thread: {}",
                        e
                    ))),
                })
            }
            None => None,
        };

        if let Some(task) = self.listener_task.take() {
            if let Err(e) = task.await {
                error!("Connection listener task failed: {}", e);
            }
        }

        result
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        // A handle dropped without shutdown still stops the poll thread
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::device::{DeviceInfo, VidPid};
    use crate::platform::simulated::SimulatedBackend;
    use crate::platform::Buttons;

    fn fast_settings(mode: PollMode) -> ControllerSettings {
        ControllerSettings {
            mode,
            interval: PollInterval::Fixed { fixed_ms: 5 },
            ..ControllerSettings::default()
        }
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    #[test]
    fn settings_follow_config() {
        let mut config = AppConfig::default();
        config.poll.mode = PollMode::Edges;
        config.poll.stats_interval_secs = 3;
        config.haptics.reset_inactive_channels = true;

        let settings = ControllerSettings::from(&config);
        assert_eq!(settings.mode, PollMode::Edges);
        assert_eq!(settings.stats_interval, Duration::from_secs(3));
        assert!(settings.reset_inactive_channels);
        assert_eq!(settings.waveform, Waveform::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn tracks_devices_and_shuts_down() {
        let backend = SimulatedBackend::new();
        let first = backend.connect(DeviceInfo::new("Pad One", VidPid::new(0x045e, 0x02ea)));

        let factory_backend = backend.clone();
        let handle = ControllerHandle::spawn(Some(fast_settings(PollMode::Haptics)), move || {
            Ok(factory_backend)
        })
        .await
        .expect("controller starts");
        let registry = handle.registry();

        assert!(wait_for(|| registry.contains(first)).await);

        let second = backend.connect(DeviceInfo::generic());
        assert!(wait_for(|| registry.len() == 2).await);

        backend.set_buttons(second, Buttons::A);
        assert!(wait_for(|| registry.snapshot().iter().any(|d| d.selector.slot() == 1)).await);

        backend.disconnect(first);
        assert!(wait_for(|| !registry.contains(first)).await);

        let stats = handle.shutdown().await.expect("clean shutdown");
        assert!(stats.ticks > 0);
        assert!(stats.edges >= 1);
        assert!(backend.vibration(second).unwrap_or_default().is_idle());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn backend_failure_is_reported() {
        let result = ControllerHandle::spawn(None, || -> Result<SimulatedBackend, PlatformError> {
            Err(PlatformError::InitializationError("no input service".to_string()))
        })
        .await;

        assert!(matches!(
            result,
            Err(ControllerError::PlatformError(
                PlatformError::InitializationError(_)
            ))
        ));
    }
}
