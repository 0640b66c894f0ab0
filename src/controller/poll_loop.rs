//! Poll Loop - fixed or randomized interval polling of all tracked devices
//!
//! # State Machine
//!
//! ```text
//! Idle ──start──► Running ──run_until_cancelled──► Stopped(PollStats)
//! ```
//!
//! Each tick pumps the platform, forwards connection changes to the listener
//! channel, then walks the registry under its lock: new readings, rising edges
//! and haptic commands are collected there and only logged / written to the
//! platform once the lock is released. Ticks that overrun simply delay the
//! next one; there is no catch-up.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use statum::{machine, state};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::controller_handle::ControllerSettings;
use super::device::DeviceHandle;
use super::listener::ConnectionEvent;
use super::registry::DeviceRegistry;
use crate::config::PollMode;
use crate::haptics::{HapticChannel, Vibration};
use crate::platform::{ButtonType, InputBackend};

/// Something a tick observed, logged after the registry lock is released
#[derive(Clone, Debug, PartialEq)]
pub enum PollReport {
    Reading {
        name: String,
        timestamp: u64,
        button: ButtonType,
        pressed: bool,
    },
    RisingEdge {
        name: String,
        button: ButtonType,
    },
    ChannelSelected {
        name: String,
        slot: u8,
        channel: Option<HapticChannel>,
    },
}

impl fmt::Display for PollReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollReport::Reading {
                name,
                timestamp,
                button,
                pressed,
            } => write!(
                f,
                "{}: Timestamp={}, Pressed{}={}",
                name,
                timestamp,
                button,
                u8::from(*pressed)
            ),
            PollReport::RisingEdge { name, button } => write!(f, "{}: {} pressed", name, button),
            PollReport::ChannelSelected {
                name,
                slot,
                channel: Some(channel),
            } => write!(f, "{}: haptic channel -> {} (slot {})", name, channel, slot),
            PollReport::ChannelSelected {
                name,
                slot,
                channel: None,
            } => write!(f, "{}: haptic channel -> none (slot {})", name, slot),
        }
    }
}

/// Result of a single tick
#[derive(Clone, Debug, Default)]
pub struct TickOutcome {
    pub reports: Vec<PollReport>,
    /// Vibration commands in the order they were written
    pub commands: Vec<(DeviceHandle, Vibration)>,
    /// Tracked devices the platform had no reading for
    pub skipped: usize,
    pub failed_writes: usize,
    pub duration: Duration,
}

/// Counters over the lifetime of a poll loop
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PollStats {
    pub ticks: u64,
    pub readings: u64,
    pub edges: u64,
    pub vibration_writes: u64,
    pub failed_writes: u64,
    pub busy: Duration,
}

impl PollStats {
    fn record(&mut self, outcome: &TickOutcome) {
        self.ticks += 1;
        for report in &outcome.reports {
            match report {
                PollReport::Reading { .. } => self.readings += 1,
                PollReport::RisingEdge { .. } => self.edges += 1,
                PollReport::ChannelSelected { .. } => {}
            }
        }
        self.vibration_writes += outcome.commands.len() as u64;
        self.failed_writes += outcome.failed_writes as u64;
        self.busy += outcome.duration;
    }

    pub fn average_tick(&self) -> Duration {
        match u32::try_from(self.ticks) {
            Ok(0) => Duration::ZERO,
            Ok(ticks) => self.busy / ticks,
            Err(_) => Duration::ZERO,
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum PollState {
    Idle,
    Running,
    Stopped(PollStats),
}

#[machine]
pub struct PollLoop<S: PollState> {
    // Platform input, owned by the poll thread
    backend: Box<dyn InputBackend>,

    registry: Arc<DeviceRegistry>,

    // Connection changes go to the listener, never straight into the registry
    event_sender: mpsc::Sender<ConnectionEvent>,

    settings: ControllerSettings,

    stats: PollStats,

    // Time base of the haptic waveform
    started_at: Instant,
}

impl<S: PollState> PollLoop<S> {
    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    fn forward(&self, event: ConnectionEvent) {
        debug!("Forwarding connection event: {:?}", event);
        if let Err(e) = self.event_sender.blocking_send(event) {
            warn!("Connection listener is gone, dropping event: {:?}", e.0);
        }
    }
}

impl PollLoop<Idle> {
    pub fn create(
        backend: Box<dyn InputBackend>,
        registry: Arc<DeviceRegistry>,
        event_sender: mpsc::Sender<ConnectionEvent>,
        settings: Option<ControllerSettings>,
    ) -> Self {
        let settings = settings.unwrap_or_default();
        debug!("Creating poll loop with settings: {:?}", settings);
        Self::new(
            backend,
            registry,
            event_sender,
            settings,
            PollStats::default(),
            Instant::now(),
        )
    }

    /// Announces the devices that are already connected and starts the clock
    pub fn start(mut self) -> PollLoop<Running> {
        let devices = self.backend.connected_devices();
        if devices.is_empty() {
            info!("No controller connected, waiting for one");
        } else {
            info!("Found {} connected controllers", devices.len());
        }
        for (handle, info) in devices {
            self.forward(ConnectionEvent::Connected { handle, info });
        }

        self.started_at = Instant::now();
        debug!("Poll loop transitioning to Running state");
        self.transition()
    }
}

impl PollLoop<Running> {
    pub fn tick(&mut self) -> TickOutcome {
        let elapsed = self.started_at.elapsed();
        self.tick_at(elapsed)
    }

    /// Runs one tick with the waveform evaluated at `elapsed`
    pub fn tick_at(&mut self, elapsed: Duration) -> TickOutcome {
        let tick_start = Instant::now();

        for event in self.backend.pump() {
            self.forward(event);
        }

        let mut outcome = TickOutcome::default();
        let backend = &self.backend;
        let settings = &self.settings;
        let level = settings.waveform.sample_at(elapsed);

        self.registry.for_each(|device| {
            let Some(reading) = backend.reading(device.handle) else {
                outcome.skipped += 1;
                return;
            };
            let pressed = reading.is_pressed(settings.tracked_button);

            if reading.timestamp != device.last_timestamp {
                if settings.mode == PollMode::Timestamps {
                    outcome.reports.push(PollReport::Reading {
                        name: device.name.clone(),
                        timestamp: reading.timestamp,
                        button: settings.tracked_button,
                        pressed,
                    });
                }
                device.last_timestamp = reading.timestamp;
            }

            let rising = device.edge.update(pressed);

            match settings.mode {
                PollMode::Timestamps => {}
                PollMode::Edges => {
                    if rising {
                        outcome.reports.push(PollReport::RisingEdge {
                            name: device.name.clone(),
                            button: settings.tracked_button,
                        });
                    }
                }
                PollMode::Haptics => {
                    if rising {
                        let channel = device.selector.advance();
                        outcome.reports.push(PollReport::RisingEdge {
                            name: device.name.clone(),
                            button: settings.tracked_button,
                        });
                        outcome.reports.push(PollReport::ChannelSelected {
                            name: device.name.clone(),
                            slot: device.selector.slot(),
                            channel,
                        });
                    }

                    let before = device.vibration;
                    let channel = device.selector.channel();
                    match channel {
                        Some(channel) => device.vibration.drive(
                            channel,
                            level,
                            settings.reset_inactive_channels,
                        ),
                        None if settings.reset_inactive_channels => {
                            device.vibration = Vibration::default();
                        }
                        None => {}
                    }
                    if channel.is_some() || device.vibration != before {
                        outcome.commands.push((device.handle, device.vibration));
                    }
                }
            }
        });

        for report in &outcome.reports {
            info!("{}", report);
        }

        for (handle, vibration) in &outcome.commands {
            if let Err(e) = self.backend.set_vibration(*handle, vibration) {
                warn!("Failed to write vibration to device {}: {}", handle, e);
                outcome.failed_writes += 1;
            }
        }

        outcome.duration = tick_start.elapsed();
        debug!(
            "Tick finished in {:.3} ms: {} reports, {} commands, {} skipped",
            outcome.duration.as_secs_f64() * 1000.0,
            outcome.reports.len(),
            outcome.commands.len(),
            outcome.skipped
        );

        self.stats.record(&outcome);
        outcome
    }

    /// Polls until `token` is cancelled.
    ///
    /// The token is checked once per iteration, before each tick, so a stop
    /// request is observed after at most one tick plus one sleep.
    pub fn run_until_cancelled(mut self, token: &CancellationToken) -> PollLoop<Stopped> {
        info!(
            "Starting poll loop: mode={:?}, button={}, interval={:?}",
            self.settings.mode, self.settings.tracked_button, self.settings.interval
        );

        let mut rng = rand::thread_rng();
        let stats_interval = chrono::Duration::from_std(self.settings.stats_interval)
            .unwrap_or_else(|_| chrono::Duration::seconds(10));
        let mut window = PollStats::default();
        let mut window_start = Local::now();

        loop {
            if token.is_cancelled() {
                info!("Stop requested, leaving poll loop");
                break;
            }

            let outcome = self.tick();
            window.record(&outcome);

            let now = Local::now();
            if now - window_start > stats_interval {
                info!(
                    "Poll stats since {}: {} ticks, {} readings, {} edges, {} vibration writes, avg tick {:.3} ms",
                    window_start.format("%H:%M:%S"),
                    window.ticks,
                    window.readings,
                    window.edges,
                    window.vibration_writes,
                    window.average_tick().as_secs_f64() * 1000.0
                );
                window = PollStats::default();
                window_start = now;
            }

            std::thread::sleep(self.settings.interval.next_delay(&mut rng));
        }

        self.silence();

        let stats = self.stats.clone();
        info!("Poll loop stopped after {} ticks", stats.ticks);
        self.transition_with(stats)
    }

    // Motors keep running on their last command, so zero every driven device.
    fn silence(&mut self) {
        if self.settings.mode != PollMode::Haptics {
            return;
        }

        let mut handles = Vec::new();
        self.registry.for_each(|device| {
            if !device.vibration.is_idle() {
                device.vibration = Vibration::default();
                handles.push(device.handle);
            }
        });

        for handle in handles {
            if let Err(e) = self.backend.set_vibration(handle, &Vibration::default()) {
                warn!("Failed to stop vibration on device {}: {}", handle, e);
            }
        }
    }
}

impl PollLoop<Stopped> {
    pub fn stats(&self) -> PollStats {
        self.get_state_data().cloned().unwrap_or_default()
    }
}
