//! padwatch - game controller monitor with haptic feedback
//!
//! Polls connected gamepads, reports connect/disconnect events and new input
//! readings, detects rising edges on a tracked button and can drive the four
//! vibration channels of a controller with a sine waveform.
//!
//! ```text
//! Platform ──► Poll Loop ──► ConnectionEvent ──► Listener ──► Registry
//!                 │                                              ▲
//!                 └──────────── readings / vibration ────────────┘
//! ```

pub mod config;
pub mod controller;
pub mod haptics;
pub mod platform;
