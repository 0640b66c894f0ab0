use std::f64::consts::TAU;
use std::time::Duration;

/// Sine waveform `amplitude * sin(2π * frequency * t + phase) + offset`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Waveform {
    pub amplitude: f64,
    pub frequency_hz: f64,
    pub phase: f64,
    pub offset: f64,
}

impl Default for Waveform {
    /// Slow 0.5 Hz swell across the full `[0, 1]` range
    fn default() -> Self {
        Self {
            amplitude: 0.5,
            frequency_hz: 0.5,
            phase: 0.0,
            offset: 0.5,
        }
    }
}

impl Waveform {
    /// Value at `t` seconds
    pub fn sample(&self, t: f64) -> f64 {
        self.amplitude * (TAU * self.frequency_hz * t + self.phase).sin() + self.offset
    }

    pub fn sample_at(&self, elapsed: Duration) -> f64 {
        self.sample(elapsed.as_secs_f64())
    }

    /// Period in seconds
    pub fn period(&self) -> f64 {
        1.0 / self.frequency_hz
    }

    pub fn min(&self) -> f64 {
        self.offset - self.amplitude.abs()
    }

    pub fn max(&self) -> f64 {
        self.offset + self.amplitude.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn default_waveform_spans_unit_range() {
        let wave = Waveform::default();
        assert!((wave.sample(0.0) - 0.5).abs() < EPSILON);
        assert!((wave.sample(0.5) - 1.0).abs() < EPSILON);
        assert!((wave.sample(1.5) - 0.0).abs() < EPSILON);
        assert!((wave.period() - 2.0).abs() < EPSILON);
        assert_eq!(wave.min(), 0.0);
        assert_eq!(wave.max(), 1.0);
    }

    #[test]
    fn sample_at_matches_seconds() {
        let wave = Waveform::default();
        let value = wave.sample_at(Duration::from_millis(250));
        assert!((value - wave.sample(0.25)).abs() < EPSILON);
    }

    proptest! {
        #[test]
        fn waveform_is_periodic(t in 0.0f64..1_000.0, cycles in 1u32..5) {
            let wave = Waveform::default();
            let shifted = t + wave.period() * f64::from(cycles);
            prop_assert!((wave.sample(t) - wave.sample(shifted)).abs() < 1e-6);
        }

        #[test]
        fn waveform_stays_within_bounds(
            t in -1_000.0f64..1_000.0,
            amplitude in 0.0f64..0.5,
            frequency_hz in 0.01f64..20.0,
            phase in -10.0f64..10.0,
        ) {
            let wave = Waveform { amplitude, frequency_hz, phase, offset: 0.5 };
            let value = wave.sample(t);
            prop_assert!(value >= wave.min() - EPSILON);
            prop_assert!(value <= wave.max() + EPSILON);
        }
    }
}
