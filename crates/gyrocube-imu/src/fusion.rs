use crate::types::{FusionParams, Orientation, SensorEvent, SensorKind, SensorSample};
use glam::Vec3;

/// Below this magnitude the tilt equations are treated as degenerate.
const MIN_TILT_MAGNITUDE: f32 = 1e-6;

const NANOS_PER_SECOND: f64 = 1e9;

/// Callback invoked with every fused estimate.
pub type Observer = Box<dyn FnMut(Orientation) + Send>;

/// Recursive filter state carried between gyroscope samples.
#[derive(Debug, Clone, Copy, Default)]
struct FilterState {
    filtered_accel: Vec3,
    /// Gyro-integrated (roll, pitch) from the previous step.
    prev_gyro_angle: [f32; 2],
    high_pass_gyro_angle: [f32; 2],
    /// Last emitted estimate. Base of the next gyro integration.
    orientation: Orientation,
    /// `None` until the first gyroscope sample after an accelerometer sample.
    last_timestamp: Option<i64>,
}

impl FilterState {
    fn is_finite(&self) -> bool {
        let o = self.orientation;
        self.filtered_accel.is_finite()
            && self.prev_gyro_angle.iter().all(|v| v.is_finite())
            && self.high_pass_gyro_angle.iter().all(|v| v.is_finite())
            && o.roll.is_finite()
            && o.pitch.is_finite()
            && o.yaw.is_finite()
    }
}

/// Complementary-filter orientation estimator.
///
/// Accelerometer samples are bias-corrected and low-pass filtered into a
/// gravity tilt estimate. Gyroscope samples are integrated and high-pass
/// filtered. The two are blended into roll/pitch on every gyroscope sample;
/// yaw is integrated gyro only and drifts.
///
/// The estimator is not synchronized. Drive it from a single thread.
pub struct OrientationEstimator {
    params: FusionParams,
    /// Latest bias-corrected accelerometer reading.
    accel: Option<Vec3>,
    /// Latest gyroscope reading (rad/s).
    gyro: Option<Vec3>,
    state: FilterState,
    observer: Option<Observer>,
}

impl OrientationEstimator {
    pub fn new(params: FusionParams) -> Self {
        Self {
            params,
            accel: None,
            gyro: None,
            state: FilterState::default(),
            observer: None,
        }
    }

    /// Builder-style variant of [`set_observer`](Self::set_observer).
    pub fn with_observer(mut self, observer: impl FnMut(Orientation) + Send + 'static) -> Self {
        self.set_observer(observer);
        self
    }

    /// Register the callback notified after each fusion step. Replaces any
    /// previous observer.
    pub fn set_observer(&mut self, observer: impl FnMut(Orientation) + Send + 'static) {
        self.observer = Some(Box::new(observer));
    }

    /// Last emitted estimate (zero before the first emission).
    pub fn orientation(&self) -> Orientation {
        self.state.orientation
    }

    /// Latest bias-corrected accelerometer reading.
    pub fn latest_accel(&self) -> Option<Vec3> {
        self.accel
    }

    /// Latest gyroscope reading (rad/s).
    pub fn latest_gyro(&self) -> Option<Vec3> {
        self.gyro
    }

    /// Whether a gyroscope sample has seeded the integration clock.
    pub fn is_seeded(&self) -> bool {
        self.state.last_timestamp.is_some()
    }

    /// Store a new accelerometer reading. Never emits.
    pub fn on_accelerometer(&mut self, sample: SensorSample) {
        if !sample.is_finite() {
            tracing::warn!(?sample, "Dropping non-finite accelerometer sample");
            return;
        }
        let corrected = sample.value - self.params.accel_bias;
        if !corrected.is_finite() {
            tracing::warn!(?sample, "Bias correction overflowed, dropping accelerometer sample");
            return;
        }
        self.accel = Some(corrected);
    }

    /// Store a new gyroscope reading and run the fusion step.
    ///
    /// Returns the estimate handed to the observer, or `None` while the
    /// estimator is still waiting for an accelerometer sample or seeding its
    /// clock.
    pub fn on_gyroscope(&mut self, sample: SensorSample) -> Option<Orientation> {
        if !sample.is_finite() {
            tracing::warn!(?sample, "Dropping non-finite gyroscope sample");
            return None;
        }
        self.gyro = Some(sample.value);

        let accel = self.accel?;
        let orientation = self.fuse(accel, sample.value, sample.timestamp)?;

        if let Some(observer) = self.observer.as_mut() {
            observer(orientation);
        }
        Some(orientation)
    }

    /// Route a tagged event to the matching ingestion entry point.
    pub fn on_event(&mut self, event: SensorEvent) -> Option<Orientation> {
        match event.kind {
            SensorKind::Accelerometer => {
                self.on_accelerometer(event.sample);
                None
            }
            SensorKind::Gyroscope => self.on_gyroscope(event.sample),
        }
    }

    /// Zero all filter state and forget stored samples. The next gyroscope
    /// sample after an accelerometer sample re-seeds the clock.
    pub fn reset(&mut self) {
        self.accel = None;
        self.gyro = None;
        self.state = FilterState::default();
        tracing::info!("Orientation filter reset");
    }

    fn fuse(&mut self, accel: Vec3, gyro: Vec3, timestamp: i64) -> Option<Orientation> {
        let params = &self.params;
        let state = &mut self.state;

        let Some(last) = state.last_timestamp else {
            state.last_timestamp = Some(timestamp);
            tracing::debug!(timestamp, "Seeded gyroscope clock");
            return None;
        };

        let elapsed = timestamp.saturating_sub(last);
        if elapsed <= 0 {
            tracing::debug!(elapsed, "Non-increasing gyroscope timestamp, using dt = 0");
        }
        let dt = (elapsed.max(0) as f64 / NANOS_PER_SECOND) as f32;

        // Work on a copy; only a fully finite step is committed.
        let mut next = *state;
        next.last_timestamp = Some(timestamp);

        next.filtered_accel =
            state.filtered_accel * params.lp_alpha + accel * (1.0 - params.lp_alpha);
        let (accel_roll, accel_pitch) = tilt_angles(next.filtered_accel);

        let delta = gyro * dt * (180.0 / std::f32::consts::PI);
        let previous = state.orientation;
        let gyro_angle = [previous.roll + delta.x, previous.pitch + delta.y];
        let gyro_yaw = previous.yaw + delta.z;

        for i in 0..2 {
            next.high_pass_gyro_angle[i] = params.hp_alpha
                * (state.high_pass_gyro_angle[i] + gyro_angle[i] - state.prev_gyro_angle[i]);
            next.prev_gyro_angle[i] = gyro_angle[i];
        }

        let alpha = params.complementary_alpha;
        next.orientation = Orientation {
            roll: alpha * next.high_pass_gyro_angle[0] + (1.0 - alpha) * accel_roll,
            pitch: alpha * next.high_pass_gyro_angle[1] + (1.0 - alpha) * accel_pitch,
            yaw: gyro_yaw,
        };

        if !next.is_finite() {
            tracing::warn!(dt, ?gyro, "Fusion step overflowed, keeping previous estimate");
            return None;
        }
        *state = next;

        let orientation = next.orientation;
        tracing::trace!(
            dt,
            roll = orientation.roll,
            pitch = orientation.pitch,
            yaw = orientation.yaw,
            "Fused orientation"
        );
        Some(orientation)
    }
}

/// Roll and pitch in degrees from a gravity vector.
///
/// Uses `atan` over a magnitude, so both angles stay within [-90, 90].
pub(crate) fn tilt_angles(accel: Vec3) -> (f32, f32) {
    let roll = tilt_degrees(accel.y, (accel.x * accel.x + accel.z * accel.z).sqrt());
    let pitch = tilt_degrees(-accel.x, (accel.y * accel.y + accel.z * accel.z).sqrt());
    (roll, pitch)
}

fn tilt_degrees(numerator: f32, magnitude: f32) -> f32 {
    if magnitude < MIN_TILT_MAGNITUDE {
        // Axis pair carries no gravity: saturate toward the numerator's sign.
        if numerator.abs() < MIN_TILT_MAGNITUDE {
            0.0
        } else {
            90.0_f32.copysign(numerator)
        }
    } else {
        (numerator / magnitude).atan().to_degrees()
    }
}
