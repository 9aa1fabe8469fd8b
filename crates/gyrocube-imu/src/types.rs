use glam::Vec3;

/// One reading from the platform sensor subsystem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    /// Accelerometer: m/s^2. Gyroscope: rad/s.
    pub value: Vec3,
    /// Monotonic timestamp in nanoseconds.
    pub timestamp: i64,
}

impl SensorSample {
    pub fn new(x: f32, y: f32, z: f32, timestamp: i64) -> Self {
        Self {
            value: Vec3::new(x, y, z),
            timestamp,
        }
    }

    /// Whether every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.value.is_finite()
    }
}

/// Which sensor produced a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
}

/// A tagged sample as delivered on the multiplexed sensor feed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorEvent {
    pub kind: SensorKind,
    pub sample: SensorSample,
}

/// Fused orientation output, Euler angles in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Orientation {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

/// Tuning for the complementary filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionParams {
    /// Per-axis offset subtracted from every accelerometer sample.
    pub accel_bias: Vec3,
    /// Accelerometer low-pass weight. Closer to 1 = smoother, slower.
    pub lp_alpha: f32,
    /// Gyro high-pass weight applied to integrated roll/pitch.
    pub hp_alpha: f32,
    /// Weight of the high-passed gyro angle in the final roll/pitch blend.
    pub complementary_alpha: f32,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            accel_bias: Vec3::ZERO,
            lp_alpha: 0.7,
            hp_alpha: 0.7,
            complementary_alpha: 0.02,
        }
    }
}
