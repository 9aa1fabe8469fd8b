use anyhow::{bail, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Rate at which the consumer samples the latest orientation (Hz).
    pub render_hz: u32,
    /// IMU configuration.
    pub imu: ImuConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            render_hz: 60,
            imu: ImuConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.render_hz == 0 {
            bail!("render_hz must be greater than zero");
        }
        self.imu.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImuConfig {
    /// `host:port` of the sensor bridge streaming accelerometer/gyro frames.
    pub stream_addr: String,
    /// Accelerometer offset (m/s^2), calibrated offline for one device mount.
    #[serde(with = "vec3_serde")]
    pub accel_bias: Vec3,
    /// Accelerometer low-pass weight. Higher = smoother, slower.
    pub lp_alpha: f32,
    /// Gyro high-pass weight on integrated roll/pitch.
    pub hp_alpha: f32,
    /// Gyro share of the final roll/pitch. Small values let the
    /// accelerometer dominate the steady state.
    pub complementary_alpha: f32,
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self {
            stream_addr: "127.0.0.1:5555".into(),
            accel_bias: Vec3::ZERO,
            lp_alpha: 0.7,
            hp_alpha: 0.7,
            complementary_alpha: 0.02,
        }
    }
}

impl ImuConfig {
    /// Reject weights outside `[0, 1]` and non-finite bias.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("lp_alpha", self.lp_alpha),
            ("hp_alpha", self.hp_alpha),
            ("complementary_alpha", self.complementary_alpha),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{name} must be within [0, 1], got {value}");
            }
        }
        if !self.accel_bias.is_finite() {
            bail!("accel_bias must be finite, got {}", self.accel_bias);
        }
        Ok(())
    }
}

// Serde helper: store glam vectors as plain TOML arrays.
mod vec3_serde {
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Vec3, s: S) -> Result<S::Ok, S::Error> {
        [v.x, v.y, v.z].serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec3, D::Error> {
        let [x, y, z] = <[f32; 3]>::deserialize(d)?;
        Ok(Vec3::new(x, y, z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn bias_is_a_toml_array() {
        let config = ImuConfig {
            accel_bias: Vec3::new(0.5, -0.25, 0.0),
            ..ImuConfig::default()
        };
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("accel_bias = ["), "{text}");

        let parsed: ImuConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.accel_bias, config.accel_bias);
    }

    #[test]
    fn out_of_range_alpha_is_rejected() {
        let config = ImuConfig {
            lp_alpha: -0.1,
            ..ImuConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("lp_alpha"));
    }

    #[test]
    fn nan_weight_is_rejected() {
        let config = ImuConfig {
            complementary_alpha: f32::NAN,
            ..ImuConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_render_rate_is_rejected() {
        let config = AppConfig {
            render_hz: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
