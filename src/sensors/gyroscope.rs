//! Gyroscope sensor types and configuration
//!
//! Provides the full-scale ranges and unit conversion for the ICM-42670's
//! 3-axis gyroscope.

use core::f32::consts::PI;

/// Gyroscope full-scale range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GyroRange {
    /// ±250 dps (most sensitive, least range)
    Dps250,
    /// ±500 dps
    Dps500,
    /// ±1000 dps
    Dps1000,
    /// ±2000 dps (least sensitive, most range)
    #[default]
    Dps2000,
}

impl GyroRange {
    /// `GYRO_CONFIG0.gyro_fs_sel` value
    #[must_use]
    pub const fn fs_sel(self) -> u8 {
        match self {
            Self::Dps2000 => 0,
            Self::Dps1000 => 1,
            Self::Dps500 => 2,
            Self::Dps250 => 3,
        }
    }

    /// Decode `GYRO_CONFIG0.gyro_fs_sel`
    #[must_use]
    pub const fn from_fs_sel(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Dps2000,
            1 => Self::Dps1000,
            2 => Self::Dps500,
            _ => Self::Dps250,
        }
    }

    /// Full-scale value in dps
    #[must_use]
    pub const fn max_value(self) -> u16 {
        match self {
            Self::Dps250 => 250,
            Self::Dps500 => 500,
            Self::Dps1000 => 1000,
            Self::Dps2000 => 2000,
        }
    }

    /// Get the sensitivity in LSB/dps
    #[must_use]
    pub fn sensitivity(self, high_resolution: bool) -> f32 {
        let full_scale_lsb = if high_resolution { 524_288.0 } else { 32_768.0 };
        full_scale_lsb / f32::from(self.max_value())
    }
}

/// Gyroscope data in degrees per second
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GyroData {
    /// X-axis angular rate in dps
    pub x: f32,
    /// Y-axis angular rate in dps
    pub y: f32,
    /// Z-axis angular rate in dps
    pub z: f32,
}

impl GyroData {
    /// Create from raw sensor values
    ///
    /// # Arguments
    ///
    /// * `raw` - Raw axis values
    /// * `range` - Configured full-scale range
    /// * `high_resolution` - Whether `raw` holds 20-bit samples
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_raw(raw: [i32; 3], range: GyroRange, high_resolution: bool) -> Self {
        let sensitivity = range.sensitivity(high_resolution);
        Self {
            x: raw[0] as f32 / sensitivity,
            y: raw[1] as f32 / sensitivity,
            z: raw[2] as f32 / sensitivity,
        }
    }

    /// Angular rate in rad/s
    #[must_use]
    pub fn to_radians_per_second(&self) -> [f32; 3] {
        let k = PI / 180.0;
        [self.x * k, self.y * k, self.z * k]
    }

    /// Magnitude of the rotation vector in dps
    #[must_use]
    pub fn magnitude(&self) -> f32 {
        libm::sqrtf(self.x * self.x + self.y * self.y + self.z * self.z)
    }
}
