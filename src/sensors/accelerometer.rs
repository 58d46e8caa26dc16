//! Accelerometer sensor types and configuration
//!
//! Provides the full-scale ranges and unit conversion for the ICM-42670's
//! 3-axis accelerometer.

/// Standard gravity in m/s²
pub const STANDARD_GRAVITY: f32 = 9.806_65;

/// Accelerometer full-scale range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccelRange {
    /// ±2g range (most sensitive, least range)
    G2,
    /// ±4g range
    #[default]
    G4,
    /// ±8g range
    G8,
    /// ±16g range (least sensitive, most range)
    G16,
}

impl AccelRange {
    /// `ACCEL_CONFIG0.accel_fs_sel` value
    #[must_use]
    pub const fn fs_sel(self) -> u8 {
        match self {
            Self::G16 => 0,
            Self::G8 => 1,
            Self::G4 => 2,
            Self::G2 => 3,
        }
    }

    /// Decode `ACCEL_CONFIG0.accel_fs_sel`
    #[must_use]
    pub const fn from_fs_sel(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::G16,
            1 => Self::G8,
            2 => Self::G4,
            _ => Self::G2,
        }
    }

    /// Full-scale value in g
    #[must_use]
    pub const fn max_value(self) -> u8 {
        match self {
            Self::G2 => 2,
            Self::G4 => 4,
            Self::G8 => 8,
            Self::G16 => 16,
        }
    }

    /// Get the sensitivity in LSB/g
    ///
    /// High-resolution samples carry four extra bits, so they are 16 times
    /// finer than 16-bit samples.
    #[must_use]
    pub fn sensitivity(self, high_resolution: bool) -> f32 {
        let full_scale_lsb = if high_resolution { 524_288.0 } else { 32_768.0 };
        full_scale_lsb / f32::from(self.max_value())
    }
}

/// Accelerometer data in physical units (g-force)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AccelData {
    /// X-axis acceleration in g
    pub x: f32,
    /// Y-axis acceleration in g
    pub y: f32,
    /// Z-axis acceleration in g
    pub z: f32,
}

impl AccelData {
    /// Create from raw sensor values
    ///
    /// # Arguments
    ///
    /// * `raw` - Raw axis values (as found in [`SampleRecord`](crate::SampleRecord))
    /// * `range` - Configured full-scale range
    /// * `high_resolution` - Whether `raw` holds 20-bit samples
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_raw(raw: [i32; 3], range: AccelRange, high_resolution: bool) -> Self {
        let sensitivity = range.sensitivity(high_resolution);
        Self {
            x: raw[0] as f32 / sensitivity,
            y: raw[1] as f32 / sensitivity,
            z: raw[2] as f32 / sensitivity,
        }
    }

    /// Get the magnitude of the acceleration vector in g
    #[must_use]
    pub fn magnitude(&self) -> f32 {
        libm::sqrtf(self.x * self.x + self.y * self.y + self.z * self.z)
    }

    /// Convert to m/s²
    #[must_use]
    pub fn to_meters_per_second_squared(&self) -> [f32; 3] {
        [
            self.x * STANDARD_GRAVITY,
            self.y * STANDARD_GRAVITY,
            self.z * STANDARD_GRAVITY,
        ]
    }
}
