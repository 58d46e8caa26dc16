//! Output data rate table
//!
//! Accelerometer and gyroscope share one sample clock on the ICM-42670, so the
//! driver negotiates a single [`Odr`] for both `ACCEL_CONFIG0` and
//! `GYRO_CONFIG0`. Variants are declared in ascending rate order, so `Ord`
//! compares them by frequency.

/// Supported output data rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Odr {
    /// 12.5 Hz (accelerometer low-power class)
    Hz12_5,
    /// 25 Hz (accelerometer low-power class)
    Hz25,
    /// 50 Hz
    Hz50,
    /// 100 Hz
    Hz100,
    /// 200 Hz
    Hz200,
    /// 400 Hz
    Hz400,
    /// 800 Hz
    Hz800,
    /// 1600 Hz
    Hz1600,
}

impl Odr {
    /// All rates in ascending order
    pub const ALL: [Self; 8] = [
        Self::Hz12_5,
        Self::Hz25,
        Self::Hz50,
        Self::Hz100,
        Self::Hz200,
        Self::Hz400,
        Self::Hz800,
        Self::Hz1600,
    ];

    /// Smallest supported rate at or above `hz`, clamped to 1600 Hz
    ///
    /// Returns `None` for non-finite or non-positive requests.
    ///
    /// # Example
    /// ```
    /// use icm42670::Odr;
    /// assert_eq!(Odr::quantize(30.0), Some(Odr::Hz50));
    /// assert_eq!(Odr::quantize(5000.0), Some(Odr::Hz1600));
    /// assert_eq!(Odr::quantize(0.0), None);
    /// ```
    #[must_use]
    pub fn quantize(hz: f32) -> Option<Self> {
        if !hz.is_finite() || hz <= 0.0 {
            return None;
        }
        Some(
            Self::ALL
                .into_iter()
                .find(|odr| odr.hz() >= hz)
                .unwrap_or(Self::Hz1600),
        )
    }

    /// `*_CONFIG0.*_odr` field value
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Hz1600 => 0x05,
            Self::Hz800 => 0x06,
            Self::Hz400 => 0x07,
            Self::Hz200 => 0x08,
            Self::Hz100 => 0x09,
            Self::Hz50 => 0x0A,
            Self::Hz25 => 0x0B,
            Self::Hz12_5 => 0x0C,
        }
    }

    /// Decode a `*_CONFIG0.*_odr` field value
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x05 => Some(Self::Hz1600),
            0x06 => Some(Self::Hz800),
            0x07 => Some(Self::Hz400),
            0x08 => Some(Self::Hz200),
            0x09 => Some(Self::Hz100),
            0x0A => Some(Self::Hz50),
            0x0B => Some(Self::Hz25),
            0x0C => Some(Self::Hz12_5),
            _ => None,
        }
    }

    /// Rate in Hz
    #[must_use]
    pub const fn hz(self) -> f32 {
        match self {
            Self::Hz12_5 => 12.5,
            Self::Hz25 => 25.0,
            Self::Hz50 => 50.0,
            Self::Hz100 => 100.0,
            Self::Hz200 => 200.0,
            Self::Hz400 => 400.0,
            Self::Hz800 => 800.0,
            Self::Hz1600 => 1600.0,
        }
    }

    /// Sample period in microseconds
    #[must_use]
    pub const fn period_us(self) -> u32 {
        match self {
            Self::Hz12_5 => 80_000,
            Self::Hz25 => 40_000,
            Self::Hz50 => 20_000,
            Self::Hz100 => 10_000,
            Self::Hz200 => 5_000,
            Self::Hz400 => 2_500,
            Self::Hz800 => 1_250,
            Self::Hz1600 => 625,
        }
    }

    /// Rates below 50 Hz run the accelerometer in low-power mode when it is the
    /// only active channel
    #[must_use]
    pub fn is_low_power_class(self) -> bool {
        self < Self::Hz50
    }
}
