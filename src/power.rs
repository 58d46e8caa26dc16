//! Power modes and the rate/power reconciliation tables
//!
//! The accelerometer is shared between the two primary channels and the
//! always-on features (wake-on-motion, pedometer, free-fall). Which power mode
//! it runs in is decided by one table, [`PowerDecision::select`], keyed by the
//! set of active requesters:
//!
//! | accel | gyro | features | accel mode | RCOSC on FIFO threshold |
//! |---|---|---|---|---|
//! | no | no | none | Off | off |
//! | no | no | free-fall | LowNoise | off |
//! | no | no | WOM / pedometer | LowPower | on |
//! | any | yes | any | LowNoise (Off if accel and features idle) | off |
//! | yes | no | any | LowPower below 50 Hz, else LowNoise | on for LowPower |
//!
//! # Example
//!
//! ```
//! use icm42670::power::{AccelMode, PowerDecision, Requesters};
//! use icm42670::Odr;
//!
//! let requesters = Requesters { accel: true, ..Requesters::default() };
//! let decision = PowerDecision::select(&requesters, Some(Odr::Hz25));
//! assert_eq!(decision.accel, AccelMode::LowPower);
//! assert!(decision.rcosc_on_fifo_threshold);
//! ```

use crate::odr::Odr;

/// Largest FIFO watermark, in packets
pub const MAX_WATERMARK_PACKETS: u16 = 64;

/// Accelerometer power mode (`PWR_MGMT_0.accel_mode`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccelMode {
    /// Powered down
    Off = 0,
    /// Duty-cycled low-power mode
    LowPower = 2,
    /// Continuous low-noise mode
    LowNoise = 3,
}

impl AccelMode {
    /// Register field value
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Decode the register field (the reserved value 1 reads as `Off`)
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            2 => Self::LowPower,
            3 => Self::LowNoise,
            _ => Self::Off,
        }
    }
}

/// Gyroscope power mode (`PWR_MGMT_0.gyro_mode`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GyroMode {
    /// Powered down
    Off = 0,
    /// Drive running, sense path off
    Standby = 1,
    /// Low-noise mode
    LowNoise = 3,
}

impl GyroMode {
    /// Register field value
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Decode the register field
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            1 => Self::Standby,
            3 => Self::LowNoise,
            _ => Self::Off,
        }
    }

    /// Whether the gyroscope leaves the accelerometer as the only running sensor
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Off | Self::Standby)
    }
}

/// Everything that currently needs the accelerometer or gyroscope powered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Requesters {
    /// Accelerometer channel powered
    pub accel: bool,
    /// Gyroscope channel powered
    pub gyro: bool,
    /// Wake-on-motion enabling or active
    pub wom: bool,
    /// Pedometer enabling or active
    pub pedometer: bool,
    /// Free-fall detection enabling or active
    pub free_fall: bool,
}

impl Requesters {
    /// Any always-on feature needs the accelerometer
    #[must_use]
    pub const fn any_feature(&self) -> bool {
        self.wom || self.pedometer || self.free_fall
    }
}

/// Accelerometer power mode and FIFO clock policy for a set of requesters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerDecision {
    /// Accelerometer mode to program
    pub accel: AccelMode,
    /// Keep the RC oscillator requested when the FIFO threshold fires
    pub rcosc_on_fifo_threshold: bool,
}

impl PowerDecision {
    /// Everything off
    pub const OFF: Self = Self {
        accel: AccelMode::Off,
        rcosc_on_fifo_threshold: false,
    };

    const LOW_NOISE: Self = Self {
        accel: AccelMode::LowNoise,
        rcosc_on_fifo_threshold: false,
    };

    const LOW_POWER: Self = Self {
        accel: AccelMode::LowPower,
        rcosc_on_fifo_threshold: true,
    };

    /// Look up the decision table
    ///
    /// # Arguments
    /// * `requesters` - Active channels and features
    /// * `accel_odr` - Negotiated accelerometer rate, `None` before the first
    ///   rate request (treated as low noise)
    #[must_use]
    pub fn select(requesters: &Requesters, accel_odr: Option<Odr>) -> Self {
        match (requesters.accel, requesters.gyro) {
            (false, false) if requesters.free_fall => Self::LOW_NOISE,
            (false, false) if requesters.any_feature() => Self::LOW_POWER,
            (false, false) => Self::OFF,
            (false, true) if !requesters.any_feature() => Self::OFF,
            (_, true) => Self::LOW_NOISE,
            (true, false) => match accel_odr {
                Some(odr) if odr.is_low_power_class() => Self::LOW_POWER,
                _ => Self::LOW_NOISE,
            },
        }
    }
}

/// Per-channel rate and power bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelState {
    /// Last requested rate in Hz
    pub requested_hz: Option<f32>,
    /// Rate currently latched in hardware for this channel
    pub negotiated: Option<Odr>,
    /// This channel's own quantized request (before sharing with the other
    /// channel)
    pub previous_negotiated: Option<Odr>,
    /// Watermark requested by this channel, in bytes
    pub watermark: u16,
    /// Sensor powered through `enable_channel`
    pub powered: bool,
    /// Rate configured through `set_channel_rate`
    pub configured: bool,
    /// Samples still to drop after the first configuration
    pub discard: u16,
}

impl ChannelState {
    /// Whether decoded samples of this channel are reported
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        self.powered && self.configured
    }

    /// Forget everything but the power flag
    pub fn clear_rate(&mut self) {
        *self = Self {
            powered: self.powered,
            ..Self::default()
        };
    }
}

/// FIFO watermark in bytes for a request of `packets` packets
///
/// The request is clamped to `1..=64` packets.
#[must_use]
pub fn watermark_bytes(packets: u16, packet_size: usize) -> u16 {
    let packets = packets.clamp(1, MAX_WATERMARK_PACKETS);
    // packet_size is at most 20, so 64 * 20 fits comfortably
    packets * packet_size as u16
}
