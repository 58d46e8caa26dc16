//! Always-on auxiliary features: wake-on-motion, pedometer and free-fall
//!
//! All three features run on the accelerometer and therefore compete with the
//! primary channels for its rate and power mode. Each one follows the lifecycle
//!
//! ```text
//! Inactive -> Enabling -> Active -> Disabling -> Inactive
//! ```
//!
//! and requires a minimum output data rate while it is `Enabling` or `Active`.
//! The register sequences live on the driver (`enable_feature` /
//! `disable_feature`); this module holds the bookkeeping, the tuning parameters
//! and the event decoders.

use crate::odr::Odr;
use crate::registers::mreg;

/// Auxiliary feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FeatureKind {
    /// Wake-on-motion (accelerometer threshold comparator)
    WakeOnMotion,
    /// DMP pedometer
    Pedometer,
    /// DMP free-fall detection
    FreeFall,
}

impl FeatureKind {
    /// Every feature
    pub const ALL: [Self; 3] = [Self::WakeOnMotion, Self::Pedometer, Self::FreeFall];

    /// Lowest output data rate the feature works at
    #[must_use]
    pub const fn min_odr(self) -> Odr {
        match self {
            Self::WakeOnMotion => Odr::Hz25,
            Self::Pedometer => Odr::Hz50,
            Self::FreeFall => Odr::Hz400,
        }
    }

    /// Whether the feature runs on the DMP
    #[must_use]
    pub const fn uses_dmp(self) -> bool {
        !matches!(self, Self::WakeOnMotion)
    }

    /// `APEX_CONFIG1.dmp_odr` value the feature runs the DMP at
    pub(crate) const fn dmp_odr_code(self) -> Option<u8> {
        match self {
            Self::WakeOnMotion => None,
            Self::Pedometer => Some(DMP_ODR_50HZ),
            Self::FreeFall => Some(DMP_ODR_400HZ),
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::WakeOnMotion => 0,
            Self::Pedometer => 1,
            Self::FreeFall => 2,
        }
    }
}

/// `APEX_CONFIG1.dmp_odr` = 25 Hz
pub const DMP_ODR_25HZ: u8 = 0;
/// `APEX_CONFIG1.dmp_odr` = 400 Hz
pub const DMP_ODR_400HZ: u8 = 1;
/// `APEX_CONFIG1.dmp_odr` = 50 Hz
pub const DMP_ODR_50HZ: u8 = 2;
/// `APEX_CONFIG1.dmp_odr` = 100 Hz
pub const DMP_ODR_100HZ: u8 = 3;

/// DMP sample period in microseconds for an `APEX_CONFIG1.dmp_odr` value
#[must_use]
pub const fn dmp_period_us(code: u8) -> u32 {
    match code & 0x03 {
        DMP_ODR_25HZ => 40_000,
        DMP_ODR_50HZ => 20_000,
        DMP_ODR_100HZ => 10_000,
        _ => 2_500,
    }
}

/// Feature lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FeatureState {
    /// Off
    #[default]
    Inactive,
    /// Register sequence in progress
    Enabling,
    /// Running
    Active,
    /// Being torn down
    Disabling,
}

impl FeatureState {
    /// Whether the feature currently constrains rate and power
    #[must_use]
    pub const fn requires_accel(self) -> bool {
        matches!(self, Self::Enabling | Self::Active)
    }
}

/// Bookkeeping for one feature
///
/// No rate is stored per feature: on disable the rate is recomputed from the
/// channels and features that remain, since a rate saved at enable time goes
/// stale once features stack or channel rates change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AuxFeature {
    /// Lifecycle state
    pub state: FeatureState,
}

/// State of all three features
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FeatureSet {
    features: [AuxFeature; 3],
}

impl FeatureSet {
    /// Bookkeeping of one feature
    #[must_use]
    pub const fn get(&self, kind: FeatureKind) -> &AuxFeature {
        &self.features[kind.index()]
    }

    pub(crate) fn get_mut(&mut self, kind: FeatureKind) -> &mut AuxFeature {
        &mut self.features[kind.index()]
    }

    /// Whether the feature is enabling or active
    #[must_use]
    pub const fn is_active(&self, kind: FeatureKind) -> bool {
        self.get(kind).state.requires_accel()
    }

    /// Highest minimum rate among the enabling or active features
    #[must_use]
    pub fn rate_floor(&self) -> Option<Odr> {
        FeatureKind::ALL
            .into_iter()
            .filter(|kind| self.is_active(*kind))
            .map(FeatureKind::min_odr)
            .max()
    }
}

/// Wake-on-motion settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WomConfig {
    /// X, Y and Z thresholds (1 LSB = 1/256 g, i.e. about 3.9 mg)
    pub thresholds: [u8; 3],
    /// Consecutive over-threshold samples before the interrupt fires, minus
    /// one (0-3)
    pub duration: u8,
}

impl Default for WomConfig {
    fn default() -> Self {
        // 13 LSB, about 50 mg
        Self {
            thresholds: [13; 3],
            duration: 0,
        }
    }
}

/// APEX (pedometer, tilt, free-fall, low-g/high-g) tuning parameters
///
/// Each field is the register selector value, not a physical quantity; the
/// defaults are the power-on values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub struct ApexParameters {
    pub power_save_time: u8,
    pub low_energy_amp_th: u8,
    pub pedo_amp_th: u8,
    pub pedo_step_cnt_th: u8,
    pub pedo_step_det_th: u8,
    pub pedo_sb_timer_th: u8,
    pub pedo_hi_energy_th: u8,
    pub tilt_wait_time: u8,
    pub lowg_peak_hyst: u8,
    pub highg_peak_hyst: u8,
    /// Slow-walk sensitivity mode
    pub high_sensitivity: bool,
    pub smd_sensitivity: u8,
    pub ff_debounce_duration: u8,
    pub lowg_peak_th: u8,
    pub lowg_time_th: u8,
    pub highg_peak_th: u8,
    pub highg_time_th: u8,
    pub ff_min_duration: u8,
    pub ff_max_duration: u8,
}

impl Default for ApexParameters {
    fn default() -> Self {
        Self {
            power_save_time: 2, // 8 s
            low_energy_amp_th: 10, // 2684354 mg
            pedo_amp_th: 8, // 2080374 mg
            pedo_step_cnt_th: 5,
            pedo_step_det_th: 2,
            pedo_sb_timer_th: 2, // 100 samples
            pedo_hi_energy_th: 1, // 107
            tilt_wait_time: 2, // 4 s
            lowg_peak_hyst: 4, // 156 mg
            highg_peak_hyst: 4, // 156 mg
            high_sensitivity: false,
            smd_sensitivity: 0,
            ff_debounce_duration: 7, // 2000 ms
            lowg_peak_th: 0x11, // 563 mg
            lowg_time_th: 4, // 5 samples
            highg_peak_th: 9, // 2500 mg
            highg_time_th: 0, // 1 sample
            ff_min_duration: 0, // 10 cm
            ff_max_duration: 5, // 204 cm
        }
    }
}

impl ApexParameters {
    /// Packed `APEX_CONFIG2..12` values as (MREG address, byte) pairs
    #[must_use]
    pub const fn encode(&self) -> [(u16, u8); 8] {
        [
            (
                mreg::APEX_CONFIG2,
                (self.power_save_time & 0x0F) | (self.low_energy_amp_th << 4),
            ),
            (
                mreg::APEX_CONFIG3,
                (self.pedo_step_cnt_th & 0x0F) | (self.pedo_amp_th << 4),
            ),
            (
                mreg::APEX_CONFIG4,
                (self.pedo_hi_energy_th & 0x03)
                    | ((self.pedo_sb_timer_th & 0x07) << 2)
                    | ((self.pedo_step_det_th & 0x07) << 5),
            ),
            (
                mreg::APEX_CONFIG5,
                (self.highg_peak_hyst & 0x07)
                    | ((self.lowg_peak_hyst & 0x07) << 3)
                    | ((self.tilt_wait_time & 0x03) << 6),
            ),
            (
                mreg::APEX_CONFIG9,
                (self.high_sensitivity as u8)
                    | ((self.smd_sensitivity & 0x07) << 1)
                    | (self.ff_debounce_duration << 4),
            ),
            (
                mreg::APEX_CONFIG10,
                (self.lowg_time_th & 0x07) | (self.lowg_peak_th << 3),
            ),
            (
                mreg::APEX_CONFIG11,
                (self.highg_time_th & 0x07) | (self.highg_peak_th << 3),
            ),
            (
                mreg::APEX_CONFIG12,
                (self.ff_min_duration & 0x0F) | (self.ff_max_duration << 4),
            ),
        ]
    }
}

/// Axes that crossed their wake-on-motion threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WomEvent {
    /// Motion on X
    pub x: bool,
    /// Motion on Y
    pub y: bool,
    /// Motion on Z
    pub z: bool,
}

impl WomEvent {
    /// Whether any axis fired
    #[must_use]
    pub const fn any(&self) -> bool {
        self.x || self.y || self.z
    }

    /// Packed flags: Z = 0x01, Y = 0x02, X = 0x04
    #[must_use]
    pub const fn flags(&self) -> u8 {
        (self.z as u8) | ((self.y as u8) << 1) | ((self.x as u8) << 2)
    }
}

/// Activity reported by the pedometer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActivityClass {
    /// Neither walking nor running
    Other,
    /// Walking
    Walk,
    /// Running
    Run,
}

impl ActivityClass {
    /// Decode `APEX_DATA3.activity_class`
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            1 => Self::Walk,
            2 => Self::Run,
            _ => Self::Other,
        }
    }
}

/// Pedometer step report
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PedometerEvent {
    /// Steps since the pedometer started (with one overflow folded in)
    pub step_count: u32,
    /// Cadence in steps per second
    pub cadence: f32,
    /// Activity class
    pub activity: ActivityClass,
}

impl PedometerEvent {
    /// Decode `APEX_DATA0..3`
    ///
    /// # Arguments
    /// * `data` - `APEX_DATA0..3`: step count (LE), cadence (u6.2 samples per
    ///   step at 50 Hz), activity class
    /// * `overflow` - `INT_STATUS3.step_cnt_ovf_int`
    #[must_use]
    pub fn decode(data: [u8; 4], overflow: bool) -> Self {
        let steps = u32::from(u16::from_le_bytes([data[0], data[1]]));
        let step_count = if overflow { steps + 65_536 } else { steps };

        let samples_per_step = f32::from(data[2] >> 2) + f32::from(data[2] & 0x03) * 0.25;
        let cadence = if samples_per_step > 0.0 {
            50.0 / samples_per_step
        } else {
            0.0
        };

        Self {
            step_count,
            cadence,
            activity: ActivityClass::from_bits(data[3]),
        }
    }
}

/// Free-fall report
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FreeFallEvent {
    /// Fall duration in DMP samples
    pub duration_samples: u16,
    /// Fall duration in milliseconds
    pub duration_ms: u32,
    /// Estimated fall height in centimetres
    pub distance_cm: f32,
}

impl FreeFallEvent {
    /// Decode `APEX_DATA4/5` given the DMP rate from `APEX_CONFIG1.dmp_odr`
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn decode(data: [u8; 2], dmp_odr_code: u8) -> Self {
        let duration_samples = u16::from_le_bytes(data);
        let duration_ms = u32::from(duration_samples) * dmp_period_us(dmp_odr_code) / 1000;
        let ms = duration_ms as f32;
        // d = g t^2 / 2, with t in ms and d in cm
        let distance_cm = 9.81 * ms * ms / 2.0 / 10_000.0;
        Self {
            duration_samples,
            duration_ms,
            distance_cm,
        }
    }
}
