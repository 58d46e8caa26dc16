#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod clock;
pub mod device;
pub mod features;
pub mod fifo;
pub mod interface;
pub mod odr;
pub mod poll;
pub mod power;
pub mod registers;
pub mod sensors;

// Re-export main types
pub use device::{DeviceState, DriverConfig, Icm42670Driver, SampleBatch};
pub use features::{
    ActivityClass, ApexParameters, FeatureKind, FeatureState, FreeFallEvent, PedometerEvent,
    WomConfig, WomEvent,
};
pub use fifo::{ChannelKind, DataPath, PacketLayout, SampleRecord};
pub use interface::{I2cInterface, InterfaceKind, SerialInterface, SpiInterface};
pub use odr::Odr;
pub use power::{AccelMode, GyroMode, PowerDecision};
pub use self_test::{SelfTestRequest, SelfTestResult};
pub use sensors::{AccelData, AccelRange, GyroData, GyroRange, MountingMatrix};

/// ICM-42670 I2C address when AD0 pin is low (default: 0x68)
///
/// Use [`I2cInterface::default()`] for this configuration.
pub const I2C_ADDRESS_AD0_LOW: u8 = 0x68;

/// ICM-42670 I2C address when AD0 pin is high (alternative: 0x69)
///
/// Use [`I2cInterface::alternative()`] for this configuration.
pub const I2C_ADDRESS_AD0_HIGH: u8 = 0x69;

/// Chip variants sharing the ICM-42670 register map
///
/// The variant is detected from `WHO_AM_I` when the driver is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipVariant {
    /// ICM-42607 (`WHO_AM_I` = 0x60)
    Icm42607,
    /// ICM-42670 (`WHO_AM_I` = 0x67)
    Icm42670,
    /// ICM-43607 (`WHO_AM_I` = 0x3F)
    Icm43607,
    /// T1000 (`WHO_AM_I` = 0x30)
    T1000,
}

impl ChipVariant {
    /// Map a `WHO_AM_I` value to a chip variant
    #[must_use]
    pub const fn from_who_am_i(value: u8) -> Option<Self> {
        match value {
            0x60 => Some(Self::Icm42607),
            0x67 => Some(Self::Icm42670),
            0x3F => Some(Self::Icm43607),
            0x30 => Some(Self::T1000),
            _ => None,
        }
    }

    /// Expected `WHO_AM_I` value for this variant
    #[must_use]
    pub const fn who_am_i(self) -> u8 {
        match self {
            Self::Icm42607 => 0x60,
            Self::Icm42670 => 0x67,
            Self::Icm43607 => 0x3F,
            Self::T1000 => 0x30,
        }
    }
}

/// Driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Communication error with the device
    Bus(E),
    /// Unknown `WHO_AM_I` register value (contains the actual value read)
    InvalidDevice(u8),
    /// Unsupported rate, mode or configuration request
    InvalidConfig,
    /// Protocol invariant violated (clock domain accounting, reset or OTP status)
    Hardware,
    /// A bounded status poll ran out of attempts
    Timeout,
    /// FIFO byte count outside `1..=FIFO_CAPACITY` (contains the count read)
    FifoCountInvalid(u16),
    /// FIFO full was observed; the FIFO has been flushed
    FifoOverflow,
    /// More decoded samples than fit in a [`SampleBatch`]
    BatchFull,
    /// An auxiliary feature did not complete its enable handshake
    FeatureEnable,
    /// Self-test did not report completion in time
    SelfTestTimeout,
}

impl<E> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Self::Bus(error)
    }
}
