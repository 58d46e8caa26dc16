//! FIFO frame and packet layouts
//!
//! The ICM-42670 FIFO holds up to 2 KiB of fixed-size packets. The driver
//! drains it in one burst into a single scratch [`FifoFrame`] owned by the
//! driver, then decodes the frame lazily with
//! [`FifoDecoder`](parser::FifoDecoder). Because the decoder borrows the frame,
//! the next drain cannot overwrite bytes that are still being decoded.
//!
//! Packet layouts (little endian, byte 0 is the packet header):
//!
//! | layout | size | accel | gyro | temperature | timestamp | high-res nibbles |
//! |---|---|---|---|---|---|---|
//! | [`PacketLayout::AccelOnly`] | 8 | 1..7 | - | 7 (i8) | - | - |
//! | [`PacketLayout::Standard`] | 16 | 1..7 | 7..13 | 13 (i8) | 14..16 | - |
//! | [`PacketLayout::HighResolution`] | 20 | 1..7 | 7..13 | 13..15 (i16) | 15..17 | 17..20 |
//!
//! # Example
//!
//! ```ignore
//! # use icm42670::{ChannelKind, Icm42670Driver};
//! # let mut imu: Icm42670Driver<_, _> = todo!();
//! let frame = imu.read_fifo()?;
//! defmt::info!("{} packets buffered", frame.packet_count());
//! for record in imu.decode_fifo() {
//!     match record.channel {
//!         ChannelKind::Accel => { /* ... */ }
//!         ChannelKind::Gyro => { /* ... */ }
//!     }
//! }
//! # Ok::<(), icm42670::Error<()>>(())
//! ```

pub mod parser;

use parser::TimestampReconstructor;

/// Largest FIFO byte count the driver accepts
pub const FIFO_CAPACITY: usize = 2000;

/// Packet header: FIFO empty marker
pub const HEADER_EMPTY: u8 = 0x80;
/// Packet header: accelerometer data present
pub const HEADER_ACCEL: u8 = 0x40;
/// Packet header: gyroscope data present
pub const HEADER_GYRO: u8 = 0x20;
/// Packet header: 20-byte high-resolution packet
pub const HEADER_HIGH_RES: u8 = 0x10;

/// Sensor channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelKind {
    /// Accelerometer
    Accel,
    /// Gyroscope
    Gyro,
}

impl ChannelKind {
    /// The channel sharing the sample clock with this one
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Accel => Self::Gyro,
            Self::Gyro => Self::Accel,
        }
    }
}

/// How samples leave the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataPath {
    /// Batched through the FIFO, signalled by the watermark interrupt
    #[default]
    Fifo,
    /// One sample at a time from the data registers, signalled by data ready
    Polling,
}

/// FIFO packet format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketLayout {
    /// 8 bytes: accelerometer and 1-byte temperature
    AccelOnly,
    /// 16 bytes: accelerometer, gyroscope, 1-byte temperature and timestamp
    #[default]
    Standard,
    /// 20 bytes: 20-bit accelerometer and gyroscope, 2-byte temperature and
    /// timestamp
    HighResolution,
}

impl PacketLayout {
    /// Packet size in bytes
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::AccelOnly => 8,
            Self::Standard => 16,
            Self::HighResolution => 20,
        }
    }

    /// Whether packets carry gyroscope data
    #[must_use]
    pub const fn has_gyro(self) -> bool {
        !matches!(self, Self::AccelOnly)
    }

    /// Whether packets carry a timestamp field
    #[must_use]
    pub const fn has_timestamp(self) -> bool {
        !matches!(self, Self::AccelOnly)
    }

    /// Whether samples are extended to 20 bits
    #[must_use]
    pub const fn is_high_resolution(self) -> bool {
        matches!(self, Self::HighResolution)
    }

    pub(crate) const fn temperature_offset(self) -> usize {
        match self {
            Self::AccelOnly => 7,
            Self::Standard | Self::HighResolution => 13,
        }
    }

    pub(crate) const fn timestamp_offset(self) -> usize {
        match self {
            Self::AccelOnly | Self::Standard => 14,
            Self::HighResolution => 15,
        }
    }
}

/// One decoded sample
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleRecord {
    /// Channel the sample belongs to
    pub channel: ChannelKind,
    /// X axis (raw LSB; 20-bit in high-resolution mode)
    pub x: i32,
    /// Y axis
    pub y: i32,
    /// Z axis
    pub z: i32,
    /// Die temperature in degrees Celsius
    pub temperature: f32,
    /// Reconstructed timestamp in microseconds (0 when timestamps are off)
    pub timestamp_us: u64,
}

impl SampleRecord {
    /// Axis values as an array
    #[must_use]
    pub const fn axes(&self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }
}

/// Scratch buffer for one FIFO drain
#[derive(Debug, Clone)]
pub struct FifoFrame {
    buffer: [u8; FIFO_CAPACITY],
    len: usize,
    layout: PacketLayout,
    timestamps: TimestampReconstructor,
}

impl FifoFrame {
    /// Empty frame for the given packet layout
    #[must_use]
    pub const fn new(layout: PacketLayout) -> Self {
        Self {
            buffer: [0; FIFO_CAPACITY],
            len: 0,
            layout,
            timestamps: TimestampReconstructor::new(),
        }
    }

    /// Bytes of the last drain
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// Byte count of the last drain
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the frame holds no bytes
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Packet layout used to decode the frame
    #[must_use]
    pub const fn layout(&self) -> PacketLayout {
        self.layout
    }

    /// Number of complete packets in the frame
    #[must_use]
    pub const fn packet_count(&self) -> usize {
        self.len / self.layout.size()
    }

    /// Timestamp state carried across drains
    #[must_use]
    pub const fn timestamps(&self) -> &TimestampReconstructor {
        &self.timestamps
    }

    /// Drop buffered bytes and restart timestamp reconstruction
    pub fn reset(&mut self, layout: PacketLayout) {
        self.len = 0;
        self.layout = layout;
        self.timestamps = TimestampReconstructor::new();
    }

    /// Buffer to drain `len` bytes into; `len` must not exceed [`FIFO_CAPACITY`]
    pub(crate) fn fill(&mut self, len: usize) -> &mut [u8] {
        self.len = len.min(FIFO_CAPACITY);
        &mut self.buffer[..self.len]
    }

    /// Forget the buffered bytes, e.g. after a failed drain
    pub(crate) fn discard(&mut self) {
        self.len = 0;
    }

    pub(crate) fn split(&mut self) -> (&[u8], PacketLayout, &mut TimestampReconstructor) {
        (&self.buffer[..self.len], self.layout, &mut self.timestamps)
    }
}
