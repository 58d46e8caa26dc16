//! FIFO packet decoding
//!
//! [`FifoDecoder`] strides through a drained frame one packet at a time and
//! yields [`SampleRecord`]s lazily. For every packet it:
//!
//! 1. extracts the temperature,
//! 2. feeds the 16-bit timestamp to the [`TimestampReconstructor`] (once per
//!    packet, in stream order),
//! 3. emits an accelerometer and/or gyroscope record for each streaming channel
//!    that is past its discard window.
//!
//! The stride is always the full packet size, whatever channels are emitted,
//! and a trailing partial packet is ignored.

use super::{ChannelKind, PacketLayout, SampleRecord};

/// Degrees Celsius per LSB of the 1-byte FIFO temperature
pub const TEMP_SENSITIVITY_1_BYTE: f32 = 0.4831;
/// Degrees Celsius per LSB of the 2-byte temperature (data registers and
/// high-resolution FIFO)
pub const TEMP_SENSITIVITY_2_BYTE: f32 = 0.007_548;
/// Temperature reading at 0 LSB
pub const ROOM_TEMP_OFFSET: f32 = 25.0;
/// Duration of one timestamp tick in microseconds
pub const TIMESTAMP_TICK_US: u64 = 16;

/// Offset of the nibble-packed high-resolution bytes in a 20-byte packet
const HIGH_RES_OFFSET: usize = 17;
const ACCEL_OFFSET: usize = 1;
const GYRO_OFFSET: usize = 7;

/// Expands the wrapping 16-bit FIFO timestamp into a running 64-bit tick count
///
/// This is a running integral: feed every packet exactly once, in order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimestampReconstructor {
    previous: u16,
    total: u64,
}

impl TimestampReconstructor {
    /// Start from zero
    #[must_use]
    pub const fn new() -> Self {
        Self {
            previous: 0,
            total: 0,
        }
    }

    /// Account for the next raw timestamp and return the running tick count
    ///
    /// # Example
    /// ```
    /// use icm42670::fifo::parser::TimestampReconstructor;
    ///
    /// let mut ts = TimestampReconstructor::new();
    /// assert_eq!(ts.next(10), 10);
    /// assert_eq!(ts.next(20), 20);
    /// // 20 -> 5 wraps around
    /// assert_eq!(ts.next(5), 20 + 5 + (65535 - 20));
    /// ```
    pub fn next(&mut self, raw: u16) -> u64 {
        let delta = if raw < self.previous {
            u64::from(raw) + u64::from(0xFFFF - self.previous)
        } else {
            u64::from(raw - self.previous)
        };
        self.total += delta;
        self.previous = raw;
        self.total
    }

    /// Last raw timestamp seen
    #[must_use]
    pub const fn previous(&self) -> u16 {
        self.previous
    }

    /// Running tick count
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.total
    }
}

/// Per-channel decode gate: `None` when the channel is not streaming,
/// otherwise the remaining discard count
pub type ChannelGate<'a> = Option<&'a mut u16>;

/// Lazy decoder over one drained FIFO frame
pub struct FifoDecoder<'a> {
    bytes: &'a [u8],
    offset: usize,
    layout: PacketLayout,
    timestamps: Option<&'a mut TimestampReconstructor>,
    accel: ChannelGate<'a>,
    gyro: ChannelGate<'a>,
    pending: Option<SampleRecord>,
}

impl<'a> FifoDecoder<'a> {
    /// Create a decoder
    ///
    /// # Arguments
    /// * `bytes` - Drained FIFO bytes
    /// * `layout` - Packet layout the FIFO was configured with
    /// * `timestamps` - Reconstructor to feed, or `None` when timestamps are off
    /// * `accel` / `gyro` - Discard counters of streaming channels, `None` for
    ///   channels that must not be emitted
    #[must_use]
    pub fn new(
        bytes: &'a [u8],
        layout: PacketLayout,
        timestamps: Option<&'a mut TimestampReconstructor>,
        accel: ChannelGate<'a>,
        gyro: ChannelGate<'a>,
    ) -> Self {
        let timestamps = timestamps.filter(|_| layout.has_timestamp());
        let gyro = gyro.filter(|_| layout.has_gyro());
        Self {
            bytes,
            offset: 0,
            layout,
            timestamps,
            accel,
            gyro,
            pending: None,
        }
    }

    /// Complete packets not yet consumed
    #[must_use]
    pub fn remaining_packets(&self) -> usize {
        (self.bytes.len() - self.offset) / self.layout.size()
    }

    fn decode_packet(&mut self, packet: &[u8]) -> (Option<SampleRecord>, Option<SampleRecord>) {
        let temperature = packet_temperature(packet, self.layout);
        let timestamp_us = match self.timestamps.as_deref_mut() {
            Some(reconstructor) => {
                let offset = self.layout.timestamp_offset();
                let raw = u16::from_le_bytes([packet[offset], packet[offset + 1]]);
                reconstructor.next(raw) * TIMESTAMP_TICK_US
            }
            None => 0,
        };

        let accel = take_sample(self.accel.as_deref_mut()).then(|| {
            let [x, y, z] = packet_axes(packet, ACCEL_OFFSET, self.layout, ChannelKind::Accel);
            SampleRecord {
                channel: ChannelKind::Accel,
                x,
                y,
                z,
                temperature,
                timestamp_us,
            }
        });
        let gyro = take_sample(self.gyro.as_deref_mut()).then(|| {
            let [x, y, z] = packet_axes(packet, GYRO_OFFSET, self.layout, ChannelKind::Gyro);
            SampleRecord {
                channel: ChannelKind::Gyro,
                x,
                y,
                z,
                temperature,
                timestamp_us,
            }
        });
        (accel, gyro)
    }
}

impl Iterator for FifoDecoder<'_> {
    type Item = SampleRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(record) = self.pending.take() {
            return Some(record);
        }

        let size = self.layout.size();
        while self.offset + size <= self.bytes.len() {
            let bytes = self.bytes;
            let packet = &bytes[self.offset..self.offset + size];
            self.offset += size;

            match self.decode_packet(packet) {
                (Some(accel), gyro) => {
                    self.pending = gyro;
                    return Some(accel);
                }
                (None, Some(gyro)) => return Some(gyro),
                (None, None) => {}
            }
        }
        None
    }
}

/// `true` when the channel streams and its discard window is over
fn take_sample(gate: Option<&mut u16>) -> bool {
    match gate {
        None => false,
        Some(discard) if *discard > 0 => {
            *discard -= 1;
            false
        }
        Some(_) => true,
    }
}

fn packet_axes(packet: &[u8], offset: usize, layout: PacketLayout, channel: ChannelKind) -> [i32; 3] {
    let mut axes = read_triple(&packet[offset..offset + 6]);
    if layout.is_high_resolution() {
        for (axis, nibbles) in axes.iter_mut().zip(&packet[HIGH_RES_OFFSET..HIGH_RES_OFFSET + 3]) {
            let nibble = match channel {
                ChannelKind::Accel => nibbles >> 4,
                ChannelKind::Gyro => nibbles & 0x0F,
            };
            *axis = (*axis << 4) | i32::from(nibble);
        }
    }
    axes
}

fn packet_temperature(packet: &[u8], layout: PacketLayout) -> f32 {
    let offset = layout.temperature_offset();
    if layout.is_high_resolution() {
        temperature_from_2_bytes(i16::from_le_bytes([packet[offset], packet[offset + 1]]))
    } else {
        temperature_from_1_byte(packet[offset] as i8)
    }
}

/// Three little-endian `i16` values
pub(crate) fn read_triple(bytes: &[u8]) -> [i32; 3] {
    [
        i32::from(i16::from_le_bytes([bytes[0], bytes[1]])),
        i32::from(i16::from_le_bytes([bytes[2], bytes[3]])),
        i32::from(i16::from_le_bytes([bytes[4], bytes[5]])),
    ]
}

/// Celsius from the 1-byte FIFO temperature
#[must_use]
pub fn temperature_from_1_byte(raw: i8) -> f32 {
    f32::from(raw) * TEMP_SENSITIVITY_1_BYTE + ROOM_TEMP_OFFSET
}

/// Celsius from a 2-byte temperature
#[must_use]
pub fn temperature_from_2_bytes(raw: i16) -> f32 {
    f32::from(raw) * TEMP_SENSITIVITY_2_BYTE + ROOM_TEMP_OFFSET
}
