//! Test utilities and helper functions

use crate::common::mock_interface::MockInterface;
use icm42670::{DriverConfig, Icm42670Driver};

/// Mock delay implementation for testing
///
/// This is a no-op delay that implements the embedded-hal DelayNs trait
/// for use in tests where actual delays are not needed.
#[derive(Debug, Clone, Copy)]
pub struct MockDelay;

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, _ns: u32) {
        // No-op for testing
    }

    fn delay_us(&mut self, _us: u32) {
        // No-op for testing
    }

    fn delay_ms(&mut self, _ms: u32) {
        // No-op for testing
    }
}

/// Delay provider that logs every delay into a mock's operation log
#[derive(Clone)]
pub struct RecordingDelay {
    interface: MockInterface,
}

impl RecordingDelay {
    /// Share the operation log of `interface`
    pub fn new(interface: &MockInterface) -> Self {
        Self {
            interface: interface.clone(),
        }
    }
}

impl embedded_hal::delay::DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.interface.record_delay(u64::from(ns));
    }

    fn delay_us(&mut self, us: u32) {
        self.interface.record_delay(u64::from(us) * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.interface.record_delay(u64::from(ms) * 1_000_000);
    }
}

/// Driver type used throughout the tests
pub type TestDriver = Icm42670Driver<MockInterface, MockDelay>;

/// Create a mock driver for testing
/// Returns (driver, interface) where interface is a clone that shares state with the driver
pub fn create_mock_driver() -> (TestDriver, MockInterface) {
    create_mock_driver_with(DriverConfig::default())
}

/// Create a mock driver with a custom configuration
pub fn create_mock_driver_with(config: DriverConfig) -> (TestDriver, MockInterface) {
    let interface = MockInterface::new();
    let interface_clone = interface.clone();
    let driver = Icm42670Driver::new(interface, MockDelay, config).expect("Failed to create mock driver");
    (driver, interface_clone)
}

/// Create and initialize a mock driver
pub fn create_initialized_driver() -> (TestDriver, MockInterface) {
    let (mut driver, interface) = create_mock_driver();
    driver.init().expect("Failed to initialize mock driver");
    (driver, interface)
}

/// Build one 16-byte standard FIFO packet
///
/// Header (accel + gyro + timestamp), little-endian axes, 1-byte temperature
/// and a 16-bit timestamp.
pub fn standard_packet(accel: [i16; 3], gyro: [i16; 3], temperature: i8, timestamp: u16) -> [u8; 16] {
    let mut packet = [0u8; 16];
    packet[0] = 0x68;
    for (i, value) in accel.iter().enumerate() {
        packet[1 + 2 * i..3 + 2 * i].copy_from_slice(&value.to_le_bytes());
    }
    for (i, value) in gyro.iter().enumerate() {
        packet[7 + 2 * i..9 + 2 * i].copy_from_slice(&value.to_le_bytes());
    }
    packet[13] = temperature.to_le_bytes()[0];
    packet[14..16].copy_from_slice(&timestamp.to_le_bytes());
    packet
}

/// Assert that two floating point values are approximately equal
pub fn assert_float_eq(a: f32, b: f32, epsilon: f32) {
    let diff = (a - b).abs();
    assert!(
        diff < epsilon,
        "Values not equal within epsilon: {} vs {} (diff: {}, epsilon: {})",
        a,
        b,
        diff,
        epsilon
    );
}
