//! Unit tests for chip detection, configuration validation and init()

use crate::common::mock_interface::*;
use crate::common::{MockDelay, create_initialized_driver, create_mock_driver_with};
use icm42670::{
    ChipVariant, DataPath, DriverConfig, Error, Icm42670Driver, InterfaceKind, PacketLayout,
};

#[test]
fn test_detects_every_chip_variant() {
    for (who_am_i, chip) in [
        (0x60, ChipVariant::Icm42607),
        (0x67, ChipVariant::Icm42670),
        (0x3F, ChipVariant::Icm43607),
        (0x30, ChipVariant::T1000),
    ] {
        let interface = MockInterface::new();
        interface.set_who_am_i(who_am_i);
        let driver = Icm42670Driver::new(interface, MockDelay, DriverConfig::default()).unwrap();
        assert_eq!(driver.state().chip, chip);
    }
}

#[test]
fn test_rejects_unknown_chip() {
    let interface = MockInterface::new();
    interface.set_who_am_i(0xEA);
    let result = Icm42670Driver::new(interface, MockDelay, DriverConfig::default());
    assert!(matches!(result, Err(Error::InvalidDevice(0xEA))));
}

#[test]
fn test_rejects_accel_only_layout_with_timestamps() {
    let config = DriverConfig {
        layout: PacketLayout::AccelOnly,
        ..DriverConfig::default()
    };
    let result = Icm42670Driver::new(MockInterface::new(), MockDelay, config);
    assert!(matches!(result, Err(Error::InvalidConfig)));
}

#[test]
fn test_new_does_not_configure_the_device() {
    let interface = MockInterface::new();
    let driver =
        Icm42670Driver::new(interface.clone(), MockDelay, DriverConfig::default()).unwrap();

    assert!(!driver.state().initialized);
    assert!(interface.writes_to(SIGNAL_PATH_RESET).is_empty());
    assert_eq!(interface.operations().len(), 1, "only WHO_AM_I is read");
}

#[test]
fn test_init_programs_defaults() {
    let (driver, interface) = create_initialized_driver();
    let state = driver.state();

    assert!(state.initialized);
    assert_eq!(state.interface, InterfaceKind::I2c);
    assert_eq!(interface.writes_to(SIGNAL_PATH_RESET), vec![0x10]);

    // 4 g and 2000 dps, ODR left at its reset value
    assert_eq!(interface.get_register(ACCEL_CONFIG0), 0x46);
    assert_eq!(interface.get_register(GYRO_CONFIG0), 0x06);
    assert_eq!(state.accel_config0, 0x46);
    assert_eq!(state.gyro_config0, 0x06);

    // INT1 push-pull, active high, pulsed
    assert_eq!(interface.get_register(0x06), 0x03);

    // I2C build: SPI slave disabled
    assert_eq!(interface.get_register(0x35) & 0x03, 0x02);

    // 16 us timestamps enabled, FSYNC off
    assert_eq!(interface.get_extended(0x1000), 0x09);
    // accel + gyro packets, watermark interrupt when greater or equal
    assert_eq!(interface.get_extended(MREG_FIFO_CONFIG5), 0x23);
    // RCOSC on FIFO threshold disabled
    assert_eq!(interface.get_extended(MREG_FIFO_CONFIG6) & 0x01, 0x01);
    assert!(!state.rcosc_on_fifo_threshold);

    // WOM thresholds, AND-ed axes, compare to previous sample
    assert_eq!(interface.get_extended(MREG_ACCEL_WOM_X_THR), 13);
    assert_eq!(interface.get_extended(MREG_ACCEL_WOM_X_THR + 2), 13);
    assert_eq!(interface.get_register(WOM_CONFIG), 0x06);

    // FIFO bypassed until a channel is configured
    assert_eq!(interface.get_register(FIFO_CONFIG1) & 0x01, 0x01);
}

#[test]
fn test_init_leaves_sensors_off_and_clock_released() {
    let (driver, interface) = create_initialized_driver();

    assert_eq!(interface.get_register(PWR_MGMT_0), 0x00);
    assert_eq!(driver.state().pwr_mgmt0, 0x00);
    assert_eq!(driver.state().clock.holders(), 0);
    assert_eq!(interface.bridge_violations(), 0);
    assert_eq!(driver.negotiated_odr(), None);
}

#[test]
fn test_init_reloads_otp_trim() {
    let (_driver, interface) = create_initialized_driver();

    // OTP copy mode TRIM, powered up, reload requested
    assert_eq!(interface.get_extended(0x102B) & 0x0C, 0x04);
    let otp_writes = interface.extended_writes_to(MREG_OTP_CTRL7);
    assert_eq!(otp_writes, vec![0x00, 0x08]);
}

#[test]
fn test_high_resolution_init() {
    let config = DriverConfig {
        layout: PacketLayout::HighResolution,
        ..DriverConfig::default()
    };
    let (mut driver, interface) = create_mock_driver_with(config);
    driver.init().unwrap();

    // ranges forced to 16 g / 2000 dps
    assert_eq!(interface.get_register(ACCEL_CONFIG0), 0x06);
    assert_eq!(interface.get_register(GYRO_CONFIG0), 0x06);
    assert_eq!(interface.get_extended(MREG_FIFO_CONFIG5), 0x2B);
}

#[test]
fn test_accel_only_layout_init() {
    let config = DriverConfig {
        layout: PacketLayout::AccelOnly,
        timestamps: false,
        ..DriverConfig::default()
    };
    let (mut driver, interface) = create_mock_driver_with(config);
    driver.init().unwrap();

    assert_eq!(interface.get_extended(MREG_FIFO_CONFIG5), 0x21);
    // timestamps stay disabled
    assert_eq!(interface.get_extended(0x1000) & 0x01, 0x00);
    assert!(!driver.state().timestamps);
}

#[test]
fn test_spi_init_locks_interface() {
    let interface = MockInterface::with_kind(InterfaceKind::Spi);
    let mut driver =
        Icm42670Driver::new(interface.clone(), MockDelay, DriverConfig::default()).unwrap();
    driver.init().unwrap();

    assert_eq!(driver.state().interface, InterfaceKind::Spi);
    // 4-wire SPI
    assert_eq!(interface.get_register(0x01), 0x04);
    // I2C slave disabled
    assert_eq!(interface.get_register(0x35) & 0x03, 0x03);
}

#[test]
fn test_polling_path_init() {
    let config = DriverConfig {
        data_path: DataPath::Polling,
        ..DriverConfig::default()
    };
    let (mut driver, _interface) = create_mock_driver_with(config);
    driver.init().unwrap();
    assert_eq!(driver.state().data_path, DataPath::Polling);
}

#[test]
fn test_init_is_repeatable() {
    let (mut driver, _interface) = create_initialized_driver();
    let first = *driver.state();
    driver.init().unwrap();
    assert_eq!(*driver.state(), first);
}
