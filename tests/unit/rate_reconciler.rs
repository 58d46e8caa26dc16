//! Unit tests for rate negotiation between the channels and the features,
//! and for the accelerometer power decisions that follow from it

use crate::common::mock_interface::*;
use crate::common::{TestDriver, create_initialized_driver, create_mock_driver_with};
use icm42670::{ChannelKind, DataPath, DriverConfig, Error, Odr, PacketLayout};

fn accel_mode_bits(interface: &MockInterface) -> u8 {
    interface.get_register(PWR_MGMT_0) & 0x03
}

fn hardware_code(interface: &MockInterface) -> u8 {
    interface.get_register(ACCEL_CONFIG0) & 0x0F
}

/// Hardware rate covers every configured channel
fn assert_rate_covers_channels(driver: &TestDriver) {
    let hardware = driver.hardware_odr();
    for kind in [ChannelKind::Accel, ChannelKind::Gyro] {
        let channel = driver.channel(kind);
        if channel.configured {
            assert!(
                hardware >= channel.negotiated,
                "{:?} negotiated {:?} above hardware {:?}",
                kind,
                channel.negotiated,
                hardware
            );
        }
    }
}

#[test]
fn test_rate_is_quantized_up() {
    let (mut driver, interface) = create_initialized_driver();
    driver.enable_channel(ChannelKind::Accel).unwrap();

    let odr = driver.set_channel_rate(ChannelKind::Accel, 90.0, 1).unwrap();
    assert_eq!(odr, Odr::Hz100);
    assert_eq!(hardware_code(&interface), Odr::Hz100.code());
    assert_eq!(interface.get_register(GYRO_CONFIG0) & 0x0F, Odr::Hz100.code());

    let odr = driver.set_channel_rate(ChannelKind::Accel, 5000.0, 1).unwrap();
    assert_eq!(odr, Odr::Hz1600);
}

#[test]
fn test_invalid_rates_are_rejected() {
    let (mut driver, _interface) = create_initialized_driver();
    for hz in [0.0, -10.0, f32::NAN, f32::INFINITY] {
        assert!(matches!(
            driver.set_channel_rate(ChannelKind::Accel, hz, 1),
            Err(Error::InvalidConfig)
        ));
    }
    assert!(!driver.channel(ChannelKind::Accel).configured);
}

#[test]
fn test_gyro_rejected_without_gyro_packets() {
    let config = DriverConfig {
        layout: PacketLayout::AccelOnly,
        timestamps: false,
        ..DriverConfig::default()
    };
    let (mut driver, _interface) = create_mock_driver_with(config);
    driver.init().unwrap();

    assert!(matches!(
        driver.enable_channel(ChannelKind::Gyro),
        Err(Error::InvalidConfig)
    ));
    assert!(matches!(
        driver.set_channel_rate(ChannelKind::Gyro, 100.0, 1),
        Err(Error::InvalidConfig)
    ));
}

#[test]
fn test_low_noise_above_50_hz() {
    let (mut driver, interface) = create_initialized_driver();
    driver.enable_channel(ChannelKind::Accel).unwrap();
    driver.set_channel_rate(ChannelKind::Accel, 100.0, 1).unwrap();

    assert_eq!(accel_mode_bits(&interface), 0x03);
    assert!(!driver.state().rcosc_on_fifo_threshold);
}

#[test]
fn test_low_power_below_50_hz() {
    let (mut driver, interface) = create_initialized_driver();
    driver.enable_channel(ChannelKind::Accel).unwrap();
    driver.set_channel_rate(ChannelKind::Accel, 25.0, 1).unwrap();

    assert_eq!(accel_mode_bits(&interface), 0x02);
    // low power runs from the RC oscillator
    assert_eq!(interface.get_register(PWR_MGMT_0) & 0x80, 0x80);
    assert!(driver.state().rcosc_on_fifo_threshold);
    assert_eq!(interface.get_extended(MREG_FIFO_CONFIG6) & 0x01, 0x00);
}

#[test]
fn test_gyro_forces_low_noise() {
    let (mut driver, interface) = create_initialized_driver();
    driver.enable_channel(ChannelKind::Accel).unwrap();
    driver.set_channel_rate(ChannelKind::Accel, 25.0, 1).unwrap();
    assert_eq!(accel_mode_bits(&interface), 0x02);

    driver.enable_channel(ChannelKind::Gyro).unwrap();
    assert_eq!(accel_mode_bits(&interface), 0x03);
    assert_eq!(interface.get_register(PWR_MGMT_0) & 0x0C, 0x0C);
}

#[test]
fn test_gyro_alone_keeps_accel_off() {
    let (mut driver, interface) = create_initialized_driver();
    driver.enable_channel(ChannelKind::Gyro).unwrap();
    driver.set_channel_rate(ChannelKind::Gyro, 200.0, 1).unwrap();

    assert_eq!(accel_mode_bits(&interface), 0x00);
    assert_eq!(interface.get_register(PWR_MGMT_0) & 0x0C, 0x0C);
}

#[test]
fn test_channels_share_the_highest_rate() {
    let (mut driver, interface) = create_initialized_driver();
    driver.enable_channel(ChannelKind::Accel).unwrap();
    driver.enable_channel(ChannelKind::Gyro).unwrap();

    assert_eq!(
        driver.set_channel_rate(ChannelKind::Accel, 100.0, 1).unwrap(),
        Odr::Hz100
    );
    assert_eq!(
        driver.set_channel_rate(ChannelKind::Gyro, 200.0, 1).unwrap(),
        Odr::Hz200
    );
    assert_eq!(driver.channel(ChannelKind::Accel).negotiated, Some(Odr::Hz200));
    assert_eq!(driver.channel(ChannelKind::Gyro).negotiated, Some(Odr::Hz200));
    assert_eq!(driver.channel(ChannelKind::Accel).previous_negotiated, Some(Odr::Hz100));
    assert_eq!(hardware_code(&interface), Odr::Hz200.code());

    // a slower gyro request still runs at the accel rate
    assert_eq!(
        driver.set_channel_rate(ChannelKind::Gyro, 50.0, 1).unwrap(),
        Odr::Hz100
    );
    assert_eq!(hardware_code(&interface), Odr::Hz100.code());
}

#[test]
fn test_disable_restores_other_channel_rate() {
    let (mut driver, interface) = create_initialized_driver();
    driver.enable_channel(ChannelKind::Accel).unwrap();
    driver.enable_channel(ChannelKind::Gyro).unwrap();
    driver.set_channel_rate(ChannelKind::Accel, 100.0, 4).unwrap();
    driver.set_channel_rate(ChannelKind::Gyro, 400.0, 8).unwrap();
    assert_eq!(hardware_code(&interface), Odr::Hz400.code());

    driver.disable_channel(ChannelKind::Gyro).unwrap();

    let accel = driver.channel(ChannelKind::Accel);
    assert_eq!(accel.negotiated, Some(Odr::Hz100));
    assert_eq!(hardware_code(&interface), Odr::Hz100.code());
    assert_eq!(driver.state().fifo_watermark, 4 * 16);
    assert_eq!(interface.get_register(FIFO_CONFIG2), 64);

    let gyro = driver.channel(ChannelKind::Gyro);
    assert!(!gyro.powered);
    assert!(!gyro.configured);
    assert_eq!(gyro.negotiated, None);
    assert_eq!(interface.get_register(PWR_MGMT_0) & 0x0C, 0x00);
    assert_eq!(accel_mode_bits(&interface), 0x03);
}

#[test]
fn test_disabling_everything_masks_interrupts() {
    let (mut driver, interface) = create_initialized_driver();
    driver.enable_channel(ChannelKind::Accel).unwrap();
    driver.set_channel_rate(ChannelKind::Accel, 25.0, 1).unwrap();
    assert_eq!(interface.get_register(INT_SOURCE0) & 0x06, 0x06);

    driver.disable_channel(ChannelKind::Accel).unwrap();

    assert_eq!(accel_mode_bits(&interface), 0x00);
    assert_eq!(interface.get_register(INT_SOURCE0) & 0x0E, 0x00);
    assert!(!driver.state().rcosc_on_fifo_threshold);
    // FIFO back in bypass
    assert_eq!(interface.get_register(FIFO_CONFIG1) & 0x01, 0x01);
}

#[test]
fn test_watermark_is_clamped() {
    let (mut driver, interface) = create_initialized_driver();
    driver.enable_channel(ChannelKind::Accel).unwrap();

    driver.set_channel_rate(ChannelKind::Accel, 100.0, 10).unwrap();
    assert_eq!(driver.state().fifo_watermark, 160);
    assert_eq!(interface.get_register(FIFO_CONFIG2), 160);
    // FIFO streaming
    assert_eq!(interface.get_register(FIFO_CONFIG1) & 0x01, 0x00);

    driver.set_channel_rate(ChannelKind::Accel, 100.0, 500).unwrap();
    assert_eq!(driver.state().fifo_watermark, 64 * 16);
    assert_eq!(interface.get_register(FIFO_CONFIG2), 0x00);
    assert_eq!(interface.get_register(0x2A), 0x04);

    driver.set_channel_rate(ChannelKind::Accel, 100.0, 0).unwrap();
    assert_eq!(driver.state().fifo_watermark, 16);
}

#[test]
fn test_fifo_restarts_only_on_change() {
    let (mut driver, interface) = create_initialized_driver();
    driver.enable_channel(ChannelKind::Accel).unwrap();
    driver.set_channel_rate(ChannelKind::Accel, 100.0, 10).unwrap();
    assert_eq!(interface.writes_to(SIGNAL_PATH_RESET).len(), 2);

    // same rate and watermark: no flush
    driver.set_channel_rate(ChannelKind::Accel, 100.0, 10).unwrap();
    assert_eq!(interface.writes_to(SIGNAL_PATH_RESET).len(), 2);

    driver.set_channel_rate(ChannelKind::Accel, 200.0, 10).unwrap();
    assert_eq!(interface.writes_to(SIGNAL_PATH_RESET).len(), 3);
}

#[test]
fn test_polling_path_enables_data_ready() {
    let config = DriverConfig {
        data_path: DataPath::Polling,
        ..DriverConfig::default()
    };
    let (mut driver, interface) = create_mock_driver_with(config);
    driver.init().unwrap();
    driver.enable_channel(ChannelKind::Accel).unwrap();
    driver.set_channel_rate(ChannelKind::Accel, 100.0, 1).unwrap();

    assert_eq!(interface.get_register(INT_SOURCE0) & 0x0E, 0x08);
}

#[test]
fn test_discard_window_armed_once() {
    let config = DriverConfig {
        discard_samples: 3,
        ..DriverConfig::default()
    };
    let (mut driver, _interface) = create_mock_driver_with(config);
    driver.init().unwrap();
    driver.enable_channel(ChannelKind::Accel).unwrap();

    driver.set_channel_rate(ChannelKind::Accel, 100.0, 1).unwrap();
    assert_eq!(driver.channel(ChannelKind::Accel).discard, 3);
    assert_eq!(driver.channel(ChannelKind::Accel).requested_hz, Some(100.0));

    driver.set_channel_rate(ChannelKind::Accel, 200.0, 1).unwrap();
    assert_eq!(driver.channel(ChannelKind::Accel).discard, 3);
}

#[test]
fn test_feature_floor_applies_to_accel_only() {
    let (mut driver, interface) = create_initialized_driver();
    driver.enable_free_fall().unwrap();

    // the gyroscope request is not raised to the free-fall minimum
    driver.enable_channel(ChannelKind::Gyro).unwrap();
    assert_eq!(
        driver.set_channel_rate(ChannelKind::Gyro, 100.0, 1).unwrap(),
        Odr::Hz100
    );
    assert_eq!(hardware_code(&interface), Odr::Hz100.code());

    // the accelerometer request is
    driver.enable_channel(ChannelKind::Accel).unwrap();
    assert_eq!(
        driver.set_channel_rate(ChannelKind::Accel, 100.0, 1).unwrap(),
        Odr::Hz400
    );
    assert_eq!(driver.channel(ChannelKind::Gyro).negotiated, Some(Odr::Hz400));
    assert_eq!(hardware_code(&interface), Odr::Hz400.code());
}

#[test]
fn test_hardware_rate_covers_channels_through_sequence() {
    let (mut driver, _interface) = create_initialized_driver();

    driver.enable_channel(ChannelKind::Accel).unwrap();
    driver.set_channel_rate(ChannelKind::Accel, 50.0, 2).unwrap();
    assert_rate_covers_channels(&driver);

    driver.enable_channel(ChannelKind::Gyro).unwrap();
    driver.set_channel_rate(ChannelKind::Gyro, 800.0, 2).unwrap();
    assert_rate_covers_channels(&driver);

    driver.enable_wom().unwrap();
    assert_rate_covers_channels(&driver);

    driver.set_channel_rate(ChannelKind::Accel, 12.5, 2).unwrap();
    assert_rate_covers_channels(&driver);

    driver.disable_channel(ChannelKind::Gyro).unwrap();
    assert_rate_covers_channels(&driver);
    assert!(driver.hardware_odr() >= Some(Odr::Hz25));

    driver.enable_pedometer().unwrap();
    assert_rate_covers_channels(&driver);
    assert!(driver.hardware_odr() >= Some(Odr::Hz50));

    driver.disable_feature(icm42670::FeatureKind::WakeOnMotion).unwrap();
    assert_rate_covers_channels(&driver);

    driver.disable_channel(ChannelKind::Accel).unwrap();
    assert!(driver.hardware_odr() >= Some(Odr::Hz50));

    driver.disable_feature(icm42670::FeatureKind::Pedometer).unwrap();
    assert_eq!(driver.negotiated_odr(), None);
    assert_eq!(driver.state().clock.holders(), 0);
}
