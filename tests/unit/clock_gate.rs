//! Unit tests for the MCLK gate and the extended register bridge

use crate::common::mock_interface::*;
use crate::common::{MockDelay, RecordingDelay, create_initialized_driver, create_mock_driver};
use icm42670::{ChannelKind, DriverConfig, Error, FeatureKind, FeatureState, Icm42670Driver};

#[test]
fn test_no_window_access_without_clock() {
    let (mut driver, interface) = create_initialized_driver();

    driver.enable_channel(ChannelKind::Accel).unwrap();
    driver.set_channel_rate(ChannelKind::Accel, 25.0, 4).unwrap();
    driver.enable_wom().unwrap();
    driver.enable_pedometer().unwrap();
    driver.disable_feature(FeatureKind::Pedometer).unwrap();
    driver.disable_channel(ChannelKind::Accel).unwrap();

    assert!(
        interface
            .operations()
            .iter()
            .any(|op| matches!(op, Operation::WriteExtended { .. }))
    );
    assert_eq!(interface.bridge_violations(), 0);
    assert_eq!(driver.state().clock.holders(), 0);
    assert_eq!(interface.get_register(PWR_MGMT_0) & 0x10, 0x00);
}

#[test]
fn test_clock_started_once_per_outer_hold() {
    let (mut driver, interface) = create_initialized_driver();
    interface.clear_operations();

    driver.reset_fifo().unwrap();

    assert_eq!(interface.writes_to(PWR_MGMT_0), vec![0x10, 0x00]);
}

#[test]
fn test_nested_holds_verify_instead_of_restarting() {
    let (mut driver, interface) = create_initialized_driver();
    driver.enable_channel(ChannelKind::Accel).unwrap();
    interface.clear_operations();

    // low power: RCOSC select, mode change, then one read-modify-write of
    // FIFO_CONFIG6 and one FIFO restart, each under its own outer hold
    driver.set_channel_rate(ChannelKind::Accel, 25.0, 1).unwrap();

    assert_eq!(
        interface.writes_to(PWR_MGMT_0),
        vec![0x83, 0x82, 0x92, 0x82, 0x92, 0x82]
    );
    let verifications = interface
        .operations()
        .iter()
        .filter(|op| matches!(op, Operation::ReadRegister { address: PWR_MGMT_0, .. }))
        .count();
    // nested acquire and release each check IDLE
    assert_eq!(verifications, 4);
    assert_eq!(interface.bridge_violations(), 0);
}

#[test]
fn test_other_bank_selects_block_and_restores_it() {
    let (_driver, interface) = create_initialized_driver();

    let blocks = interface.writes_to(BLK_SEL_W);
    assert!(!blocks.is_empty());
    for pair in blocks.chunks(2) {
        assert_eq!(pair, [0x28, 0x00]);
    }
    assert_eq!(interface.get_register(BLK_SEL_W), 0x00);
    assert_eq!(interface.get_register(BLK_SEL_R), 0x00);
}

#[test]
fn test_mclk_never_ready() {
    let (mut driver, interface) = create_mock_driver();
    interface.stall_mclk(true);

    assert!(matches!(driver.init(), Err(Error::Hardware)));
    assert_eq!(driver.state().clock.holders(), 0);
    assert_eq!(interface.bridge_violations(), 0);
}

#[test]
fn test_clock_released_after_bus_error() {
    let (mut driver, interface) = create_initialized_driver();
    driver.enable_channel(ChannelKind::Accel).unwrap();
    driver.set_channel_rate(ChannelKind::Accel, 100.0, 1).unwrap();
    interface.push_fifo(&[0u8; 32]);
    interface.fail_next_read_of(FIFO_DATA);

    let result = driver.read_fifo();

    assert!(matches!(result, Err(Error::Bus(MockError::Communication))));
    assert!(driver.frame().is_empty());
    assert_eq!(driver.state().clock.holders(), 0);
    assert_eq!(interface.get_register(PWR_MGMT_0) & 0x10, 0x00);
}

#[test]
fn test_clock_released_after_window_error() {
    let interface = MockInterface::new();
    let mut driver =
        Icm42670Driver::new(interface.clone(), MockDelay, DriverConfig::default()).unwrap();
    driver.init().unwrap();
    driver.enable_channel(ChannelKind::Accel).unwrap();

    // the first extended read of the WOM sequence fails
    interface.fail_next_read_of(M_R);
    let result = driver.enable_wom();

    assert!(matches!(result, Err(Error::Bus(MockError::Communication))));
    assert_eq!(
        driver.state().features.get(FeatureKind::WakeOnMotion).state,
        FeatureState::Inactive
    );
    assert_eq!(driver.state().clock.holders(), 0);
    assert_eq!(interface.get_register(PWR_MGMT_0) & 0x10, 0x00);
    assert_eq!(interface.bridge_violations(), 0);
}

#[test]
fn test_window_reads_settle_before_data() {
    let interface = MockInterface::new();
    let delay = RecordingDelay::new(&interface);
    let mut driver = Icm42670Driver::new(interface.clone(), delay, DriverConfig::default()).unwrap();
    driver.init().unwrap();
    driver.enable_wom().unwrap();

    let operations = interface.operations();
    let settled = |op: &Operation| matches!(op, Operation::Delay { ns } if *ns >= 10_000);

    let reads: Vec<usize> = operations
        .iter()
        .enumerate()
        .filter(|(_, op)| matches!(op, Operation::ReadExtended { .. }))
        .map(|(index, _)| index)
        .collect();
    assert!(!reads.is_empty());
    for index in reads {
        assert!(
            settled(&operations[index - 1]),
            "M_R read at {index} follows {:?}",
            operations[index - 1]
        );
        assert!(matches!(
            operations[index - 2],
            Operation::WriteRegister { address: MADDR_R, .. }
        ));
    }

    // writes settle after the data byte
    for (index, op) in operations.iter().enumerate() {
        if matches!(op, Operation::WriteExtended { .. }) {
            assert!(matches!(
                operations[index - 1],
                Operation::WriteRegister { address: M_W, .. }
            ));
            assert!(settled(&operations[index + 1]));
        }
    }
}
