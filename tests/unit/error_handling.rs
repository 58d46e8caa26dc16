//! Unit tests for bus error propagation and recovery

use crate::common::mock_interface::*;
use crate::common::{MockDelay, create_initialized_driver, create_mock_driver};
use icm42670::{ChannelKind, DriverConfig, Error, Icm42670Driver};

#[test]
fn test_bus_error_converts() {
    let error: Error<MockError> = MockError::Communication.into();
    assert_eq!(error, Error::Bus(MockError::Communication));
}

#[test]
fn test_new_propagates_read_error() {
    let interface = MockInterface::new();
    interface.fail_next_read();

    let result = Icm42670Driver::new(interface, MockDelay, DriverConfig::default());

    assert!(matches!(result, Err(Error::Bus(MockError::Communication))));
}

#[test]
fn test_init_propagates_write_error() {
    let (mut driver, interface) = create_mock_driver();
    interface.fail_next_write();

    assert!(matches!(driver.init(), Err(Error::Bus(MockError::Communication))));
    assert!(!driver.state().initialized);
    assert_eq!(driver.state().clock.holders(), 0);
}

#[test]
fn test_init_recovers_after_failure() {
    let (mut driver, interface) = create_mock_driver();
    interface.fail_next_write();
    assert!(driver.init().is_err());

    driver.init().unwrap();

    assert!(driver.state().initialized);
    assert_eq!(driver.state().clock.holders(), 0);
    assert_eq!(interface.get_register(PWR_MGMT_0) & 0x10, 0x00);
}

#[test]
fn test_rate_write_error_then_reinit() {
    let (mut driver, interface) = create_initialized_driver();
    driver.enable_channel(ChannelKind::Accel).unwrap();
    interface.fail_next_write();

    let result = driver.set_channel_rate(ChannelKind::Accel, 100.0, 1);

    assert!(matches!(result, Err(Error::Bus(MockError::Communication))));
    assert_eq!(driver.state().clock.holders(), 0);

    driver.init().unwrap();
    assert_eq!(driver.negotiated_odr(), None);
    assert!(!driver.channel(ChannelKind::Accel).powered);
    assert_eq!(interface.get_register(PWR_MGMT_0), 0x00);
}

#[test]
fn test_event_read_error() {
    let (mut driver, interface) = create_initialized_driver();
    interface.fail_next_read_of(INT_STATUS2);

    assert!(matches!(
        driver.wom_event(),
        Err(Error::Bus(MockError::Communication))
    ));
}
