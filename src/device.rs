//! High-level driver API for the ICM-42670
//!
//! This module provides the [`Icm42670Driver`], which owns the bus interface,
//! the delay provider and all device state. It handles the MCLK clock gate,
//! the indirect MREG bridge, rate and power reconciliation between the two
//! sensor channels and the always-on features, FIFO draining and decoding,
//! and the on-chip self-test.

use crate::clock::{AcquireStep, ReleaseStep};
use crate::features::{AuxFeature, FeatureKind, FeatureSet, FeatureState, FreeFallEvent, PedometerEvent, WomEvent};
use crate::fifo::parser::{FifoDecoder, read_triple, temperature_from_2_bytes};
use crate::fifo::{ChannelKind, DataPath, FIFO_CAPACITY, FifoFrame, PacketLayout, SampleRecord};
use crate::interface::{InterfaceKind, SerialInterface};
use crate::odr::Odr;
use crate::poll::PollBudget;
use crate::power::{AccelMode, ChannelState, GyroMode, PowerDecision, Requesters, watermark_bytes};
use crate::registers::Icm42670 as RegisterDevice;
use crate::registers::{addr, bits, mreg};
use crate::self_test::{SelfTestRequest, SelfTestResult, st_config};
use crate::sensors::{AccelRange, GyroRange, MountingMatrix};
use crate::{ApexParameters, ChipVariant, Error, WomConfig};

use device_driver::RegisterInterface;
use embedded_hal::delay::DelayNs;

/// Capacity of each channel vector in a [`SampleBatch`]
///
/// A full FIFO of the smallest packets fits, so no drain can overflow a batch.
pub const MAX_BATCH_RECORDS: usize = FIFO_CAPACITY / PacketLayout::AccelOnly.size();

/// `INTF_CONFIG0.ui_sifs_cfg`: disable the SPI slave
const UI_SIFS_DISABLE_SPI: u8 = 2;
/// `INTF_CONFIG0.ui_sifs_cfg`: disable the I2C slave
const UI_SIFS_DISABLE_I2C: u8 = 3;

/// Every power mode change needs this long before the next one
const MODE_SETTLE_US: u32 = 200;

/// MREG window access time, in microseconds
const WINDOW_SETTLE_US: u32 = 10;

/// Samples produced by one [`Icm42670Driver::poll_batch`] call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBatch {
    /// Accelerometer records, oldest first
    pub accel: heapless::Vec<SampleRecord, MAX_BATCH_RECORDS>,
    /// Gyroscope records, oldest first
    pub gyro: heapless::Vec<SampleRecord, MAX_BATCH_RECORDS>,
    /// Most recent die temperature in °C
    pub temperature: Option<f32>,
}

impl SampleBatch {
    /// Empty batch
    #[must_use]
    pub const fn new() -> Self {
        Self {
            accel: heapless::Vec::new(),
            gyro: heapless::Vec::new(),
            temperature: None,
        }
    }

    /// Whether the batch holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accel.is_empty() && self.gyro.is_empty()
    }

    /// Total number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.accel.len() + self.gyro.len()
    }

    /// Append a record to the vector of its channel
    ///
    /// Returns the record back when that vector is full.
    pub fn push(&mut self, record: SampleRecord) -> Result<(), SampleRecord> {
        match record.channel {
            ChannelKind::Accel => self.accel.push(record)?,
            ChannelKind::Gyro => self.gyro.push(record)?,
        }
        self.temperature = Some(record.temperature);
        Ok(())
    }
}

/// Static driver configuration
///
/// # Example
///
/// ```
/// use icm42670::{DataPath, DriverConfig, PacketLayout};
///
/// let config = DriverConfig {
///     layout: PacketLayout::HighResolution,
///     ..DriverConfig::default()
/// };
/// assert!(config.is_valid());
/// assert!(config.high_resolution());
///
/// let polling = DriverConfig { data_path: DataPath::Polling, ..config };
/// assert!(!polling.high_resolution());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriverConfig {
    /// FIFO draining or register polling
    pub data_path: DataPath,
    /// FIFO packet layout
    pub layout: PacketLayout,
    /// Record FIFO timestamps (requires a layout with a timestamp field)
    pub timestamps: bool,
    /// Accelerometer full-scale range (forced to ±16 g in high resolution)
    pub accel_range: AccelRange,
    /// Gyroscope full-scale range (forced to ±2000 dps in high resolution)
    pub gyro_range: GyroRange,
    /// Board placement applied to every sample
    pub mounting: MountingMatrix,
    /// Wake-on-motion thresholds and duration
    pub wom: WomConfig,
    /// APEX (pedometer, tilt, free-fall) tuning
    pub apex: ApexParameters,
    /// Samples dropped per channel after its first rate configuration
    pub discard_samples: u16,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            data_path: DataPath::Fifo,
            layout: PacketLayout::Standard,
            timestamps: true,
            accel_range: AccelRange::default(),
            gyro_range: GyroRange::default(),
            mounting: MountingMatrix::default(),
            wom: WomConfig::default(),
            apex: ApexParameters::default(),
            discard_samples: 0,
        }
    }
}

impl DriverConfig {
    /// Whether the combination of options is supported
    ///
    /// The accelerometer-only layout carries no timestamp field, so it must be
    /// used with `timestamps` off.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        !(self.timestamps && !self.layout.has_timestamp())
    }

    /// Whether 20-bit samples are produced
    #[must_use]
    pub const fn high_resolution(&self) -> bool {
        matches!(self.data_path, DataPath::Fifo) && self.layout.is_high_resolution()
    }

    /// Full-scale ranges actually programmed
    #[must_use]
    pub const fn effective_ranges(&self) -> (AccelRange, GyroRange) {
        if self.high_resolution() {
            (AccelRange::G16, GyroRange::Dps2000)
        } else {
            (self.accel_range, self.gyro_range)
        }
    }
}

/// Everything the driver knows about the device
///
/// `init()` resets this to a fresh value, so two drivers that ran `init()` on
/// identical hardware compare equal.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceState {
    /// Chip detected from `WHO_AM_I`
    pub chip: ChipVariant,
    /// Serial interface in use
    pub interface: InterfaceKind,
    /// FIFO or polling
    pub data_path: DataPath,
    /// FIFO packet layout
    pub layout: PacketLayout,
    /// FIFO timestamps enabled
    pub timestamps: bool,
    /// MCLK holders
    pub clock: crate::clock::ClockGate,
    /// Shadow of `PWR_MGMT_0`
    pub pwr_mgmt0: u8,
    /// Shadow of `ACCEL_CONFIG0`
    pub accel_config0: u8,
    /// Shadow of `GYRO_CONFIG0`
    pub gyro_config0: u8,
    /// Shadow of `INT_SOURCE0`
    pub int_source0: u8,
    /// Accelerometer channel
    pub accel: ChannelState,
    /// Gyroscope channel
    pub gyro: ChannelState,
    /// Always-on features
    pub features: FeatureSet,
    /// Watermark currently programmed, in bytes
    pub fifo_watermark: u16,
    /// RC oscillator requested on FIFO threshold
    pub rcosc_on_fifo_threshold: bool,
    /// DMP memories were reset since the last initialization
    pub dmp_started: bool,
    /// `init()` completed
    pub initialized: bool,
}

impl DeviceState {
    fn new(chip: ChipVariant, interface: InterfaceKind, config: &DriverConfig) -> Self {
        Self {
            chip,
            interface,
            data_path: config.data_path,
            layout: config.layout,
            timestamps: config.timestamps && config.layout.has_timestamp(),
            clock: crate::clock::ClockGate::new(),
            pwr_mgmt0: 0,
            accel_config0: 0,
            gyro_config0: 0,
            int_source0: 0,
            accel: ChannelState::default(),
            gyro: ChannelState::default(),
            features: FeatureSet::default(),
            fifo_watermark: 0,
            rcosc_on_fifo_threshold: false,
            dmp_started: false,
            initialized: false,
        }
    }

    const fn requesters(&self) -> Requesters {
        Requesters {
            accel: self.accel.powered,
            gyro: self.gyro.powered,
            wom: self.features.is_active(FeatureKind::WakeOnMotion),
            pedometer: self.features.is_active(FeatureKind::Pedometer),
            free_fall: self.features.is_active(FeatureKind::FreeFall),
        }
    }

    fn accel_mode(&self) -> AccelMode {
        AccelMode::from_bits(self.pwr_mgmt0 & bits::PWR_ACCEL_MODE_MASK)
    }

    fn gyro_mode(&self) -> GyroMode {
        GyroMode::from_bits((self.pwr_mgmt0 & bits::PWR_GYRO_MODE_MASK) >> bits::PWR_GYRO_MODE_SHIFT)
    }
}

/// Main driver for the ICM-42670
pub struct Icm42670Driver<I, D> {
    device: RegisterDevice<I>,
    delay: D,
    config: DriverConfig,
    state: DeviceState,
    frame: FifoFrame,
}

impl<I, D> Icm42670Driver<I, D>
where
    I: RegisterInterface<AddressType = u8> + SerialInterface,
    D: DelayNs,
{
    /// Create a new ICM-42670 driver instance
    ///
    /// This identifies the chip through `WHO_AM_I` but does not touch its
    /// configuration. Call [`init()`](Self::init) before anything else.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid ([`Error::InvalidConfig`])
    /// - Communication with the device fails
    /// - `WHO_AM_I` matches no supported chip ([`Error::InvalidDevice`])
    pub fn new(interface: I, delay: D, config: DriverConfig) -> Result<Self, Error<I::Error>> {
        if !config.is_valid() {
            return Err(Error::InvalidConfig);
        }

        let mut device = RegisterDevice::new(interface);
        let who_am_i = device.who_am_i().read()?.who_am_i();
        let chip = ChipVariant::from_who_am_i(who_am_i).ok_or(Error::InvalidDevice(who_am_i))?;

        #[cfg(feature = "defmt")]
        defmt::info!("Detected {} (WHO_AM_I=0x{:02X})", chip, who_am_i);

        let kind = device.interface.kind();
        Ok(Self {
            device,
            delay,
            config,
            state: DeviceState::new(chip, kind, &config),
            frame: FifoFrame::new(config.layout),
        })
    }

    /// Initialize the device
    ///
    /// Locks the serial interface, soft-resets the chip, reloads the OTP trim
    /// and programs the defaults: full-scale ranges, INT1 push-pull active high
    /// pulsed, 16 us timestamp resolution, FIFO packet format, wake-on-motion
    /// and APEX parameters. Both sensors are left off.
    ///
    /// All driver state is reset, so `init()` can also be used to recover from
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns an error if communication fails or the device does not report
    /// a completed reset ([`Error::Hardware`]).
    pub fn init(&mut self) -> Result<(), Error<I::Error>> {
        self.state = DeviceState::new(self.state.chip, self.state.interface, &self.config);
        self.frame.reset(self.config.layout);

        self.delay.delay_ms(3);
        self.configure_serial_interface()?;
        self.delay.delay_ms(3);
        self.device_reset()?;
        self.load_shadows()?;

        let (accel_range, gyro_range) = self.config.effective_ranges();
        self.state.gyro_config0 = (self.state.gyro_config0 & !bits::CONFIG0_FS_MASK)
            | (gyro_range.fs_sel() << bits::CONFIG0_FS_SHIFT);
        self.state.accel_config0 = (self.state.accel_config0 & !bits::CONFIG0_FS_MASK)
            | (accel_range.fs_sel() << bits::CONFIG0_FS_SHIFT);
        self.write_config0()?;

        self.device.int_config().write(|w| {
            w.set_int_1_polarity(true);
            w.set_int_1_drive_circuit(true);
            w.set_int_1_mode(false);
        })?;

        let mut int_source0 = [0u8];
        self.read_raw(addr::INT_SOURCE0, &mut int_source0)?;
        self.state.int_source0 = int_source0[0];

        self.modify_extended(mreg::TMST_CONFIG1, 0, mreg::TMST_RES_16US)?;
        self.configure_fifo_interface()?;
        self.configure_wom()?;
        self.configure_apex()?;
        self.write_rcosc_on_fifo_threshold(false)?;

        self.state.initialized = true;

        #[cfg(feature = "defmt")]
        defmt::info!("ICM-42670 initialized ({})", self.state.layout);

        Ok(())
    }

    /// Current device state
    pub const fn state(&self) -> &DeviceState {
        &self.state
    }

    /// State of one sensor channel
    pub const fn channel(&self, kind: ChannelKind) -> &ChannelState {
        match kind {
            ChannelKind::Accel => &self.state.accel,
            ChannelKind::Gyro => &self.state.gyro,
        }
    }

    /// Active configuration
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Last drained FIFO frame
    pub const fn frame(&self) -> &FifoFrame {
        &self.frame
    }

    /// Highest rate negotiated by either channel or feature
    pub fn negotiated_odr(&self) -> Option<Odr> {
        self.state.accel.negotiated.max(self.state.gyro.negotiated)
    }

    /// Rate currently programmed in `ACCEL_CONFIG0` and `GYRO_CONFIG0`
    pub fn hardware_odr(&self) -> Option<Odr> {
        Odr::from_code(self.state.accel_config0 & bits::CONFIG0_ODR_MASK)
    }

    /// Consume the driver and return the interface and delay provider
    pub fn release(self) -> (I, D) {
        (self.device.interface, self.delay)
    }

}

/// Sensor channels and rate reconciliation
impl<I, D> Icm42670Driver<I, D>
where
    I: RegisterInterface<AddressType = u8> + SerialInterface,
    D: DelayNs,
{
    /// Power up a sensor channel
    ///
    /// The accelerometer needs 20 ms and the gyroscope 100 ms before their
    /// first samples are valid; this call waits for it. Samples are reported
    /// once the channel also has a rate (see
    /// [`set_channel_rate`](Self::set_channel_rate)).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for the gyroscope when the FIFO layout
    /// has no gyroscope field, or an error if communication fails.
    pub fn enable_channel(&mut self, kind: ChannelKind) -> Result<(), Error<I::Error>> {
        self.check_channel(kind)?;
        match kind {
            ChannelKind::Accel => {
                self.state.accel.powered = true;
                self.apply_accel_power()?;
                self.delay.delay_ms(20);
            }
            ChannelKind::Gyro => {
                self.state.gyro.powered = true;
                self.set_gyro_mode(GyroMode::LowNoise)?;
                self.apply_accel_power()?;
                self.delay.delay_ms(100);
            }
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("{} enabled", kind);

        Ok(())
    }

    /// Power down a sensor channel
    ///
    /// The other channel gets its own negotiated rate and watermark back.
    /// The accelerometer stays on in the mode the remaining requesters need;
    /// when neither channel is powered the FIFO and data-ready interrupts are
    /// masked.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn disable_channel(&mut self, kind: ChannelKind) -> Result<(), Error<I::Error>> {
        self.channel_mut(kind).clear_rate();

        let other = *self.channel(kind.other());
        let mut odr_changed = false;
        let mut watermark_changed = false;
        if other.powered {
            if other.negotiated != other.previous_negotiated {
                if let Some(odr) = other.previous_negotiated {
                    self.write_odr(odr)?;
                }
                self.channel_mut(kind.other()).negotiated = other.previous_negotiated;
                odr_changed = true;
            }
            if self.state.fifo_watermark != other.watermark {
                self.state.fifo_watermark = other.watermark;
                watermark_changed = true;
            }
        }

        {
            let channel = self.channel_mut(kind);
            channel.powered = false;
            channel.configured = false;
        }

        if kind == ChannelKind::Gyro {
            self.set_gyro_mode(GyroMode::Off)?;
            self.delay.delay_ms(20);
        }
        if !self.state.accel.configured {
            self.raise_to_feature_floor()?;
        }
        self.apply_accel_power()?;

        if self.state.data_path == DataPath::Fifo {
            self.configure_fifo(odr_changed || watermark_changed)?;
        }

        if !self.state.accel.powered && !self.state.gyro.powered {
            self.write_rcosc_on_fifo_threshold(false)?;
            self.write_int_source0(
                self.state.int_source0 & !(bits::INT_FIFO_THS | bits::INT_FIFO_FULL | bits::INT_DRDY),
            )?;
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("{} disabled", kind);

        Ok(())
    }

    /// Request a sample rate for a channel
    ///
    /// Both channels share one sample clock, so the programmed rate is the
    /// highest of the two requests. Accelerometer requests are also raised to
    /// the minimum rate of the active features (wake-on-motion 25 Hz, pedometer
    /// 50 Hz, free-fall 400 Hz).
    ///
    /// # Arguments
    ///
    /// * `kind` - Channel to configure
    /// * `hz` - Requested rate; quantized up to the next supported [`Odr`]
    /// * `watermark_packets` - FIFO packets per threshold interrupt (1-64)
    ///
    /// # Returns
    ///
    /// The rate the channel actually runs at.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for non-positive or non-finite rates,
    /// or an error if communication fails.
    ///
    /// # Example
    ///
    /// ```ignore
    /// imu.enable_channel(ChannelKind::Accel)?;
    /// let odr = imu.set_channel_rate(ChannelKind::Accel, 100.0, 10)?;
    /// assert_eq!(odr, Odr::Hz100);
    /// ```
    pub fn set_channel_rate(
        &mut self,
        kind: ChannelKind,
        hz: f32,
        watermark_packets: u16,
    ) -> Result<Odr, Error<I::Error>> {
        self.check_channel(kind)?;
        let mut odr = Odr::quantize(hz).ok_or(Error::InvalidConfig)?;
        if kind == ChannelKind::Accel {
            if let Some(floor) = self.state.features.rate_floor() {
                odr = odr.max(floor);
            }
        }

        let discard = self.config.discard_samples;
        {
            let channel = self.channel_mut(kind);
            if channel.previous_negotiated.is_none() {
                channel.discard = discard;
            }
            channel.requested_hz = Some(hz);
            channel.previous_negotiated = Some(odr);
        }

        let current = *self.channel(kind);
        let other = *self.channel(kind.other());
        let odr_changed = if other.configured {
            let shared = other.previous_negotiated.map_or(odr, |rate| rate.max(odr));
            let changed = current.negotiated != Some(shared) || other.negotiated != Some(shared);
            if changed {
                self.channel_mut(kind).negotiated = Some(shared);
                self.channel_mut(kind.other()).negotiated = Some(shared);
                self.write_odr(shared)?;
            }
            changed
        } else {
            let changed = current.negotiated != Some(odr);
            if changed {
                self.channel_mut(kind).negotiated = Some(odr);
                self.write_odr(odr)?;
            }
            changed
        };

        self.channel_mut(kind).configured = true;
        self.apply_accel_power()?;

        match self.state.data_path {
            DataPath::Fifo => {
                let watermark = watermark_bytes(watermark_packets, self.state.layout.size());
                self.channel_mut(kind).watermark = watermark;
                let watermark_changed = watermark != self.state.fifo_watermark;
                self.state.fifo_watermark = watermark;
                self.configure_fifo(odr_changed || watermark_changed)?;
                self.enable_data_interrupts(bits::INT_FIFO_THS | bits::INT_FIFO_FULL)?;
            }
            DataPath::Polling => self.enable_data_interrupts(bits::INT_DRDY)?,
        }

        let negotiated = self.channel(kind).negotiated.unwrap_or(odr);

        #[cfg(feature = "defmt")]
        defmt::debug!("{} rate {} Hz -> {}", kind, hz, negotiated);

        Ok(negotiated)
    }

    fn check_channel(&self, kind: ChannelKind) -> Result<(), Error<I::Error>> {
        if kind == ChannelKind::Gyro
            && self.state.data_path == DataPath::Fifo
            && !self.state.layout.has_gyro()
        {
            return Err(Error::InvalidConfig);
        }
        Ok(())
    }

    const fn channel_mut(&mut self, kind: ChannelKind) -> &mut ChannelState {
        match kind {
            ChannelKind::Accel => &mut self.state.accel,
            ChannelKind::Gyro => &mut self.state.gyro,
        }
    }

    fn enable_data_interrupts(&mut self, mask: u8) -> Result<(), Error<I::Error>> {
        if self.state.int_source0 & mask != mask {
            self.write_int_source0(self.state.int_source0 | mask)?;
        }
        Ok(())
    }

}

/// Accelerometer power mode and clock source
impl<I, D> Icm42670Driver<I, D>
where
    I: RegisterInterface<AddressType = u8> + SerialInterface,
    D: DelayNs,
{
    /// Bring the accelerometer mode and RCOSC policy in line with the
    /// current requesters
    fn apply_accel_power(&mut self) -> Result<(), Error<I::Error>> {
        let decision = PowerDecision::select(&self.state.requesters(), self.state.accel.negotiated);
        self.set_accel_mode(decision.accel)?;
        if decision.rcosc_on_fifo_threshold != self.state.rcosc_on_fifo_threshold {
            self.write_rcosc_on_fifo_threshold(decision.rcosc_on_fifo_threshold)?;
        }
        Ok(())
    }

    fn set_accel_mode(&mut self, mode: AccelMode) -> Result<(), Error<I::Error>> {
        let current = self.state.accel_mode();
        if current == mode {
            return Ok(());
        }

        if self.state.gyro_mode().is_idle() {
            if mode == AccelMode::LowPower {
                self.select_rcosc()?;
            } else if mode == AccelMode::LowNoise && current == AccelMode::LowPower {
                // one sample period on RCOSC before leaving low power
                self.select_rcosc()?;
                let period_us = self.hardware_odr().map_or(0, Odr::period_us);
                self.delay.delay_ms(period_us / 1000 + 1);
            }
        }

        self.write_pwr_mgmt0((self.state.pwr_mgmt0 & !bits::PWR_ACCEL_MODE_MASK) | mode.bits())?;
        self.delay.delay_us(MODE_SETTLE_US);

        #[cfg(feature = "defmt")]
        defmt::debug!("Accel mode {} -> {}", current, mode);

        Ok(())
    }

    fn set_gyro_mode(&mut self, mode: GyroMode) -> Result<(), Error<I::Error>> {
        let value = (self.state.pwr_mgmt0 & !bits::PWR_GYRO_MODE_MASK)
            | (mode.bits() << bits::PWR_GYRO_MODE_SHIFT);
        self.write_pwr_mgmt0(value)
    }

    fn select_rcosc(&mut self) -> Result<(), Error<I::Error>> {
        self.write_pwr_mgmt0(self.state.pwr_mgmt0 | bits::PWR_ACCEL_LP_CLK_RCOSC)
    }

    fn write_rcosc_on_fifo_threshold(&mut self, enable: bool) -> Result<(), Error<I::Error>> {
        let set = if enable { 0 } else { mreg::RCOSC_REQ_ON_FIFO_THS_DIS };
        self.modify_extended(mreg::FIFO_CONFIG6, mreg::RCOSC_REQ_ON_FIFO_THS_DIS, set)?;
        self.state.rcosc_on_fifo_threshold = enable;
        Ok(())
    }

    /// Make sure the programmed rate satisfies the active features
    fn raise_to_feature_floor(&mut self) -> Result<(), Error<I::Error>> {
        let Some(floor) = self.state.features.rate_floor() else {
            return Ok(());
        };
        if self.negotiated_odr().is_some_and(|odr| odr >= floor) {
            return Ok(());
        }

        self.state.accel.negotiated = Some(floor);
        if self.state.gyro.configured {
            self.state.gyro.negotiated = Some(floor);
        }
        self.write_odr(floor)?;
        self.delay.delay_us(MODE_SETTLE_US);
        Ok(())
    }

}

/// FIFO draining and the register polling path
impl<I, D> Icm42670Driver<I, D>
where
    I: RegisterInterface<AddressType = u8> + SerialInterface,
    D: DelayNs,
{
    /// Flush the FIFO
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the flush bit does not clear, or an error
    /// if communication fails.
    pub fn reset_fifo(&mut self) -> Result<(), Error<I::Error>> {
        self.with_clock(|driver| {
            driver.device.signal_path_reset().write(|w| {
                w.set_fifo_flush(true);
            })?;
            driver.delay.delay_us(10);
            driver.poll_until(PollBudget::FIFO_FLUSH, |driver| {
                Ok(!driver.device.signal_path_reset().read()?.fifo_flush())
            })
        })?;

        #[cfg(feature = "defmt")]
        defmt::debug!("FIFO flushed");

        Ok(())
    }

    /// Drain the FIFO into the driver's frame buffer
    ///
    /// The byte count is read first and the whole content is then read in a
    /// single transfer. Decode the result with
    /// [`decode_fifo`](Self::decode_fifo).
    ///
    /// # Errors
    ///
    /// Returns [`Error::FifoCountInvalid`] when the count is 0 or larger than
    /// the FIFO, or an error if communication fails. The frame is empty after
    /// an error.
    pub fn read_fifo(&mut self) -> Result<&FifoFrame, Error<I::Error>> {
        self.acquire_clock()?;
        let drained = self.drain_fifo();
        let released = self.release_clock();
        if drained.is_err() {
            self.frame.discard();
        }
        drained?;
        released?;
        Ok(&self.frame)
    }

    fn drain_fifo(&mut self) -> Result<(), Error<I::Error>> {
        let mut count = [0u8; 2];
        self.read_raw(addr::FIFO_COUNTH, &mut count)?;
        let count = u16::from_le_bytes(count);
        if count == 0 || usize::from(count) > FIFO_CAPACITY {
            #[cfg(feature = "defmt")]
            defmt::warn!("Invalid FIFO count {}", count);
            return Err(Error::FifoCountInvalid(count));
        }

        let buffer = self.frame.fill(usize::from(count));
        self.device.interface.read_register(addr::FIFO_DATA, 8, buffer)?;
        Ok(())
    }

    /// Decode the last drained frame
    ///
    /// Only channels that are powered and configured are emitted; their
    /// discard windows are consumed as packets go by.
    pub fn decode_fifo(&mut self) -> FifoDecoder<'_> {
        let timestamps_on = self.state.timestamps;
        let accel_streaming = self.state.accel.is_streaming();
        let gyro_streaming = self.state.gyro.is_streaming();

        let (bytes, layout, timestamps) = self.frame.split();
        let accel = if accel_streaming {
            Some(&mut self.state.accel.discard)
        } else {
            None
        };
        let gyro = if gyro_streaming {
            Some(&mut self.state.gyro.discard)
        } else {
            None
        };
        FifoDecoder::new(bytes, layout, timestamps_on.then_some(timestamps), accel, gyro)
    }

    /// Collect the samples that are ready
    ///
    /// In FIFO mode this checks `INT_STATUS` and drains the FIFO once the
    /// watermark is reached; with no event pending the batch is empty. In
    /// polling mode the data registers are read directly. Every record is
    /// rotated through the configured [`MountingMatrix`].
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The FIFO filled up ([`Error::FifoOverflow`], the FIFO has been flushed)
    /// - The watermark fired with no channel configured ([`Error::Hardware`])
    /// - A drain decodes more records than a batch holds ([`Error::BatchFull`]);
    ///   batches are sized for a full FIFO, so this only guards the invariant
    /// - Communication with the device fails
    ///
    /// # Example
    ///
    /// ```ignore
    /// let batch = imu.poll_batch()?;
    /// for record in &batch.accel {
    ///     let g = AccelData::from_raw(record.axes(), AccelRange::G4, false);
    /// }
    /// ```
    pub fn poll_batch(&mut self) -> Result<SampleBatch, Error<I::Error>> {
        match self.state.data_path {
            DataPath::Fifo => self.poll_fifo(),
            DataPath::Polling => self.poll_registers(),
        }
    }

    fn poll_fifo(&mut self) -> Result<SampleBatch, Error<I::Error>> {
        let status = self.device.int_status().read()?;
        if status.fifo_full_int() {
            #[cfg(feature = "defmt")]
            defmt::warn!("FIFO overflow, flushing");
            self.reset_fifo()?;
            return Err(Error::FifoOverflow);
        }
        if !status.fifo_ths_int() {
            return Ok(SampleBatch::new());
        }
        if !self.state.accel.configured && !self.state.gyro.configured {
            #[cfg(feature = "defmt")]
            defmt::warn!("Unexpected FIFO watermark interrupt");
            self.reset_fifo()?;
            return Err(Error::Hardware);
        }

        self.read_fifo()?;
        let mounting = self.config.mounting;
        let mut batch = SampleBatch::new();
        for record in self.decode_fifo() {
            batch
                .push(rotate(record, mounting))
                .map_err(|_| Error::BatchFull)?;
        }
        Ok(batch)
    }

    fn poll_registers(&mut self) -> Result<SampleBatch, Error<I::Error>> {
        let mut batch = SampleBatch::new();
        if !self.state.accel.configured && !self.state.gyro.configured {
            return Ok(batch);
        }

        let mut raw = [0u8; 14];
        self.read_raw(addr::TEMP_DATA1, &mut raw)?;
        let temperature = temperature_from_2_bytes(i16::from_le_bytes([raw[0], raw[1]]));
        let mounting = self.config.mounting;

        for (kind, offset) in [(ChannelKind::Accel, 2), (ChannelKind::Gyro, 8)] {
            let channel = self.channel_mut(kind);
            if !channel.is_streaming() {
                continue;
            }
            if channel.discard > 0 {
                channel.discard -= 1;
                continue;
            }
            let [x, y, z] = read_triple(&raw[offset..offset + 6]);
            let record = SampleRecord {
                channel: kind,
                x,
                y,
                z,
                temperature,
                timestamp_us: 0,
            };
            batch
                .push(rotate(record, mounting))
                .map_err(|_| Error::BatchFull)?;
        }

        batch.temperature = Some(temperature);
        Ok(batch)
    }

    /// Program FIFO bypass and watermark
    ///
    /// A changed rate or watermark restarts the FIFO: it is bypassed, flushed
    /// and re-armed so no packet mixes the old and new settings.
    fn configure_fifo(&mut self, changed: bool) -> Result<(), Error<I::Error>> {
        let watermark = self.state.fifo_watermark.max(watermark_bytes(1, self.state.layout.size()));
        let streaming = self.state.accel.configured || self.state.gyro.configured;

        self.with_clock(|driver| {
            if changed {
                driver.device.fifo_config_1().write(|w| {
                    w.set_fifo_bypass(true);
                    w.set_fifo_mode(true);
                })?;
                driver.device.signal_path_reset().write(|w| {
                    w.set_fifo_flush(true);
                })?;
                driver.delay.delay_ms(10);
                driver.write_watermark(watermark)?;
                if streaming {
                    driver.device.fifo_config_1().write(|w| {
                        w.set_fifo_bypass(false);
                        w.set_fifo_mode(true);
                    })?;
                }
            } else {
                driver.write_watermark(watermark)?;
                driver.device.fifo_config_1().write(|w| {
                    w.set_fifo_bypass(!streaming);
                    w.set_fifo_mode(true);
                })?;
            }
            Ok(())
        })?;

        #[cfg(feature = "defmt")]
        defmt::debug!("FIFO watermark {} bytes (restart: {})", watermark, changed);

        Ok(())
    }

    fn write_watermark(&mut self, watermark: u16) -> Result<(), Error<I::Error>> {
        let [low, high] = watermark.to_le_bytes();
        self.device.fifo_config_2().write(|w| {
            w.set_fifo_wm_low(low);
        })?;
        self.device.fifo_config_3().write(|w| {
            w.set_fifo_wm_high(high & 0x0F);
        })?;
        Ok(())
    }

}

/// Wake-on-motion, pedometer and free-fall
impl<I, D> Icm42670Driver<I, D>
where
    I: RegisterInterface<AddressType = u8> + SerialInterface,
    D: DelayNs,
{
    /// Enable wake-on-motion with the configured thresholds
    ///
    /// # Errors
    ///
    /// See [`enable_feature`](Self::enable_feature).
    pub fn enable_wom(&mut self) -> Result<(), Error<I::Error>> {
        self.enable_feature(FeatureKind::WakeOnMotion)
    }

    /// Enable the DMP pedometer
    ///
    /// # Errors
    ///
    /// See [`enable_feature`](Self::enable_feature).
    pub fn enable_pedometer(&mut self) -> Result<(), Error<I::Error>> {
        self.enable_feature(FeatureKind::Pedometer)
    }

    /// Enable DMP free-fall detection
    ///
    /// # Errors
    ///
    /// See [`enable_feature`](Self::enable_feature).
    pub fn enable_free_fall(&mut self) -> Result<(), Error<I::Error>> {
        self.enable_feature(FeatureKind::FreeFall)
    }

    /// Enable an always-on feature
    ///
    /// The sample rate is raised to the feature's minimum when needed and the
    /// accelerometer is powered in the mode the requesters call for. The DMP
    /// features start the DMP; its memories are reset on first use.
    ///
    /// Enabling an already active feature does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FeatureEnable`] when the DMP does not finish its
    /// start-up handshake, or another error if communication fails. In both
    /// cases the feature is rolled back to [`FeatureState::Inactive`] with its
    /// interrupts masked and the previous rate restored.
    pub fn enable_feature(&mut self, kind: FeatureKind) -> Result<(), Error<I::Error>> {
        if self.state.features.get(kind).state != FeatureState::Inactive {
            return Ok(());
        }

        self.state.features.get_mut(kind).state = FeatureState::Enabling;

        match self.start_feature(kind) {
            Ok(()) => {
                self.state.features.get_mut(kind).state = FeatureState::Active;

                #[cfg(feature = "defmt")]
                defmt::info!("{} enabled", kind);

                Ok(())
            }
            Err(error) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("{} enable failed, rolling back", kind);

                self.state.features.get_mut(kind).state = FeatureState::Disabling;
                let _ = self.stop_feature(kind);
                let _ = self.finish_feature_disable(kind);
                Err(error)
            }
        }
    }

    /// Disable an always-on feature
    ///
    /// The feature's interrupt and enable bits are cleared and the sample rate
    /// drops back to what the remaining channels and features need.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails. The feature is
    /// [`FeatureState::Inactive`] afterwards either way.
    pub fn disable_feature(&mut self, kind: FeatureKind) -> Result<(), Error<I::Error>> {
        if self.state.features.get(kind).state == FeatureState::Inactive {
            return Ok(());
        }

        self.state.features.get_mut(kind).state = FeatureState::Disabling;
        let stopped = self.stop_feature(kind);
        let restored = self.finish_feature_disable(kind);

        #[cfg(feature = "defmt")]
        defmt::info!("{} disabled", kind);

        stopped.and(restored)
    }

    fn start_feature(&mut self, kind: FeatureKind) -> Result<(), Error<I::Error>> {
        self.raise_to_feature_floor()?;
        self.apply_accel_power()?;
        match kind {
            FeatureKind::WakeOnMotion => self.start_wom(),
            FeatureKind::Pedometer | FeatureKind::FreeFall => self.start_apex_feature(kind),
        }
    }

    fn start_wom(&mut self) -> Result<(), Error<I::Error>> {
        let wom = self.config.wom;
        self.write_extended(mreg::ACCEL_WOM_X_THR, &wom.thresholds)?;
        self.device.wom_config().modify(|w| {
            w.set_wom_int_mode(false);
            w.set_wom_mode(true);
            w.set_wom_int_dur(wom.duration & 0x03);
        })?;
        self.device.wom_config().modify(|w| {
            w.set_wom_en(true);
        })?;
        self.device.int_source_1().modify(|w| {
            w.set_wom_x_int_1_en(true);
            w.set_wom_y_int_1_en(true);
            w.set_wom_z_int_1_en(true);
        })?;
        Ok(())
    }

    fn start_apex_feature(&mut self, kind: FeatureKind) -> Result<(), Error<I::Error>> {
        let power_save = kind == FeatureKind::Pedometer;
        self.device.apex_config_0().modify(|w| {
            w.set_dmp_power_save_en(power_save);
        })?;
        if power_save {
            // DMP power save wakes on WOM
            self.device.wom_config().modify(|w| {
                w.set_wom_en(true);
            })?;
        }

        self.write_dmp_odr()?;
        self.start_dmp()?;

        match kind {
            FeatureKind::Pedometer => {
                self.modify_extended(
                    mreg::INT_SOURCE6,
                    0,
                    mreg::STEP_DET_INT1_EN | mreg::STEP_CNT_OVFL_INT1_EN,
                )?;
                self.delay.delay_ms(50);
                self.device.apex_config_1().modify(|w| {
                    w.set_ped_en(true);
                })?;
            }
            FeatureKind::FreeFall => {
                self.modify_extended(mreg::INT_SOURCE6, 0, mreg::FF_INT1_EN)?;
                self.delay.delay_ms(50);
                self.device.apex_config_1().modify(|w| {
                    w.set_ff_en(true);
                })?;
            }
            FeatureKind::WakeOnMotion => {}
        }
        Ok(())
    }

    /// DMP rate of the fastest active DMP feature
    fn write_dmp_odr(&mut self) -> Result<(), Error<I::Error>> {
        let features = self.state.features;
        let code = FeatureKind::ALL
            .into_iter()
            .filter(|kind| kind.uses_dmp() && features.is_active(*kind))
            .max_by_key(|kind| kind.min_odr())
            .and_then(FeatureKind::dmp_odr_code);
        if let Some(code) = code {
            self.device.apex_config_1().modify(|w| {
                w.set_dmp_odr(code);
            })?;
        }
        Ok(())
    }

    fn start_dmp(&mut self) -> Result<(), Error<I::Error>> {
        if !self.state.dmp_started {
            self.reset_dmp()?;
            self.state.dmp_started = true;
        }

        self.device.apex_config_0().modify(|w| {
            w.set_dmp_init_en(true);
        })?;
        self.delay.delay_ms(50);
        self.poll_until(PollBudget::DMP_RESUME, |driver| {
            Ok(!driver.device.apex_config_0().read()?.dmp_init_en())
        })
        .map_err(|error| match error {
            Error::Timeout => {
                #[cfg(feature = "defmt")]
                defmt::warn!("DMP resume did not complete");
                Error::FeatureEnable
            }
            other => other,
        })
    }

    fn reset_dmp(&mut self) -> Result<(), Error<I::Error>> {
        self.with_clock(|driver| {
            driver.device.apex_config_0().modify(|w| {
                w.set_dmp_mem_reset_en(true);
            })?;
            driver.delay.delay_ms(1);
            driver.poll_until(PollBudget::DMP_MEMORY_RESET, |driver| {
                Ok(!driver.device.apex_config_0().read()?.dmp_mem_reset_en())
            })
        })
    }

    fn stop_feature(&mut self, kind: FeatureKind) -> Result<(), Error<I::Error>> {
        let features = self.state.features;
        match kind {
            FeatureKind::WakeOnMotion => {
                // the pedometer's power save mode still needs WOM running
                if !features.is_active(FeatureKind::Pedometer) {
                    self.device.wom_config().modify(|w| {
                        w.set_wom_en(false);
                    })?;
                }
                self.device.int_source_1().modify(|w| {
                    w.set_wom_x_int_1_en(false);
                    w.set_wom_y_int_1_en(false);
                    w.set_wom_z_int_1_en(false);
                })?;
            }
            FeatureKind::Pedometer => {
                self.modify_extended(
                    mreg::INT_SOURCE6,
                    mreg::STEP_DET_INT1_EN | mreg::STEP_CNT_OVFL_INT1_EN,
                    0,
                )?;
                self.device.apex_config_1().modify(|w| {
                    w.set_ped_en(false);
                })?;
                if !features.is_active(FeatureKind::WakeOnMotion) {
                    self.device.wom_config().modify(|w| {
                        w.set_wom_en(false);
                    })?;
                }
                self.write_dmp_odr()?;
            }
            FeatureKind::FreeFall => {
                self.modify_extended(mreg::INT_SOURCE6, mreg::FF_INT1_EN | mreg::LOWG_INT1_EN, 0)?;
                self.device.apex_config_1().modify(|w| {
                    w.set_ff_en(false);
                })?;
                self.write_dmp_odr()?;
            }
        }
        Ok(())
    }

    /// Mark the feature inactive and fall back to the rate and power the
    /// remaining requesters need
    fn finish_feature_disable(&mut self, kind: FeatureKind) -> Result<(), Error<I::Error>> {
        *self.state.features.get_mut(kind) = AuxFeature::default();

        let accel = self.state.accel;
        let gyro = self.state.gyro;
        let channels = [accel, gyro]
            .into_iter()
            .filter(|channel| channel.configured)
            .filter_map(|channel| channel.previous_negotiated)
            .max();
        let floor = self.state.features.rate_floor();
        let required = channels.max(floor);

        self.state.accel.negotiated = if accel.configured || floor.is_some() {
            required
        } else {
            None
        };
        self.state.gyro.negotiated = if gyro.configured { required } else { None };

        #[cfg(feature = "defmt")]
        defmt::debug!("{} released rate, now {}", kind, required);
        #[cfg(not(feature = "defmt"))]
        let _ = kind;

        if let Some(odr) = required {
            if Some(odr) != self.hardware_odr() {
                self.write_odr(odr)?;
                self.delay.delay_us(MODE_SETTLE_US);
            }
        }
        self.apply_accel_power()
    }

    /// Read and clear the wake-on-motion status
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn wom_event(&mut self) -> Result<Option<WomEvent>, Error<I::Error>> {
        let status = self.device.int_status_2().read()?;
        let event = WomEvent {
            x: status.wom_x_int(),
            y: status.wom_y_int(),
            z: status.wom_z_int(),
        };
        Ok(event.any().then_some(event))
    }

    /// Read the step counter when a step was detected
    ///
    /// `INT_STATUS3` is cleared on read, so this also clears a pending
    /// free-fall flag.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn pedometer_event(&mut self) -> Result<Option<PedometerEvent>, Error<I::Error>> {
        let status = self.device.int_status_3().read()?;
        if !status.step_det_int() {
            return Ok(None);
        }
        let mut data = [0u8; 4];
        self.read_raw(addr::APEX_DATA0, &mut data)?;
        Ok(Some(PedometerEvent::decode(data, status.step_cnt_ovf_int())))
    }

    /// Read the fall duration when a free fall was detected
    ///
    /// `INT_STATUS3` is cleared on read, so this also clears a pending step
    /// flag.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn free_fall_event(&mut self) -> Result<Option<FreeFallEvent>, Error<I::Error>> {
        let status = self.device.int_status_3().read()?;
        if !status.ff_det_int() {
            return Ok(None);
        }
        let mut data = [0u8; 2];
        self.read_raw(addr::APEX_DATA4, &mut data)?;
        let dmp_odr = self.device.apex_config_1().read()?.dmp_odr();
        Ok(Some(FreeFallEvent::decode(data, dmp_odr)))
    }

}

/// On-chip self-test
impl<I, D> Icm42670Driver<I, D>
where
    I: RegisterInterface<AddressType = u8> + SerialInterface,
    D: DelayNs,
{
    /// Run the on-chip self-test
    ///
    /// Both sensors are powered down for the test and the device is fully
    /// re-initialized afterwards, whether the test completed or not. Channel
    /// rates and features have to be configured again.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request is empty ([`Error::InvalidConfig`])
    /// - The test does not complete within 5 s ([`Error::SelfTestTimeout`])
    /// - The OTP reload is not confirmed ([`Error::Hardware`])
    /// - Communication with the device fails
    ///
    /// # Example
    ///
    /// ```ignore
    /// let result = imu.run_self_test(SelfTestRequest::BOTH)?;
    /// if !result.passed() {
    ///     // sensor outside its tolerance
    /// }
    /// ```
    pub fn run_self_test(
        &mut self,
        request: SelfTestRequest,
    ) -> Result<SelfTestResult, Error<I::Error>> {
        if request.is_empty() {
            return Err(Error::InvalidConfig);
        }

        let outcome = self.with_clock(|driver| driver.self_test_sequence(request));
        let reinit = self.init();

        #[cfg(feature = "defmt")]
        match &outcome {
            Ok(result) => defmt::info!(
                "Self-test: accel {} gyro {} incomplete {}",
                result.accel_pass,
                result.gyro_pass,
                result.incomplete
            ),
            Err(_) => defmt::warn!("Self-test aborted"),
        }

        let result = outcome?;
        reinit?;
        Ok(result)
    }

    fn self_test_sequence(
        &mut self,
        request: SelfTestRequest,
    ) -> Result<SelfTestResult, Error<I::Error>> {
        self.write_pwr_mgmt0(
            self.state.pwr_mgmt0 & !(bits::PWR_ACCEL_MODE_MASK | bits::PWR_GYRO_MODE_MASK),
        )?;
        self.state.accel.powered = false;
        self.state.gyro.powered = false;

        self.reset_dmp()?;
        self.state.dmp_started = false;

        self.modify_extended(mreg::OTP_CONFIG, mreg::OTP_COPY_MODE_MASK, mreg::OTP_COPY_DATA)?;
        self.modify_extended(mreg::OTP_CTRL7, mreg::OTP_PWR_DOWN, 0)?;
        self.delay.delay_us(100);
        self.modify_extended(mreg::OTP_CTRL7, 0, mreg::OTP_RELOAD)?;
        self.delay.delay_us(20);

        let mut otp_ctrl7 = [0u8];
        self.read_extended(mreg::OTP_CTRL7, &mut otp_ctrl7)?;
        if !self.device.mclk_rdy().read()?.otp_done() || otp_ctrl7[0] & mreg::OTP_RELOAD != 0 {
            #[cfg(feature = "defmt")]
            defmt::warn!("OTP reload for self-test not confirmed");
            return Err(Error::Hardware);
        }

        self.write_int_source0(self.state.int_source0 | bits::INT_SELF_TEST)?;

        let mut selftest = [0u8];
        self.read_extended(mreg::SELFTEST, &mut selftest)?;
        if selftest[0] & (mreg::ACCEL_ST_EN | mreg::GYRO_ST_EN) != 0 {
            return Err(Error::Hardware);
        }

        self.write_extended(mreg::ST_CONFIG, &[st_config()])?;
        self.write_extended(mreg::SELFTEST, &[request.enable_bits()])?;

        let result = match self.poll_until(PollBudget::SELF_TEST, |driver| {
            Ok(driver.device.int_status().read()?.st_int())
        }) {
            Ok(()) => self.read_self_test_result(request),
            Err(Error::Timeout) => Err(Error::SelfTestTimeout),
            Err(error) => Err(error),
        };
        let teardown = self.end_self_test();

        let result = result?;
        teardown?;
        Ok(result)
    }

    fn read_self_test_result(
        &mut self,
        request: SelfTestRequest,
    ) -> Result<SelfTestResult, Error<I::Error>> {
        let mut status1 = [0u8];
        let mut status2 = [0u8];
        self.read_extended(mreg::ST_STATUS1, &mut status1)?;
        self.read_extended(mreg::ST_STATUS2, &mut status2)?;
        Ok(SelfTestResult::from_status(request, status1[0], status2[0]))
    }

    fn end_self_test(&mut self) -> Result<(), Error<I::Error>> {
        self.modify_extended(mreg::SELFTEST, mreg::ACCEL_ST_EN | mreg::GYRO_ST_EN, 0)?;
        self.modify_extended(mreg::OTP_CTRL7, 0, mreg::OTP_PWR_DOWN)?;
        self.delay.delay_ms(20);
        Ok(())
    }

}

/// Initialization steps
impl<I, D> Icm42670Driver<I, D>
where
    I: RegisterInterface<AddressType = u8> + SerialInterface,
    D: DelayNs,
{
    fn configure_serial_interface(&mut self) -> Result<(), Error<I::Error>> {
        match self.state.interface {
            InterfaceKind::I2c => {
                self.device.intf_config_1().modify(|w| {
                    w.set_i_3_c_ddr_en(false);
                    w.set_i_3_c_sdr_en(false);
                })?;
                self.device.intf_config_0().modify(|w| {
                    w.set_ui_sifs_cfg(UI_SIFS_DISABLE_SPI);
                })?;
            }
            InterfaceKind::Spi => {
                self.device.device_config().write(|w| {
                    w.set_spi_mode(false);
                    w.set_spi_ap_4_wire(true);
                })?;
                self.device.intf_config_0().modify(|w| {
                    w.set_ui_sifs_cfg(UI_SIFS_DISABLE_I2C);
                })?;
            }
        }
        Ok(())
    }

    fn device_reset(&mut self) -> Result<(), Error<I::Error>> {
        self.device.signal_path_reset().write(|w| {
            w.set_soft_reset(true);
        })?;
        self.delay.delay_ms(1);

        // the reset also dropped the interface lock
        self.configure_serial_interface()?;

        if !self.device.int_status().read()?.reset_done_int() {
            #[cfg(feature = "defmt")]
            defmt::warn!("Soft reset not acknowledged");
            return Err(Error::Hardware);
        }

        self.reload_otp()
    }

    fn reload_otp(&mut self) -> Result<(), Error<I::Error>> {
        self.modify_extended(mreg::OTP_CONFIG, mreg::OTP_COPY_MODE_MASK, mreg::OTP_COPY_TRIM)?;
        self.modify_extended(mreg::OTP_CTRL7, mreg::OTP_PWR_DOWN, 0)?;
        self.delay.delay_us(300);
        self.modify_extended(mreg::OTP_CTRL7, 0, mreg::OTP_RELOAD)?;
        self.delay.delay_us(280);
        Ok(())
    }

    fn load_shadows(&mut self) -> Result<(), Error<I::Error>> {
        let mut shadows = [0u8; 3];
        self.read_raw(addr::PWR_MGMT_0, &mut shadows)?;
        let [pwr_mgmt0, gyro_config0, accel_config0] = shadows;
        self.state.pwr_mgmt0 = pwr_mgmt0;
        self.state.gyro_config0 = gyro_config0;
        self.state.accel_config0 = accel_config0;
        Ok(())
    }

    fn configure_fifo_interface(&mut self) -> Result<(), Error<I::Error>> {
        let layout = self.state.layout;
        let timestamps = self.state.timestamps;

        self.with_clock(|driver| {
            driver.device.intf_config_0().modify(|w| {
                w.set_fifo_count_format(false);
                w.set_fifo_count_endian(false);
                w.set_sensor_data_endian(false);
            })?;
            driver.device.fifo_config_1().write(|w| {
                w.set_fifo_bypass(true);
                w.set_fifo_mode(true);
            })?;

            if timestamps {
                driver.modify_extended(mreg::TMST_CONFIG1, mreg::TMST_FSYNC_EN, mreg::TMST_EN)?;
            }

            let mut config5 = mreg::FIFO_ACCEL_EN | mreg::FIFO_WM_GT_TH;
            if layout.has_gyro() {
                config5 |= mreg::FIFO_GYRO_EN;
            }
            if layout.is_high_resolution() {
                config5 |= mreg::FIFO_HIRES_EN;
            }
            driver.write_extended(mreg::FIFO_CONFIG5, &[config5])
        })
    }

    /// Default wake-on-motion setup: all axes AND-ed, one sample
    fn configure_wom(&mut self) -> Result<(), Error<I::Error>> {
        let thresholds = self.config.wom.thresholds;
        self.write_extended(mreg::ACCEL_WOM_X_THR, &thresholds)?;
        self.device.wom_config().modify(|w| {
            w.set_wom_int_mode(true);
            w.set_wom_mode(true);
            w.set_wom_int_dur(0);
        })?;
        Ok(())
    }

    fn configure_apex(&mut self) -> Result<(), Error<I::Error>> {
        let parameters = self.config.apex.encode();
        self.with_clock(|driver| {
            for (address, value) in parameters {
                driver.write_extended(address, &[value])?;
            }
            Ok(())
        })
    }

}

/// Register access, the MCLK gate and the MREG window
impl<I, D> Icm42670Driver<I, D>
where
    I: RegisterInterface<AddressType = u8> + SerialInterface,
    D: DelayNs,
{
    fn read_raw(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Error<I::Error>> {
        self.device.interface.read_register(address, 8, buf)?;
        Ok(())
    }

    fn write_raw(&mut self, address: u8, data: &[u8]) -> Result<(), Error<I::Error>> {
        self.device.interface.write_register(address, 8, data)?;
        Ok(())
    }

    fn write_pwr_mgmt0(&mut self, value: u8) -> Result<(), Error<I::Error>> {
        self.write_raw(addr::PWR_MGMT_0, &[value])?;
        self.state.pwr_mgmt0 = value;
        Ok(())
    }

    fn write_int_source0(&mut self, value: u8) -> Result<(), Error<I::Error>> {
        self.write_raw(addr::INT_SOURCE0, &[value])?;
        self.state.int_source0 = value;
        Ok(())
    }

    fn write_config0(&mut self) -> Result<(), Error<I::Error>> {
        let data = [self.state.gyro_config0, self.state.accel_config0];
        self.write_raw(addr::GYRO_CONFIG0, &data)
    }

    /// Program the shared rate into both `*_CONFIG0` registers
    fn write_odr(&mut self, odr: Odr) -> Result<(), Error<I::Error>> {
        self.state.gyro_config0 = (self.state.gyro_config0 & !bits::CONFIG0_ODR_MASK) | odr.code();
        self.state.accel_config0 = (self.state.accel_config0 & !bits::CONFIG0_ODR_MASK) | odr.code();
        self.write_config0()?;

        #[cfg(feature = "defmt")]
        defmt::debug!("ODR set to {}", odr);

        Ok(())
    }

    /// Retry `ready` until it reports true or the budget runs out
    fn poll_until<F>(&mut self, budget: PollBudget, mut ready: F) -> Result<(), Error<I::Error>>
    where
        F: FnMut(&mut Self) -> Result<bool, Error<I::Error>>,
    {
        for _ in 0..budget.attempts {
            if ready(self)? {
                return Ok(());
            }
            self.delay.delay_us(budget.interval_us);
        }
        Err(Error::Timeout)
    }

    fn acquire_clock(&mut self) -> Result<(), Error<I::Error>> {
        let step = self.state.clock.acquire_step();
        let result = match step {
            AcquireStep::Start => self.start_clock(),
            AcquireStep::Verify => self.verify_clock_running(),
        };
        match result {
            Ok(()) => {
                self.state.clock.acquired();
                Ok(())
            }
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("MCLK acquire failed ({}, {} holders)", step, self.state.clock.holders());
                Err(Error::Hardware)
            }
        }
    }

    fn start_clock(&mut self) -> Result<(), Error<I::Error>> {
        self.write_pwr_mgmt0(self.state.pwr_mgmt0 | bits::PWR_IDLE)?;
        self.poll_until(PollBudget::MCLK_READY, |driver| {
            Ok(driver.device.mclk_rdy().read()?.mclk_rdy())
        })
    }

    fn verify_clock_running(&mut self) -> Result<(), Error<I::Error>> {
        if self.device.pwr_mgmt_0().read()?.idle() {
            Ok(())
        } else {
            Err(Error::Hardware)
        }
    }

    fn release_clock(&mut self) -> Result<(), Error<I::Error>> {
        let result = match self.state.clock.release_step() {
            None => Err(Error::Hardware),
            Some(ReleaseStep::Stop) => self.write_pwr_mgmt0(self.state.pwr_mgmt0 & !bits::PWR_IDLE),
            Some(ReleaseStep::Verify) => self.verify_clock_running(),
        };
        self.state.clock.released();
        result.map_err(|_| {
            #[cfg(feature = "defmt")]
            defmt::warn!("MCLK release failed ({} holders left)", self.state.clock.holders());
            Error::Hardware
        })
    }

    /// Run `f` with the MCLK domain held; the clock is released even when
    /// `f` fails, and the first error is returned
    fn with_clock<T, F>(&mut self, f: F) -> Result<T, Error<I::Error>>
    where
        F: FnOnce(&mut Self) -> Result<T, Error<I::Error>>,
    {
        self.acquire_clock()?;
        let result = f(self);
        let released = self.release_clock();
        let value = result?;
        released?;
        Ok(value)
    }

    /// Read consecutive extended registers through the `M_R` window
    fn read_extended(&mut self, address: u16, buf: &mut [u8]) -> Result<(), Error<I::Error>> {
        self.with_clock(|driver| {
            let (bank, offset) = mreg::split(address);
            let block = mreg::block_select(bank);
            if block != 0 {
                driver.write_raw(addr::BLK_SEL_R, &[block])?;
            }

            let mut result = Ok(());
            for (index, byte) in (0u8..).zip(buf.iter_mut()) {
                result = driver.read_window(offset.wrapping_add(index), byte);
                if result.is_err() {
                    break;
                }
            }

            if block != 0 {
                result = result.and(driver.write_raw(addr::BLK_SEL_R, &[0]));
            }
            result
        })
    }

    /// Write consecutive extended registers through the `M_W` window
    fn write_extended(&mut self, address: u16, data: &[u8]) -> Result<(), Error<I::Error>> {
        self.with_clock(|driver| {
            let (bank, offset) = mreg::split(address);
            let block = mreg::block_select(bank);
            if block != 0 {
                driver.write_raw(addr::BLK_SEL_W, &[block])?;
            }

            let mut result = Ok(());
            for (index, byte) in (0u8..).zip(data) {
                result = driver.write_window(offset.wrapping_add(index), *byte);
                if result.is_err() {
                    break;
                }
            }

            if block != 0 {
                result = result.and(driver.write_raw(addr::BLK_SEL_W, &[0]));
            }
            result
        })
    }

    fn read_window(&mut self, offset: u8, byte: &mut u8) -> Result<(), Error<I::Error>> {
        self.write_raw(addr::MADDR_R, &[offset])?;
        // 16 MCLK cycles before M_R holds the addressed byte
        self.delay.delay_us(WINDOW_SETTLE_US);
        let mut data = [0u8];
        self.read_raw(addr::M_R, &mut data)?;
        *byte = data[0];
        Ok(())
    }

    fn write_window(&mut self, offset: u8, byte: u8) -> Result<(), Error<I::Error>> {
        self.write_raw(addr::MADDR_W, &[offset])?;
        self.write_raw(addr::M_W, &[byte])?;
        self.delay.delay_us(WINDOW_SETTLE_US);
        Ok(())
    }

    /// Read-modify-write of one extended register
    fn modify_extended(&mut self, address: u16, clear: u8, set: u8) -> Result<(), Error<I::Error>> {
        self.with_clock(|driver| {
            let mut value = [0u8];
            driver.read_extended(address, &mut value)?;
            driver.write_extended(address, &[(value[0] & !clear) | set])
        })
    }
}

/// Apply the board placement to a record
const fn rotate(record: SampleRecord, mounting: MountingMatrix) -> SampleRecord {
    let [x, y, z] = mounting.apply(record.axes());
    SampleRecord { x, y, z, ..record }
}
