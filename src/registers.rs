//! Register definitions for the ICM-42670
//!
//! The ICM-42670 exposes a single directly addressed page (0x00-0x7F) plus the
//! extended MREG/MMEM banks. Extended registers are not memory mapped; they are
//! reached one byte at a time through the `BLK_SEL`/`MADDR`/`M_R`/`M_W` window
//! registers, and only while the internal MCLK domain is running (see
//! [`crate::clock`]).
//!
//! ## Layout
//! - **Primary page**: typed access through the `device-driver` block below
//! - **Raw addresses**: multi-byte bursts and shadowed registers in [`addr`]
//! - **Extended banks**: 16-bit addresses and bit masks in [`mreg`]

device_driver::create_device!(
    device_name: Icm42670,
    dsl: {
        config {
            type RegisterAddressType = u8;
            type DefaultByteOrder = LE;
        }

        /// MCLK_RDY - Clock and OTP status (0x00)
        register MclkRdy {
            const ADDRESS = 0x00;
            const SIZE_BITS = 8;

            /// OTP copy finished
            otp_done: bool = 0,
            reserved_2_1: uint = 1..3,
            /// Internal MCLK is running
            mclk_rdy: bool = 3,
            reserved_7_4: uint = 4..8,
        },

        /// DEVICE_CONFIG - SPI mode selection (0x01)
        register DeviceConfig {
            const ADDRESS = 0x01;
            const SIZE_BITS = 8;

            /// SPI mode (false = mode 0/3, true = mode 1/2)
            spi_mode: bool = 0,
            reserved_1: uint = 1..2,
            /// 4-wire SPI addressing
            spi_ap_4wire: bool = 2,
            reserved_7_3: uint = 3..8,
        },

        /// SIGNAL_PATH_RESET - Soft reset and FIFO flush (0x02)
        register SignalPathReset {
            const ADDRESS = 0x02;
            const SIZE_BITS = 8;

            reserved_1_0: uint = 0..2,
            /// Flush the FIFO (self-clearing)
            fifo_flush: bool = 2,
            reserved_3: uint = 3..4,
            /// Soft reset of the device configuration (self-clearing)
            soft_reset: bool = 4,
            reserved_7_5: uint = 5..8,
        },

        /// INT_CONFIG - Interrupt pin electrical configuration (0x06)
        register IntConfig {
            const ADDRESS = 0x06;
            const SIZE_BITS = 8;

            /// INT1 active high
            int1_polarity: bool = 0,
            /// INT1 push-pull (false = open drain)
            int1_drive_circuit: bool = 1,
            /// INT1 latched (false = pulsed)
            int1_mode: bool = 2,
            /// INT2 active high
            int2_polarity: bool = 3,
            /// INT2 push-pull
            int2_drive_circuit: bool = 4,
            /// INT2 latched
            int2_mode: bool = 5,
            reserved_7_6: uint = 6..8,
        },

        /// PWR_MGMT_0 - Sensor power modes and clock idle (0x1F)
        register PwrMgmt0 {
            const ADDRESS = 0x1F;
            const SIZE_BITS = 8;

            /// Accelerometer mode (0 off, 2 low power, 3 low noise)
            accel_mode: uint = 0..2,
            /// Gyroscope mode (0 off, 1 standby, 3 low noise)
            gyro_mode: uint = 2..4,
            /// Keep RC oscillator running (required for MREG access)
            idle: bool = 4,
            reserved_6_5: uint = 5..7,
            /// Accelerometer low-power clock (false = WU oscillator, true = RCOSC)
            accel_lp_clk_sel: bool = 7,
        },

        /// GYRO_CONFIG0 - Gyroscope ODR and full scale (0x20)
        register GyroConfig0 {
            const ADDRESS = 0x20;
            const SIZE_BITS = 8;

            /// Output data rate code
            gyro_odr: uint = 0..4,
            reserved_4: uint = 4..5,
            /// Full-scale select
            gyro_fs_sel: uint = 5..7,
            reserved_7: uint = 7..8,
        },

        /// ACCEL_CONFIG0 - Accelerometer ODR and full scale (0x21)
        register AccelConfig0 {
            const ADDRESS = 0x21;
            const SIZE_BITS = 8;

            /// Output data rate code
            accel_odr: uint = 0..4,
            reserved_4: uint = 4..5,
            /// Full-scale select
            accel_fs_sel: uint = 5..7,
            reserved_7: uint = 7..8,
        },

        /// APEX_CONFIG0 - DMP control (0x25)
        register ApexConfig0 {
            const ADDRESS = 0x25;
            const SIZE_BITS = 8;

            /// Reset DMP SRAM (self-clearing)
            dmp_mem_reset_en: bool = 0,
            reserved_1: uint = 1..2,
            /// Start DMP initialization (self-clearing)
            dmp_init_en: bool = 2,
            /// DMP power save
            dmp_power_save_en: bool = 3,
            reserved_7_4: uint = 4..8,
        },

        /// APEX_CONFIG1 - APEX feature enables and DMP ODR (0x26)
        register ApexConfig1 {
            const ADDRESS = 0x26;
            const SIZE_BITS = 8;

            /// DMP output data rate (0 = 25 Hz, 1 = 400 Hz, 2 = 50 Hz, 3 = 100 Hz)
            dmp_odr: uint = 0..2,
            reserved_2: uint = 2..3,
            /// Pedometer
            ped_en: bool = 3,
            /// Tilt detection
            tilt_en: bool = 4,
            /// Free-fall detection
            ff_en: bool = 5,
            /// Significant motion detection
            smd_en: bool = 6,
            reserved_7: uint = 7..8,
        },

        /// WOM_CONFIG - Wake-on-motion configuration (0x27)
        register WomConfig {
            const ADDRESS = 0x27;
            const SIZE_BITS = 8;

            /// Wake-on-motion enable
            wom_en: bool = 0,
            /// Compare against previous sample (false = initial sample)
            wom_mode: bool = 1,
            /// AND all axes (false = OR)
            wom_int_mode: bool = 2,
            /// Number of over-threshold samples before the interrupt fires, minus one
            wom_int_dur: uint = 3..5,
            reserved_7_5: uint = 5..8,
        },

        /// FIFO_CONFIG1 - FIFO bypass and mode (0x28)
        register FifoConfig1 {
            const ADDRESS = 0x28;
            const SIZE_BITS = 8;

            /// Bypass (disable) the FIFO
            fifo_bypass: bool = 0,
            /// Snapshot mode (false = stream)
            fifo_mode: bool = 1,
            reserved_7_2: uint = 2..8,
        },

        /// FIFO_CONFIG2 - Watermark bits 7:0 (0x29)
        register FifoConfig2 {
            const ADDRESS = 0x29;
            const SIZE_BITS = 8;

            /// Watermark low byte
            fifo_wm_low: uint = 0..8,
        },

        /// FIFO_CONFIG3 - Watermark bits 11:8 (0x2A)
        register FifoConfig3 {
            const ADDRESS = 0x2A;
            const SIZE_BITS = 8;

            /// Watermark high nibble
            fifo_wm_high: uint = 0..4,
            reserved_7_4: uint = 4..8,
        },

        /// INT_SOURCE1 - Wake-on-motion routing to INT1 (0x2C)
        register IntSource1 {
            const ADDRESS = 0x2C;
            const SIZE_BITS = 8;

            /// WOM X interrupt to INT1
            wom_x_int1_en: bool = 0,
            /// WOM Y interrupt to INT1
            wom_y_int1_en: bool = 1,
            /// WOM Z interrupt to INT1
            wom_z_int1_en: bool = 2,
            /// SMD interrupt to INT1
            smd_int1_en: bool = 3,
            reserved_7_4: uint = 4..8,
        },

        /// INTF_CONFIG0 - Serial interface and data format (0x35)
        register IntfConfig0 {
            const ADDRESS = 0x35;
            const SIZE_BITS = 8;

            /// Interface lock (2 = disable SPI, 3 = disable I2C)
            ui_sifs_cfg: uint = 0..2,
            reserved_3_2: uint = 2..4,
            /// Sensor data big endian
            sensor_data_endian: bool = 4,
            /// FIFO count big endian
            fifo_count_endian: bool = 5,
            /// FIFO count in records (false = bytes)
            fifo_count_format: bool = 6,
            reserved_7: uint = 7..8,
        },

        /// INTF_CONFIG1 - I3C enables and clock selection (0x36)
        register IntfConfig1 {
            const ADDRESS = 0x36;
            const SIZE_BITS = 8;

            /// Clock source
            clksel: uint = 0..2,
            /// I3C DDR enable
            i3c_ddr_en: bool = 2,
            /// I3C SDR enable
            i3c_sdr_en: bool = 3,
            reserved_7_4: uint = 4..8,
        },

        /// INT_STATUS - Main interrupt status, clear on read (0x3A)
        register IntStatus {
            const ADDRESS = 0x3A;
            const SIZE_BITS = 8;
            type Access = RO;

            /// AGC ready
            agc_rdy_int: bool = 0,
            /// FIFO full
            fifo_full_int: bool = 1,
            /// FIFO watermark reached
            fifo_ths_int: bool = 2,
            reserved_3: uint = 3..4,
            /// Soft reset finished
            reset_done_int: bool = 4,
            /// PLL ready
            pll_rdy_int: bool = 5,
            /// FSYNC
            fsync_int: bool = 6,
            /// Self-test finished
            st_int: bool = 7,
        },

        /// INT_STATUS2 - Wake-on-motion status, clear on read (0x3B)
        register IntStatus2 {
            const ADDRESS = 0x3B;
            const SIZE_BITS = 8;
            type Access = RO;

            /// Motion on Z
            wom_z_int: bool = 0,
            /// Motion on Y
            wom_y_int: bool = 1,
            /// Motion on X
            wom_x_int: bool = 2,
            /// Significant motion
            smd_int: bool = 3,
            reserved_7_4: uint = 4..8,
        },

        /// INT_STATUS3 - APEX status, clear on read (0x3C)
        register IntStatus3 {
            const ADDRESS = 0x3C;
            const SIZE_BITS = 8;
            type Access = RO;

            reserved_0: uint = 0..1,
            /// Low-g detected
            lowg_det_int: bool = 1,
            /// Free fall detected
            ff_det_int: bool = 2,
            /// Tilt detected
            tilt_det_int: bool = 3,
            /// Step counter overflowed
            step_cnt_ovf_int: bool = 4,
            /// Step detected
            step_det_int: bool = 5,
            reserved_7_6: uint = 6..8,
        },

        /// WHO_AM_I - Device ID (0x75)
        register WhoAmI {
            const ADDRESS = 0x75;
            const SIZE_BITS = 8;
            type Access = RO;

            /// Device ID
            who_am_i: uint = 0..8,
        },
    }
);

/// Raw primary-page addresses used for bursts and shadowed registers
pub mod addr {
    /// `TEMP_DATA1`: start of the 14-byte temperature/accel/gyro burst
    pub const TEMP_DATA1: u8 = 0x09;
    /// `APEX_DATA4`: free-fall duration (2 bytes)
    pub const APEX_DATA4: u8 = 0x1D;
    /// `PWR_MGMT_0`
    pub const PWR_MGMT_0: u8 = 0x1F;
    /// `GYRO_CONFIG0`
    pub const GYRO_CONFIG0: u8 = 0x20;
    /// `ACCEL_CONFIG0`
    pub const ACCEL_CONFIG0: u8 = 0x21;
    /// `INT_SOURCE0`
    pub const INT_SOURCE0: u8 = 0x2B;
    /// `APEX_DATA0`: step count, cadence and activity (4 bytes)
    pub const APEX_DATA0: u8 = 0x31;
    /// `FIFO_COUNTH`: FIFO byte count (2 bytes, little endian as configured)
    pub const FIFO_COUNTH: u8 = 0x3D;
    /// `FIFO_DATA`
    pub const FIFO_DATA: u8 = 0x3F;
    /// `BLK_SEL_W`: bank select for MREG writes
    pub const BLK_SEL_W: u8 = 0x79;
    /// `MADDR_W`: MREG write address
    pub const MADDR_W: u8 = 0x7A;
    /// `M_W`: MREG write data window
    pub const M_W: u8 = 0x7B;
    /// `BLK_SEL_R`: bank select for MREG reads
    pub const BLK_SEL_R: u8 = 0x7C;
    /// `MADDR_R`: MREG read address
    pub const MADDR_R: u8 = 0x7D;
    /// `M_R`: MREG read data window
    pub const M_R: u8 = 0x7E;
}

/// Bit masks for registers the driver keeps shadow copies of
pub mod bits {
    /// `PWR_MGMT_0.accel_mode`
    pub const PWR_ACCEL_MODE_MASK: u8 = 0x03;
    /// `PWR_MGMT_0.gyro_mode`
    pub const PWR_GYRO_MODE_MASK: u8 = 0x0C;
    /// `PWR_MGMT_0.gyro_mode` shift
    pub const PWR_GYRO_MODE_SHIFT: u8 = 2;
    /// `PWR_MGMT_0.idle`
    pub const PWR_IDLE: u8 = 1 << 4;
    /// `PWR_MGMT_0.accel_lp_clk_sel` (RCOSC)
    pub const PWR_ACCEL_LP_CLK_RCOSC: u8 = 1 << 7;

    /// `*_CONFIG0` ODR field
    pub const CONFIG0_ODR_MASK: u8 = 0x0F;
    /// `*_CONFIG0` full-scale field
    pub const CONFIG0_FS_MASK: u8 = 0x60;
    /// `*_CONFIG0` full-scale shift
    pub const CONFIG0_FS_SHIFT: u8 = 5;

    /// `INT_SOURCE0.fifo_full_int1_en`
    pub const INT_FIFO_FULL: u8 = 1 << 1;
    /// `INT_SOURCE0.fifo_ths_int1_en`
    pub const INT_FIFO_THS: u8 = 1 << 2;
    /// `INT_SOURCE0.drdy_int1_en`
    pub const INT_DRDY: u8 = 1 << 3;
    /// `INT_SOURCE0.st_int1_en`
    pub const INT_SELF_TEST: u8 = 1 << 7;
}

/// Extended (MREG/MMEM) register addresses and bit masks
///
/// The high byte of each address selects the bank, the low byte is the offset
/// inside it. Bank `0x10` (MREG1) is the default block and needs no bank select.
pub mod mreg {
    /// `TMST_CONFIG1`
    pub const TMST_CONFIG1: u16 = 0x1000;
    /// `TMST_CONFIG1.tmst_en`
    pub const TMST_EN: u8 = 1 << 0;
    /// `TMST_CONFIG1.tmst_fsync_en`
    pub const TMST_FSYNC_EN: u8 = 1 << 1;
    /// `TMST_CONFIG1.tmst_res` (16 us resolution)
    pub const TMST_RES_16US: u8 = 1 << 3;

    /// `FIFO_CONFIG5`
    pub const FIFO_CONFIG5: u16 = 0x1001;
    /// `FIFO_CONFIG5.fifo_accel_en`
    pub const FIFO_ACCEL_EN: u8 = 1 << 0;
    /// `FIFO_CONFIG5.fifo_gyro_en`
    pub const FIFO_GYRO_EN: u8 = 1 << 1;
    /// `FIFO_CONFIG5.fifo_tmst_fsync_en`
    pub const FIFO_TMST_FSYNC_EN: u8 = 1 << 2;
    /// `FIFO_CONFIG5.fifo_hires_en`
    pub const FIFO_HIRES_EN: u8 = 1 << 3;
    /// `FIFO_CONFIG5.fifo_wm_gt_th`
    pub const FIFO_WM_GT_TH: u8 = 1 << 5;

    /// `FIFO_CONFIG6`
    pub const FIFO_CONFIG6: u16 = 0x1002;
    /// `FIFO_CONFIG6.rcosc_req_on_fifo_ths_dis`
    pub const RCOSC_REQ_ON_FIFO_THS_DIS: u8 = 1 << 0;

    /// `ST_CONFIG`
    pub const ST_CONFIG: u16 = 0x1013;
    /// `ST_CONFIG.gyro_st_lim` shift
    pub const ST_GYRO_LIM_SHIFT: u8 = 0;
    /// `ST_CONFIG.accel_st_lim` shift
    pub const ST_ACCEL_LIM_SHIFT: u8 = 3;
    /// `ST_CONFIG.st_num_sample` (200 samples when set, 16 otherwise)
    pub const ST_NUM_SAMPLE_200: u8 = 1 << 6;

    /// `SELFTEST`
    pub const SELFTEST: u16 = 0x1014;
    /// `SELFTEST.accel_st_en`
    pub const ACCEL_ST_EN: u8 = 1 << 6;
    /// `SELFTEST.gyro_st_en`
    pub const GYRO_ST_EN: u8 = 1 << 7;

    /// `OTP_CONFIG`
    pub const OTP_CONFIG: u16 = 0x102B;
    /// `OTP_CONFIG.otp_copy_mode` mask
    pub const OTP_COPY_MODE_MASK: u8 = 0x0C;
    /// `OTP_CONFIG.otp_copy_mode` = TRIM
    pub const OTP_COPY_TRIM: u8 = 0x01 << 2;
    /// `OTP_CONFIG.otp_copy_mode` = DATA
    pub const OTP_COPY_DATA: u8 = 0x03 << 2;

    /// `INT_SOURCE6`
    pub const INT_SOURCE6: u16 = 0x102F;
    /// `INT_SOURCE6.step_cnt_ovfl_int1_en`
    pub const STEP_CNT_OVFL_INT1_EN: u8 = 1 << 4;
    /// `INT_SOURCE6.step_det_int1_en`
    pub const STEP_DET_INT1_EN: u8 = 1 << 5;
    /// `INT_SOURCE6.lowg_int1_en`
    pub const LOWG_INT1_EN: u8 = 1 << 6;
    /// `INT_SOURCE6.ff_int1_en`
    pub const FF_INT1_EN: u8 = 1 << 7;

    /// `APEX_CONFIG2`
    pub const APEX_CONFIG2: u16 = 0x1044;
    /// `APEX_CONFIG3`
    pub const APEX_CONFIG3: u16 = 0x1045;
    /// `APEX_CONFIG4`
    pub const APEX_CONFIG4: u16 = 0x1046;
    /// `APEX_CONFIG5`
    pub const APEX_CONFIG5: u16 = 0x1047;
    /// `APEX_CONFIG9`
    pub const APEX_CONFIG9: u16 = 0x1048;
    /// `APEX_CONFIG10`
    pub const APEX_CONFIG10: u16 = 0x1049;
    /// `APEX_CONFIG11`
    pub const APEX_CONFIG11: u16 = 0x104A;
    /// `APEX_CONFIG12`
    pub const APEX_CONFIG12: u16 = 0x1067;

    /// `ACCEL_WOM_X_THR` (Y and Z follow)
    pub const ACCEL_WOM_X_THR: u16 = 0x104B;
    /// `ACCEL_WOM_Y_THR`
    pub const ACCEL_WOM_Y_THR: u16 = 0x104C;
    /// `ACCEL_WOM_Z_THR`
    pub const ACCEL_WOM_Z_THR: u16 = 0x104D;

    /// `ST_STATUS1`
    pub const ST_STATUS1: u16 = 0x1063;
    /// `ST_STATUS1.accel_st_pass`
    pub const ACCEL_ST_PASS: u8 = 1 << 5;
    /// `ST_STATUS2`
    pub const ST_STATUS2: u16 = 0x1064;
    /// `ST_STATUS2.gyro_st_pass`
    pub const GYRO_ST_PASS: u8 = 1 << 5;
    /// `ST_STATUS2.st_incomplete`
    pub const ST_INCOMPLETE: u8 = 1 << 6;

    /// `OTP_CTRL7` (MREG2)
    pub const OTP_CTRL7: u16 = 0x2806;
    /// `OTP_CTRL7.otp_pwr_down`
    pub const OTP_PWR_DOWN: u8 = 1 << 1;
    /// `OTP_CTRL7.otp_reload`
    pub const OTP_RELOAD: u8 = 1 << 3;

    /// Bank byte of the default MREG1 block
    pub const DEFAULT_BANK: u8 = 0x10;

    /// Split an extended address into its (bank, offset) pair
    #[must_use]
    pub const fn split(address: u16) -> (u8, u8) {
        ((address >> 8) as u8, (address & 0xFF) as u8)
    }

    /// Value to write to `BLK_SEL_R`/`BLK_SEL_W` for a bank byte
    ///
    /// MREG1 is selected by block 0; every other bank is selected by its own
    /// bank byte.
    #[must_use]
    pub const fn block_select(bank: u8) -> u8 {
        if bank == DEFAULT_BANK { 0 } else { bank }
    }

}
