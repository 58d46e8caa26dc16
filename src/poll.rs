//! Bounded status polling
//!
//! Every busy wait in the driver (clock ready, FIFO flush, DMP memory reset,
//! DMP resume, self-test done) goes through `Icm42670Driver::poll_until` with
//! one of the budgets below. Exhausting a budget is reported as
//! [`Error::Timeout`](crate::Error::Timeout); callers map it to a more specific
//! error where one exists.

/// Number of status checks and the delay between them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollBudget {
    /// Maximum number of checks
    pub attempts: u32,
    /// Delay after each failed check, in microseconds
    pub interval_us: u32,
}

impl PollBudget {
    /// `MCLK_RDY` after setting `idle`
    pub const MCLK_READY: Self = Self::new(1000, 1);
    /// `SIGNAL_PATH_RESET.fifo_flush` self-clear
    pub const FIFO_FLUSH: Self = Self::new(100, 10);
    /// `APEX_CONFIG0.dmp_mem_reset_en` self-clear (50 ms)
    pub const DMP_MEMORY_RESET: Self = Self::new(5000, 10);
    /// `APEX_CONFIG0.dmp_init_en` self-clear (50 ms)
    pub const DMP_RESUME: Self = Self::new(500, 100);
    /// `INT_STATUS.st_int` (5 s)
    pub const SELF_TEST: Self = Self::new(5000, 1000);

    /// Create a budget
    #[must_use]
    pub const fn new(attempts: u32, interval_us: u32) -> Self {
        Self {
            attempts,
            interval_us,
        }
    }

    /// Upper bound of the time spent waiting, in microseconds
    #[must_use]
    pub const fn total_us(&self) -> u64 {
        self.attempts as u64 * self.interval_us as u64
    }
}
