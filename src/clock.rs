//! MCLK clock domain gate
//!
//! Extended (MREG) registers and the FIFO are only reachable while the internal
//! MCLK domain runs. The domain is kept alive by setting `PWR_MGMT_0.idle`,
//! which several nested operations may need at the same time, so the driver
//! keeps a reference count of the holders.
//!
//! [`ClockGate`] is the pure bookkeeping half: it tells the driver which
//! register step to run next and records the outcome. The register accesses
//! themselves live in the driver (`acquire_clock` / `release_clock`).

/// Register step required to take the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquireStep {
    /// First holder: set `idle` and wait for `MCLK_RDY`
    Start,
    /// Nested holder: `idle` must already be set
    Verify,
}

/// Register step required to drop the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReleaseStep {
    /// Last holder: clear `idle`
    Stop,
    /// Other holders remain: `idle` must still be set
    Verify,
}

/// Reference count of MCLK holders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockGate {
    holders: u8,
}

impl ClockGate {
    /// Gate with no holders
    #[must_use]
    pub const fn new() -> Self {
        Self { holders: 0 }
    }

    /// Number of active holders
    #[must_use]
    pub const fn holders(&self) -> u8 {
        self.holders
    }

    /// Whether at least one holder keeps the clock running
    #[must_use]
    pub const fn is_held(&self) -> bool {
        self.holders > 0
    }

    /// Step to run before [`ClockGate::acquired`]
    #[must_use]
    pub const fn acquire_step(&self) -> AcquireStep {
        if self.holders == 0 {
            AcquireStep::Start
        } else {
            AcquireStep::Verify
        }
    }

    /// Record a successful acquire
    pub fn acquired(&mut self) {
        self.holders = self.holders.saturating_add(1);
    }

    /// Step to run before [`ClockGate::released`]
    ///
    /// Returns `None` when nobody holds the clock, which is an accounting error.
    #[must_use]
    pub const fn release_step(&self) -> Option<ReleaseStep> {
        match self.holders {
            0 => None,
            1 => Some(ReleaseStep::Stop),
            _ => Some(ReleaseStep::Verify),
        }
    }

    /// Record a release
    ///
    /// Called whether or not the register step succeeded, so a failed bus
    /// transfer cannot leave a holder behind forever.
    pub fn released(&mut self) {
        self.holders = self.holders.saturating_sub(1);
    }
}
