//! Sensor modules for the ICM-42670
//!
//! This module provides full-scale ranges and physical unit conversion for the
//! two sensors of the ICM-42670:
//! - Accelerometer (3-axis)
//! - Gyroscope (3-axis)
//!
//! plus the board [`MountingMatrix`] applied to every decoded sample.
//!
//! All sensor operations are performed through methods on `Icm42670Driver`.

pub mod accelerometer;
pub mod gyroscope;

// Re-export main types
pub use accelerometer::{AccelData, AccelRange};
pub use gyroscope::{GyroData, GyroRange};

/// Sensor-to-board axis remap
///
/// The eight supported placements are the four 90 degree rotations around Z,
/// with the chip facing up or facing down. Each one is a signed permutation:
/// output axis `axis[i]` receives `sign[i] * input[i]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MountingMatrix {
    /// Chip facing up, no rotation
    #[default]
    ZUp0,
    /// Chip facing up, rotated 90 degrees
    ZUp90,
    /// Chip facing up, rotated 180 degrees
    ZUp180,
    /// Chip facing up, rotated 270 degrees
    ZUp270,
    /// Chip facing down, no rotation
    ZDown0,
    /// Chip facing down, rotated 90 degrees
    ZDown90,
    /// Chip facing down, rotated 180 degrees
    ZDown180,
    /// Chip facing down, rotated 270 degrees
    ZDown270,
}

impl MountingMatrix {
    /// All placements, indexed like the vendor board configurations
    pub const ALL: [Self; 8] = [
        Self::ZUp0,
        Self::ZUp90,
        Self::ZUp180,
        Self::ZUp270,
        Self::ZDown0,
        Self::ZDown90,
        Self::ZDown180,
        Self::ZDown270,
    ];

    /// Placement for a vendor direction index (0-7)
    #[must_use]
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    const fn table(self) -> ([i32; 3], [usize; 3]) {
        match self {
            Self::ZUp0 => ([1, 1, 1], [0, 1, 2]),
            Self::ZUp90 => ([-1, 1, 1], [1, 0, 2]),
            Self::ZUp180 => ([-1, -1, 1], [0, 1, 2]),
            Self::ZUp270 => ([1, -1, 1], [1, 0, 2]),
            Self::ZDown0 => ([-1, 1, -1], [0, 1, 2]),
            Self::ZDown90 => ([1, 1, -1], [1, 0, 2]),
            Self::ZDown180 => ([1, -1, -1], [0, 1, 2]),
            Self::ZDown270 => ([-1, -1, -1], [1, 0, 2]),
        }
    }

    /// Rotate raw axis values into the board frame
    ///
    /// # Example
    /// ```
    /// use icm42670::MountingMatrix;
    /// assert_eq!(MountingMatrix::ZUp90.apply([1, 2, 3]), [2, -1, 3]);
    /// ```
    #[must_use]
    pub const fn apply(self, raw: [i32; 3]) -> [i32; 3] {
        let (sign, axis) = self.table();
        let mut out = [0; 3];
        out[axis[0]] = sign[0] * raw[0];
        out[axis[1]] = sign[1] * raw[1];
        out[axis[2]] = sign[2] * raw[2];
        out
    }
}
