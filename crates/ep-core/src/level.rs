use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Floor returned by [`DbConvention::FullScale`] for silent or non-positive input.
pub const DB_FLOOR: f32 = -100.0;

/// Offset of the host convention where unity power reads 100 dB.
pub const UNITY_OFFSET_DB: f32 = 100.0;

/// Convention used to turn a linear energy sum into decibels.
///
/// # Example
/// ```
/// use ep_core::level::DbConvention;
/// let conv = DbConvention::default();
/// assert!(matches!(conv, DbConvention::FullScale));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum DbConvention {
    /// `10·log10(x)`, unity power = 0 dB, floored at [`DB_FLOOR`].
    #[default]
    FullScale,
    /// `100 + 10·log10(x)`, unity power = 100 dB, clamped at 0.
    Offset100,
}

impl FromStr for DbConvention {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fullscale" | "full-scale" | "dbfs" => Ok(Self::FullScale),
            "offset100" | "offset-100" | "pd" => Ok(Self::Offset100),
            _ => Err(CoreError::UnknownValue {
                option: "db_convention",
                value: s.to_string(),
            }),
        }
    }
}

/// Convert a linear power (energy) value to decibels.
///
/// Non-positive input maps to the convention's floor instead of `-inf`/NaN.
///
/// # Example
/// ```
/// use ep_core::level::{pow_to_db, DbConvention, DB_FLOOR};
/// assert!((pow_to_db(1.0, DbConvention::FullScale)).abs() < 1e-6);
/// assert!((pow_to_db(0.01, DbConvention::FullScale) + 20.0).abs() < 1e-4);
/// assert_eq!(pow_to_db(0.0, DbConvention::FullScale), DB_FLOOR);
/// assert!((pow_to_db(1.0, DbConvention::Offset100) - 100.0).abs() < 1e-6);
/// assert_eq!(pow_to_db(-3.0, DbConvention::Offset100), 0.0);
/// ```
#[must_use]
pub fn pow_to_db(power: f32, convention: DbConvention) -> f32 {
    match convention {
        DbConvention::FullScale => {
            if power <= 0.0 {
                return DB_FLOOR;
            }
            (10.0 * power.log10()).max(DB_FLOOR)
        }
        DbConvention::Offset100 => {
            if power <= 0.0 {
                return 0.0;
            }
            (UNITY_OFFSET_DB + 10.0 * power.log10()).max(0.0)
        }
    }
}

/// One pair of outlet values, emitted together when a window completes.
///
/// Port 1 carries `energy_db`, port 2 carries `peak` (linear, unconverted).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Emission {
    /// Window energy in decibels.
    pub energy_db: f32,
    /// Peak raw sample value over the interval.
    pub peak: f32,
}

impl Emission {
    /// Build an emission from the linear pair published by the accumulator.
    #[must_use]
    pub fn from_linear(energy: f32, peak: f32, convention: DbConvention) -> Self {
        Self {
            energy_db: pow_to_db(energy, convention),
            peak,
        }
    }
}
