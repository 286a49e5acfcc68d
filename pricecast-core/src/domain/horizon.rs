//! Prediction horizons.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of bars ahead a model predicts. Only the fixed set is trainable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Horizon {
    H1 = 1,
    H5 = 5,
    H15 = 15,
    H30 = 30,
    H60 = 60,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("unsupported horizon {0} (supported: 1, 5, 15, 30, 60)")]
pub struct UnsupportedHorizon(pub u32);

impl Horizon {
    pub const ALL: [Horizon; 5] = [
        Horizon::H1,
        Horizon::H5,
        Horizon::H15,
        Horizon::H30,
        Horizon::H60,
    ];

    pub fn steps(self) -> usize {
        self as usize
    }
}

impl TryFrom<u32> for Horizon {
    type Error = UnsupportedHorizon;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Horizon::H1),
            5 => Ok(Horizon::H5),
            15 => Ok(Horizon::H15),
            30 => Ok(Horizon::H30),
            60 => Ok(Horizon::H60),
            other => Err(UnsupportedHorizon(other)),
        }
    }
}

impl From<Horizon> for u32 {
    fn from(h: Horizon) -> u32 {
        h as u32
    }
}

impl std::str::FromStr for Horizon {
    type Err = UnsupportedHorizon;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s.trim().parse().map_err(|_| UnsupportedHorizon(0))?;
        Horizon::try_from(value)
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u32)
    }
}
