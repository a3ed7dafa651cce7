//! Positive, per-event version numbers.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GatewayError;

/// Position of a snapshot in an event's history.
///
/// Always `>= 1`. Versions for one event form the gapless sequence
/// `1..=N`; the highest number is the current version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "u32", into = "u32")]
#[schema(value_type = u32)]
pub struct VersionNumber(u32);

impl VersionNumber {
    /// The first version of every event.
    pub const INITIAL: Self = Self(1);

    /// Returns the raw number.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns the version that follows this one.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the history is already at
    /// `u32::MAX` versions.
    pub fn next(self) -> Result<Self, GatewayError> {
        self.0
            .checked_add(1)
            .map(Self)
            .ok_or_else(|| GatewayError::Internal("version number overflow".to_string()))
    }
}

impl TryFrom<i64> for VersionNumber {
    type Error = GatewayError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match u32::try_from(raw) {
            Ok(n) if n > 0 => Ok(Self(n)),
            _ => Err(GatewayError::InvalidVersion(raw)),
        }
    }
}

impl TryFrom<u32> for VersionNumber {
    type Error = GatewayError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Self::try_from(i64::from(raw))
    }
}

impl From<VersionNumber> for u32 {
    fn from(v: VersionNumber) -> Self {
        v.0
    }
}

/// Narrowing for the `INTEGER` column; numbers past `i32::MAX` cannot be
/// stored.
impl TryFrom<VersionNumber> for i32 {
    type Error = GatewayError;

    fn try_from(v: VersionNumber) -> Result<Self, Self::Error> {
        i32::try_from(v.0).map_err(|_| GatewayError::InvalidVersion(i64::from(v.0)))
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
