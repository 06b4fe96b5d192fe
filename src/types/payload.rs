// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed payloads for the device actuators.
//!
//! Payloads travel as plain text. These types parse status reports and
//! render outbound commands for [`SendFunction::Led`] and
//! [`SendFunction::Brightness`].
//!
//! [`SendFunction::Led`]: crate::types::SendFunction::Led
//! [`SendFunction::Brightness`]: crate::types::SendFunction::Brightness

use std::fmt;
use std::str::FromStr;

use crate::error::ValueError;

/// On/off state of the LED.
///
/// # Examples
///
/// ```
/// use devlink_lib::types::LedState;
///
/// let state: LedState = "on".parse().unwrap();
/// assert_eq!(state, LedState::On);
/// assert_eq!(state.toggled().as_str(), "off");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedState {
    /// LED is off.
    Off,
    /// LED is on.
    On,
}

impl LedState {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
        }
    }

    /// Returns the opposite state.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On => Self::Off,
        }
    }
}

impl fmt::Display for LedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedState {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Self::Off),
            "on" => Ok(Self::On),
            _ => Err(ValueError::InvalidLedState(s.to_string())),
        }
    }
}

impl From<bool> for LedState {
    fn from(value: bool) -> Self {
        if value { Self::On } else { Self::Off }
    }
}

/// LED brightness as a percentage (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Brightness(u8);

impl Brightness {
    /// Minimum brightness.
    pub const MIN: Self = Self(0);

    /// Maximum brightness.
    pub const MAX: Self = Self(100);

    /// Creates a brightness value.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if value exceeds 100.
    pub fn new(value: u8) -> Result<Self, ValueError> {
        if value > 100 {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: 100,
                actual: u16::from(value),
            });
        }
        Ok(Self(value))
    }

    /// Returns the brightness percentage.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Brightness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Brightness {
    type Err = ValueError;

    /// Parses a decimal payload such as `"42"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValueError::InvalidBrightness(s.to_string()));
        }
        let value: u16 = s
            .parse()
            .map_err(|_| ValueError::InvalidBrightness(s.to_string()))?;
        let value = u8::try_from(value).map_err(|_| ValueError::OutOfRange {
            min: 0,
            max: 100,
            actual: value,
        })?;
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn led_state_round_trips_wire_values() {
        assert_eq!("on".parse::<LedState>().unwrap(), LedState::On);
        assert_eq!("off".parse::<LedState>().unwrap(), LedState::Off);
        assert_eq!(LedState::On.to_string(), "on");
    }

    #[test]
    fn led_state_rejects_unknown_payload() {
        assert_eq!(
            "ON".parse::<LedState>(),
            Err(ValueError::InvalidLedState("ON".to_string()))
        );
    }

    #[test]
    fn led_state_toggle() {
        assert_eq!(LedState::On.toggled(), LedState::Off);
        assert_eq!(LedState::from(true), LedState::On);
    }

    #[test]
    fn brightness_range() {
        assert_eq!(Brightness::new(100).unwrap(), Brightness::MAX);
        assert!(Brightness::new(101).is_err());
    }

    #[test]
    fn brightness_from_payload() {
        assert_eq!("42".parse::<Brightness>().unwrap().value(), 42);
        assert!(matches!(
            "-1".parse::<Brightness>(),
            Err(ValueError::InvalidBrightness(_))
        ));
        assert!(matches!(
            "".parse::<Brightness>(),
            Err(ValueError::InvalidBrightness(_))
        ));
        assert!(matches!(
            "250".parse::<Brightness>(),
            Err(ValueError::OutOfRange { actual: 250, .. })
        ));
        assert!(matches!(
            "70000".parse::<Brightness>(),
            Err(ValueError::InvalidBrightness(_))
        ));
    }
}
