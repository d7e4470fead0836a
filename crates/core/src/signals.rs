// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

/// Represents a digital signal level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigitalLevel {
    #[default]
    Low,
    High,
}

impl DigitalLevel {
    pub fn inverted(self) -> Self {
        match self {
            DigitalLevel::Low => DigitalLevel::High,
            DigitalLevel::High => DigitalLevel::Low,
        }
    }
}

impl From<bool> for DigitalLevel {
    fn from(b: bool) -> Self {
        if b {
            DigitalLevel::High
        } else {
            DigitalLevel::Low
        }
    }
}

impl From<DigitalLevel> for bool {
    fn from(level: DigitalLevel) -> Self {
        match level {
            DigitalLevel::High => true,
            DigitalLevel::Low => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digital_level_conversions() {
        assert_eq!(DigitalLevel::default(), DigitalLevel::Low);
        assert_eq!(DigitalLevel::from(true), DigitalLevel::High);
        assert_eq!(DigitalLevel::High.inverted(), DigitalLevel::Low);

        let b: bool = DigitalLevel::High.into();
        assert!(b);
    }
}
