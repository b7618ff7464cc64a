//! I/O usage counter matrix.
//!
//! An [`IoUsage`] holds eight byte counters indexed by
//! direction (read/write), priority (foreground/background) and
//! charger state (on/off) at the time the bytes were accounted.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Direction of an I/O transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoDirection {
    Read = 0,
    Write = 1,
}

/// Scheduling priority class the I/O was issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Foreground = 0,
    Background = 1,
}

/// Whether the device was on external power when usage accrued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargerState {
    On = 0,
    Off = 1,
}

impl IoDirection {
    pub const ALL: [IoDirection; 2] = [IoDirection::Read, IoDirection::Write];
}

impl Priority {
    pub const ALL: [Priority; 2] = [Priority::Foreground, Priority::Background];
}

impl ChargerState {
    pub const ALL: [ChargerState; 2] = [ChargerState::On, ChargerState::Off];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChargerState::On => "on",
            ChargerState::Off => "off",
        }
    }
}

impl fmt::Display for ChargerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChargerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" | "charging" | "1" | "true" => Ok(ChargerState::On),
            "off" | "battery" | "0" | "false" => Ok(ChargerState::Off),
            other => Err(format!(
                "Invalid charger state '{}', expected 'on' or 'off'",
                other
            )),
        }
    }
}

/// Byte counters for one interval, split by direction, priority and charger state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoUsage {
    bytes: [[[u64; 2]; 2]; 2],
}

impl IoUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counter for one cell.
    pub fn get(&self, dir: IoDirection, prio: Priority, charger: ChargerState) -> u64 {
        self.bytes[dir as usize][prio as usize][charger as usize]
    }

    /// Adds `delta` bytes to one cell. Saturates instead of wrapping.
    pub fn add(&mut self, dir: IoDirection, prio: Priority, charger: ChargerState, delta: u64) {
        let cell = &mut self.bytes[dir as usize][prio as usize][charger as usize];
        *cell = cell.saturating_add(delta);
    }

    /// Merges every cell of `other` into `self`.
    pub fn merge(&mut self, other: &IoUsage) {
        for dir in IoDirection::ALL {
            for prio in Priority::ALL {
                for charger in ChargerState::ALL {
                    self.add(dir, prio, charger, other.get(dir, prio, charger));
                }
            }
        }
    }

    /// True iff all eight cells are zero.
    pub fn is_zero(&self) -> bool {
        self.bytes.iter().flatten().flatten().all(|&b| b == 0)
    }

    /// Sum of all eight cells.
    pub fn total(&self) -> u64 {
        self.bytes
            .iter()
            .flatten()
            .flatten()
            .fold(0u64, |acc, &b| acc.saturating_add(b))
    }

    /// Sum of one direction across priorities and charger states.
    pub fn total_for(&self, dir: IoDirection) -> u64 {
        self.bytes[dir as usize]
            .iter()
            .flatten()
            .fold(0u64, |acc, &b| acc.saturating_add(b))
    }
}

impl Serialize for IoUsage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use ChargerState::{Off, On};
        use IoDirection::{Read, Write};
        use Priority::{Background, Foreground};

        let mut s = serializer.serialize_struct("IoUsage", 8)?;
        s.serialize_field("fg_read_charger_on", &self.get(Read, Foreground, On))?;
        s.serialize_field("fg_read_charger_off", &self.get(Read, Foreground, Off))?;
        s.serialize_field("bg_read_charger_on", &self.get(Read, Background, On))?;
        s.serialize_field("bg_read_charger_off", &self.get(Read, Background, Off))?;
        s.serialize_field("fg_write_charger_on", &self.get(Write, Foreground, On))?;
        s.serialize_field("fg_write_charger_off", &self.get(Write, Foreground, Off))?;
        s.serialize_field("bg_write_charger_on", &self.get(Write, Background, On))?;
        s.serialize_field("bg_write_charger_off", &self.get(Write, Background, Off))?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_zero() {
        let usage = IoUsage::default();
        assert!(usage.is_zero());
        assert_eq!(usage.total(), 0);
    }

    #[test]
    fn test_any_nonzero_cell_breaks_is_zero() {
        for dir in IoDirection::ALL {
            for prio in Priority::ALL {
                for charger in ChargerState::ALL {
                    let mut usage = IoUsage::default();
                    usage.add(dir, prio, charger, 1);
                    assert!(
                        !usage.is_zero(),
                        "cell {:?}/{:?}/{:?} should make usage non-zero",
                        dir,
                        prio,
                        charger
                    );
                    assert_eq!(usage.total(), 1);
                }
            }
        }
    }

    #[test]
    fn test_cells_are_independent() {
        let mut usage = IoUsage::default();
        usage.add(IoDirection::Read, Priority::Foreground, ChargerState::On, 50);
        usage.add(IoDirection::Write, Priority::Background, ChargerState::Off, 7);

        assert_eq!(
            usage.get(IoDirection::Read, Priority::Foreground, ChargerState::On),
            50
        );
        assert_eq!(
            usage.get(IoDirection::Read, Priority::Foreground, ChargerState::Off),
            0
        );
        assert_eq!(usage.total_for(IoDirection::Read), 50);
        assert_eq!(usage.total_for(IoDirection::Write), 7);
        assert_eq!(usage.total(), 57);
    }

    #[test]
    fn test_merge_and_saturation() {
        let mut a = IoUsage::default();
        a.add(IoDirection::Read, Priority::Background, ChargerState::On, u64::MAX - 1);
        let mut b = IoUsage::default();
        b.add(IoDirection::Read, Priority::Background, ChargerState::On, 10);
        b.add(IoDirection::Write, Priority::Foreground, ChargerState::Off, 3);

        a.merge(&b);
        assert_eq!(
            a.get(IoDirection::Read, Priority::Background, ChargerState::On),
            u64::MAX
        );
        assert_eq!(
            a.get(IoDirection::Write, Priority::Foreground, ChargerState::Off),
            3
        );
    }

    #[test]
    fn test_charger_state_parse() {
        assert_eq!("on".parse::<ChargerState>(), Ok(ChargerState::On));
        assert_eq!("OFF".parse::<ChargerState>(), Ok(ChargerState::Off));
        assert_eq!("battery".parse::<ChargerState>(), Ok(ChargerState::Off));
        assert!("maybe".parse::<ChargerState>().is_err());
        assert_eq!(ChargerState::On.to_string(), "on");
    }

    #[test]
    fn test_serialize_named_cells() {
        let mut usage = IoUsage::default();
        usage.add(IoDirection::Write, Priority::Background, ChargerState::Off, 42);
        let json = serde_json::to_value(usage).expect("serialize");
        assert_eq!(json["bg_write_charger_off"], 42);
        assert_eq!(json["fg_read_charger_on"], 0);
    }
}
