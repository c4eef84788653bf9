//! Human-readable byte quantities, ported from `Size.cpp`/`Size.hpp`.
//!
//! `Size` remembers which unit system (`IEC` or `SI`) it was parsed
//! under so that pretty-printing can round-trip through the same
//! grammar the value came from (spec property P7).

use std::fmt;
use std::str::FromStr;

/// Which family of multipliers a `Size` was expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSystem {
    /// Binary prefixes: Ki/Mi/Gi/... (factor 1024), suffix `B`/`bit`.
    Iec,
    /// Decimal prefixes: k/M/G/... (factor 1000), suffix `B`/`b`/`bit`.
    Si,
}

/// A byte quantity, plus the unit system it was parsed in.
#[derive(Debug, Clone, Copy)]
pub struct Size {
    bytes: u64,
    unit_system: UnitSystem,
}

impl Size {
    pub const fn from_bytes(bytes: u64, unit_system: UnitSystem) -> Self {
        Size { bytes, unit_system }
    }

    pub fn get(self) -> u64 {
        self.bytes
    }

    pub fn unit_system(self) -> UnitSystem {
        self.unit_system
    }
}

impl Default for Size {
    fn default() -> Self {
        Size::from_bytes(0, UnitSystem::Si)
    }
}

impl PartialEq for Size {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl PartialEq<u64> for Size {
    fn eq(&self, other: &u64) -> bool {
        self.bytes == *other
    }
}

impl Eq for Size {}

impl PartialOrd for Size {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.bytes.partial_cmp(&other.bytes)
    }
}

impl Ord for Size {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.bytes.cmp(&other.bytes)
    }
}

impl From<Size> for u64 {
    fn from(s: Size) -> u64 {
        s.bytes
    }
}

const IEC_PREFIXES: [(&str, u64); 7] = [
    ("Ei", 1024u64.pow(6)),
    ("Pi", 1024u64.pow(5)),
    ("Ti", 1024u64.pow(4)),
    ("Gi", 1024u64.pow(3)),
    ("Mi", 1024u64.pow(2)),
    ("Ki", 1024),
    ("", 1),
];

const SI_PREFIXES: [(&str, u64); 7] = [
    ("E", 1000u64.pow(6)),
    ("P", 1000u64.pow(5)),
    ("T", 1000u64.pow(4)),
    ("G", 1000u64.pow(3)),
    ("M", 1000u64.pow(2)),
    ("k", 1000),
    ("", 1),
];

fn parse_digits(s: &str) -> Option<(u64, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit())?;
    if end == 0 {
        return None;
    }
    let value: u64 = s[..end].parse().ok()?;
    Some((value, s[end..].trim_start()))
}

impl FromStr for Size {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (value, rest) = parse_digits(s)
            .ok_or_else(|| format!("size '{}' doesn't start with a digit run", s))?;

        // Try IEC: optional [KMGTPE]i prefix, then B or bit.
        for (prefix, factor) in IEC_PREFIXES.iter() {
            if let Some(unit) = rest.strip_prefix(prefix) {
                let scaled = value.checked_mul(*factor).ok_or("size overflow")?;
                if unit == "B" {
                    return Ok(Size::from_bytes(scaled, UnitSystem::Iec));
                }
                if unit == "bit" {
                    return Ok(Size::from_bytes(scaled / 8, UnitSystem::Iec));
                }
            }
        }

        // Try SI: optional [kMGTPE] prefix (note lowercase k too), then B, b or bit.
        for (prefix, factor) in SI_PREFIXES.iter() {
            if prefix.is_empty() {
                continue;
            }
            if let Some(unit) = rest.strip_prefix(prefix) {
                let scaled = value.checked_mul(*factor).ok_or("size overflow")?;
                if unit == "B" {
                    return Ok(Size::from_bytes(scaled, UnitSystem::Si));
                }
                if unit == "b" || unit == "bit" {
                    return Ok(Size::from_bytes(scaled / 8, UnitSystem::Si));
                }
            }
        }

        // No prefix: bare B / b / bit is SI by convention.
        match rest {
            "B" => Ok(Size::from_bytes(value, UnitSystem::Si)),
            "b" | "bit" => Ok(Size::from_bytes(value / 8, UnitSystem::Si)),
            _ => Err(format!(
                "size '{}' doesn't match \\d+\\s*([KMGTPE]i)?(B|bit) \
                 nor \\d+\\s*([kKMGTPE])?(B|b|bit)",
                s
            )),
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefixes: &[(&str, u64)] = match self.unit_system {
            UnitSystem::Iec => &IEC_PREFIXES,
            UnitSystem::Si => &SI_PREFIXES,
        };
        let suffix = match self.unit_system {
            UnitSystem::Iec => "B",
            UnitSystem::Si => "B",
        };
        for (prefix, factor) in prefixes.iter() {
            if *factor == 1 {
                return write!(f, "{}{}", self.bytes, suffix);
            }
            if self.bytes % factor == 0 {
                return write!(f, "{}{}{}", self.bytes / factor, prefix, suffix);
            }
        }
        write!(f, "{}{}", self.bytes, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iec() {
        assert_eq!(Size::from_str("8KiB").unwrap().get(), 8 * 1024);
        assert_eq!(Size::from_str("16MiB").unwrap().get(), 16 * 1024 * 1024);
        assert_eq!(Size::from_str("1Gibit").unwrap().get(), (1u64 << 30) / 8);
    }

    #[test]
    fn parses_si() {
        assert_eq!(Size::from_str("8kB").unwrap().get(), 8_000);
        assert_eq!(Size::from_str("16MB").unwrap().get(), 16_000_000);
        assert_eq!(Size::from_str("1Gbit").unwrap().get(), 1_000_000_000 / 8);
        assert_eq!(Size::from_str("128B").unwrap().get(), 128);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Size::from_str("nope").is_err());
        assert!(Size::from_str("12").is_err());
    }

    #[test]
    fn round_trips_within_unit_system() {
        for input in ["8KiB", "16MiB", "1GiB", "8kB", "16MB", "1GB", "128B"] {
            let parsed = Size::from_str(input).unwrap();
            let printed = parsed.to_string();
            let reparsed = Size::from_str(&printed).unwrap();
            assert_eq!(parsed.get(), reparsed.get(), "round trip for {}", input);
        }
    }
}
