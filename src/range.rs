//! Closed interval parsing, ported from `Range.cpp`/`Range.hpp`.
//!
//! Grammar (per spec): `X` (fixed, low == high) or `X-Y` (closed
//! interval, inclusive). `Ranges` parses a comma-separated list of
//! `Range<T>`, used for `--cpus`.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range<T> {
    low: T,
    high: T,
}

impl<T: Copy + PartialOrd> Range<T> {
    pub fn fixed(value: T) -> Self {
        Range {
            low: value,
            high: value,
        }
    }

    pub fn new(low: T, high: T) -> Self {
        Range { low, high }
    }

    pub fn low(&self) -> T {
        self.low
    }

    pub fn high(&self) -> T {
        self.high
    }

    pub fn is_fixed(&self) -> bool {
        // NaN-free scalar types only; PartialOrd suffices for the integer
        // and Size types this is instantiated with.
        !(self.low < self.high) && !(self.high < self.low)
    }
}

impl<T> FromStr for Range<T>
where
    T: FromStr + Copy + PartialOrd,
    T::Err: fmt::Display,
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            None => {
                let v = s
                    .parse::<T>()
                    .map_err(|e| format!("range '{}': {}", s, e))?;
                Ok(Range::fixed(v))
            }
            Some((low, high)) => {
                let low = low
                    .parse::<T>()
                    .map_err(|e| format!("range '{}': {}", s, e))?;
                let high = high
                    .parse::<T>()
                    .map_err(|e| format!("range '{}': {}", s, e))?;
                Ok(Range::new(low, high))
            }
        }
    }
}

impl<T: fmt::Display + Copy + PartialOrd> fmt::Display for Range<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_fixed() {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}-{}", self.low, self.high)
        }
    }
}

/// A comma-separated list of `Range<T>`, used to describe e.g. a CPU
/// core id set (`"0-3,7,9-11"`).
#[derive(Debug, Clone)]
pub struct Ranges<T> {
    pub ranges: Vec<Range<T>>,
}

impl<T> FromStr for Ranges<T>
where
    T: FromStr + Copy + PartialOrd,
    T::Err: fmt::Display,
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ranges = s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(Range::<T>::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Ranges { ranges })
    }
}

impl Ranges<u32> {
    /// Expand to the flat, deduplicated sequence of concrete values,
    /// ported from `to_cpu_core_list`/`as_sequence`.
    pub fn as_sequence(&self) -> Vec<u32> {
        let mut out = Vec::new();
        for r in &self.ranges {
            for v in r.low()..=r.high() {
                out.push(v);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::size::Size;

    #[test]
    fn parses_fixed() {
        let r: Range<u32> = "42".parse().unwrap();
        assert_eq!(r.low(), 42);
        assert_eq!(r.high(), 42);
        assert!(r.is_fixed());
    }

    #[test]
    fn parses_interval() {
        let r: Range<u32> = "1-32768".parse().unwrap();
        assert_eq!(r.low(), 1);
        assert_eq!(r.high(), 32768);
        assert!(!r.is_fixed());
    }

    #[test]
    fn round_trips() {
        for input in ["42", "1-32768"] {
            let r: Range<u32> = input.parse().unwrap();
            assert_eq!(r.to_string(), input);
        }
    }

    #[test]
    fn parses_size_range() {
        let r: Range<Size> = "1B-32KiB".parse().unwrap();
        assert_eq!(r.low().get(), 1);
        assert_eq!(r.high().get(), 32 * 1024);
    }

    #[test]
    fn expands_cpu_ranges() {
        let ranges: Ranges<u32> = "0-2,5".parse().unwrap();
        assert_eq!(ranges.as_sequence(), vec![0, 1, 2, 5]);
    }
}
