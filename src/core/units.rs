//! Byte size units and conversion to the most readable unit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary size units, each 1024 times the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SizeUnit {
    B,
    KB,
    MB,
    GB,
    TB,
    PB,
    EB,
    ZB,
    YB,
}

impl SizeUnit {
    pub const ALL: [SizeUnit; 9] = [
        SizeUnit::B,
        SizeUnit::KB,
        SizeUnit::MB,
        SizeUnit::GB,
        SizeUnit::TB,
        SizeUnit::PB,
        SizeUnit::EB,
        SizeUnit::ZB,
        SizeUnit::YB,
    ];

    /// Number of bytes in one of this unit.
    pub fn factor(self) -> f64 {
        1024_f64.powi(self as i32)
    }

    pub fn name(self) -> &'static str {
        match self {
            SizeUnit::B => "B",
            SizeUnit::KB => "KB",
            SizeUnit::MB => "MB",
            SizeUnit::GB => "GB",
            SizeUnit::TB => "TB",
            SizeUnit::PB => "PB",
            SizeUnit::EB => "EB",
            SizeUnit::ZB => "ZB",
            SizeUnit::YB => "YB",
        }
    }
}

impl fmt::Display for SizeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Converts `bytes` into the largest unit whose value is still at least 1.
///
/// Zero bytes is reported as `(0.0, SizeUnit::B)`.
pub fn lowest_unit_size(bytes: u64) -> (f64, SizeUnit) {
    let bytes = bytes as f64;
    SizeUnit::ALL
        .iter()
        .rev()
        .map(|unit| (bytes / unit.factor(), *unit))
        .find(|(value, _)| *value >= 1.0)
        .unwrap_or((bytes, SizeUnit::B))
}

/// Formats a byte count like `1.50 MB`.
pub fn format_size(bytes: u64) -> String {
    let (value, unit) = lowest_unit_size(bytes);
    if unit == SizeUnit::B {
        format!("{value} {unit}")
    } else {
        format!("{value:.2} {unit}")
    }
}
