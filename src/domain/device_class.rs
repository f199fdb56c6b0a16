//! Coarse device classification of click user agents.

use std::fmt;
use std::str::FromStr;

use woothee::parser::Parser;

use crate::error::AppError;

/// Device dimension for device-keyed rollups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceClass {
    Desktop,
    Mobile,
    Tablet,
    Other,
}

impl DeviceClass {
    pub const ALL: [DeviceClass; 4] = [
        DeviceClass::Desktop,
        DeviceClass::Mobile,
        DeviceClass::Tablet,
        DeviceClass::Other,
    ];

    /// Classifies a raw `User-Agent` header.
    ///
    /// Missing, blank or unrecognised agents (including crawlers) are `Other`.
    pub fn classify(user_agent: Option<&str>) -> Self {
        let Some(ua) = user_agent.map(str::trim).filter(|ua| !ua.is_empty()) else {
            return DeviceClass::Other;
        };

        let Some(result) = Parser::new().parse(ua) else {
            return DeviceClass::Other;
        };

        match (result.category, result.os) {
            (_, "iPad") => DeviceClass::Tablet,
            ("pc", _) => DeviceClass::Desktop,
            ("smartphone" | "mobilephone", _) => DeviceClass::Mobile,
            _ => DeviceClass::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Desktop => "desktop",
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Other => "other",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceClass {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceClass::ALL
            .into_iter()
            .find(|class| class.as_str() == s)
            .ok_or_else(|| AppError::storage(format!("unknown device class '{s}'")))
    }
}
