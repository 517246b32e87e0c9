use std::sync::LazyLock;

use regex::Regex;

use crate::config::{ConfigError, YearBounds};

/// Digit runs; only runs of exactly four digits are year candidates, so
/// "12345" or an ISBN never yields a year.
static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Pulls a publication year out of free citation text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearExtractor {
    min: i32,
    max: i32,
}

impl YearExtractor {
    pub fn new(bounds: YearBounds) -> Result<Self, ConfigError> {
        if bounds.min > bounds.max {
            return Err(ConfigError::InvalidYearRange {
                min: bounds.min,
                max: bounds.max,
            });
        }
        Ok(YearExtractor {
            min: bounds.min,
            max: bounds.max,
        })
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.min..=self.max).contains(&year)
    }

    /// First four-digit number inside the valid range, or `None` (unknown year).
    pub fn extract(&self, text: &str) -> Option<i32> {
        DIGITS_RE
            .find_iter(text)
            .filter(|m| m.as_str().len() == 4)
            .filter_map(|m| m.as_str().parse::<i32>().ok())
            .find(|y| self.contains(*y))
    }
}
