//! Clock implementations.

use chrono::{DateTime, FixedOffset, Local, Utc};

use crate::error::{Result, TandemError};
use crate::traits::Clock;

/// Where [`SystemClock`] reports time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Location {
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl Location {
    fn parse(zone: &str) -> Result<Self> {
        match zone.trim() {
            "Local" | "local" | "" => Ok(Location::Local),
            "UTC" | "utc" | "Z" => Ok(Location::Utc),
            other => other
                .parse::<FixedOffset>()
                .map(Location::Fixed)
                .map_err(|e| TandemError::ConfigError(format!("unknown time zone '{}': {}", other, e))),
        }
    }
}

/// Wall clock in a configurable location.
#[derive(Clone, Debug)]
pub struct SystemClock {
    location: Location,
}

impl SystemClock {
    /// Creates a clock reporting local time.
    pub fn new() -> Self {
        Self {
            location: Location::Local,
        }
    }

    /// Creates a clock for the given zone.
    pub fn with_zone(zone: &str) -> Result<Self> {
        let mut clock = Self::new();
        clock.set_location(zone)?;
        Ok(clock)
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        match self.location {
            Location::Local => Local::now().fixed_offset(),
            Location::Utc => Utc::now().fixed_offset(),
            Location::Fixed(offset) => Utc::now().with_timezone(&offset),
        }
    }

    fn set_location(&mut self, zone: &str) -> Result<()> {
        self.location = Location::parse(zone)?;
        Ok(())
    }
}

/// Clock frozen at a single instant, for deterministic timestamps.
#[derive(Clone, Debug)]
pub struct FixedClock {
    instant: DateTime<FixedOffset>,
}

impl FixedClock {
    /// Creates a clock that always reports `instant`.
    pub fn new(instant: DateTime<FixedOffset>) -> Self {
        Self { instant }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.instant
    }

    fn set_location(&mut self, zone: &str) -> Result<()> {
        self.instant = match Location::parse(zone)? {
            Location::Local => self.instant.with_timezone(&Local).fixed_offset(),
            Location::Utc => self.instant.with_timezone(&Utc).fixed_offset(),
            Location::Fixed(offset) => self.instant.with_timezone(&offset),
        };
        Ok(())
    }
}
