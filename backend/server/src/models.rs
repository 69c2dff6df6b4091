use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Placeholder code for votes whose country could not be determined.
pub const UNKNOWN_COUNTRY: &str = "UN";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mood {
    Good,
    Bad,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Good => "good",
            Mood::Bad => "bad",
        }
    }
}

impl FromStr for Mood {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "good" => Ok(Mood::Good),
            "bad" => Ok(Mood::Bad),
            _ => Err(ValidationError),
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-country vote counters. One record per country code.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryTally {
    pub country: String,
    pub good: u64,
    pub bad: u64,
}

impl CountryTally {
    pub fn new(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            ..Default::default()
        }
    }

    pub fn total(&self) -> u64 {
        self.good + self.bad
    }

    pub fn bump(&mut self, mood: Mood) {
        match mood {
            Mood::Good => self.good += 1,
            Mood::Bad => self.bad += 1,
        }
    }
}

#[derive(Deserialize)]
pub struct VotePayload {
    pub mood: Option<serde_json::Value>,
}
