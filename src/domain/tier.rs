//! Hierarchical role a signing or verification node acts for.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    City,
    Provincial,
    National,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::City => "city",
            Tier::Provincial => "provincial",
            Tier::National => "national",
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "city" => Ok(Tier::City),
            "provincial" | "province" => Ok(Tier::Provincial),
            "national" => Ok(Tier::National),
            other => Err(format!("unknown tier '{}'", other)),
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
