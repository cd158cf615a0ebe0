//! User-level preferences read by the core

use serde::{Deserialize, Serialize};

/// Which data source the screens read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Demo,
    #[default]
    Live,
}

impl std::str::FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "demo" | "mock" => Ok(DataSource::Demo),
            "live" | "api" => Ok(DataSource::Live),
            _ => Err(format!("Invalid data source: {}", s)),
        }
    }
}
