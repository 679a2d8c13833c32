use std::fmt;

use serde::{Deserialize, Serialize};

/// Save status shown to the user.
///
/// `Saved -> Unsaved` on an observed mutation, `Unsaved -> Saving` when a save
/// starts, then `Saving -> Saved` on success or `Saving -> Unsaved` on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaveStatus {
    #[default]
    Saved,
    Unsaved,
    Saving,
}

impl SaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveStatus::Saved => "SAVED",
            SaveStatus::Unsaved => "UNSAVED",
            SaveStatus::Saving => "SAVING",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "SAVED" => Some(SaveStatus::Saved),
            "UNSAVED" => Some(SaveStatus::Unsaved),
            "SAVING" => Some(SaveStatus::Saving),
            _ => None,
        }
    }
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
