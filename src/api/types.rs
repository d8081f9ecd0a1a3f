//! API response type definitions.

use serde::{Deserialize, Serialize};

/// The logged-in user, scraped from the application home page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub display_name: String,
    pub full_name: String,
}

/// One entry of the activity search response.
///
/// Only `activity_id` drives control flow; everything else is carried
/// through untouched.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    pub activity_id: u64,
    #[serde(default)]
    pub activity_name: Option<String>,
    #[serde(default)]
    pub start_time_local: Option<String>,
    #[serde(default)]
    pub activity_type: Option<ActivityType>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Activity type descriptor.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityType {
    #[serde(default)]
    pub type_key: Option<String>,
}

impl ActivitySummary {
    /// Short human label for logs.
    pub fn label(&self) -> String {
        match (&self.activity_name, &self.start_time_local) {
            (Some(name), Some(start)) => format!("{} '{}' ({})", self.activity_id, name, start),
            (Some(name), None) => format!("{} '{}'", self.activity_id, name),
            _ => self.activity_id.to_string(),
        }
    }

    pub fn type_key(&self) -> Option<&str> {
        self.activity_type.as_ref()?.type_key.as_deref()
    }
}
