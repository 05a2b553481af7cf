//! Remote recipe records as returned by the listing and record endpoints.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::document::lenient;
use super::{Milli, RecipeDocument};

/// One remote recipe. Listing entries carry a summary; `body` holds the
/// full payload once fetched through the record endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecipe {
    #[serde(deserialize_with = "lenient::integer")]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub is_public: bool,
    #[serde(default)]
    pub batch_size: Option<Milli>,
    #[serde(default, deserialize_with = "lenient::opt_integer")]
    pub unit_type_id: Option<i64>,
    #[serde(skip)]
    pub body: Value,
}

impl RemoteRecipe {
    /// Build from one JSON object of a listing page or a record response.
    pub fn from_json(value: Value) -> serde_json::Result<Self> {
        let mut recipe: Self = serde_json::from_value(value.clone())?;
        recipe.body = value;
        Ok(recipe)
    }

    /// Whether `body` carries the full record rather than a listing summary.
    pub fn is_full(&self) -> bool {
        self.body.get("fermentables").is_some()
    }

    /// Typed view of the full record, `None` for summaries or unreadable bodies.
    pub fn document(&self) -> Option<RecipeDocument> {
        if !self.is_full() {
            return None;
        }
        match serde_json::from_value(self.body.clone()) {
            Ok(document) => Some(document),
            Err(error) => {
                tracing::debug!("Remote recipe {} is not a readable document: {}", self.id, error);
                None
            }
        }
    }

    /// `updated_at` parsed as UTC. The service sends either RFC 3339 or
    /// `YYYY-MM-DD HH:MM:SS`.
    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.updated_at.as_deref()?.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        let prefix = raw.get(..19)?;
        NaiveDateTime::parse_from_str(prefix, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(prefix, "%Y-%m-%d %H:%M:%S"))
            .ok()
            .map(|naive| naive.and_utc())
    }
}
