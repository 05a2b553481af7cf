//! Remote recipe document schema.
//!
//! Field names follow the remote service's JSON. Deserialization is lenient
//! about the shapes the service is known to vary on (numbers sent as strings,
//! `null` lists, `0`/`1` booleans) and ignores fields it does not manage.

use serde::{Deserialize, Serialize};

use super::Milli;

/// Source label stamped on recipes created by this tool.
pub const DEFAULT_SOURCE: &str = "brewsync (Kleiner Brauhelfer)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FermentableUsage {
    Mash = 10,
    Extract = 20,
    Steep = 30,
    LateAddition = 40,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopForm {
    Leaf = 10,
    Pellet = 20,
    Plug = 30,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopUsage {
    Mash = 10,
    FirstWort = 15,
    Boil = 20,
    Hopstand = 30,
    DryHop = 40,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjunctUsage {
    Mash = 10,
    Sparge = 15,
    Boil = 20,
    Flameout = 25,
    Primary = 30,
    Secondary = 40,
    Bottle = 50,
}

pub const UNIT_TYPE_METRIC: i64 = 10;
pub const RECIPE_TYPE_ALL_GRAIN: i64 = 10;

/// Units the remote service accepts for yeast amounts.
pub const YEAST_UNITS: [&str; 4] = ["packets", "vials", "g", "ml"];

macro_rules! type_id {
    ($($ty:ty),*) => {
        $(impl $ty {
            pub const fn id(self) -> i64 {
                self as i64
            }
        })*
    };
}

type_id!(FermentableUsage, HopForm, HopUsage, AdjunctUsage);

/// Canonical remote recipe document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeDocument {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub notes: String,
    #[serde(default, deserialize_with = "lenient::milli")]
    pub batch_size: Milli,
    #[serde(default, deserialize_with = "lenient::milli")]
    pub boil_size: Milli,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub boil_time: i64,
    #[serde(default, deserialize_with = "lenient::milli")]
    pub og: Milli,
    #[serde(default, deserialize_with = "lenient::milli")]
    pub fg: Milli,
    #[serde(default)]
    pub abv: Option<Milli>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub calories: i64,
    #[serde(default, deserialize_with = "lenient::milli")]
    pub efficiency: Milli,
    #[serde(default, deserialize_with = "lenient::milli")]
    pub ibu: Milli,
    #[serde(default, deserialize_with = "lenient::milli")]
    pub bggu: Milli,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub srm: i64,
    #[serde(default)]
    pub losses: Option<Milli>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub bjcp_style_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub is_public: bool,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub unit_type_id: i64,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub recipe_type_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub source: String,
    #[serde(default, deserialize_with = "lenient::opt_integer")]
    pub parent_recipe_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub fermentables: Vec<Fermentable>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub hops: Vec<Hop>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub yeasts: Vec<Yeast>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub adjuncts: Vec<Adjunct>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub mash_steps: Vec<MashEntry>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub fermentation_steps: Vec<FermentationEntry>,
}

impl RecipeDocument {
    /// Serialize to the exact bytes sent to the remote service.
    pub fn to_canonical_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fermentable {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::milli")]
    pub ppg: Milli,
    #[serde(default, deserialize_with = "lenient::milli")]
    pub lovibond: Milli,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub fermentable_usage_type_id: i64,
    #[serde(default, deserialize_with = "lenient::milli")]
    pub amount: Milli,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::milli")]
    pub aa: Milli,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub hop_type_id: i64,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub hop_usage_type_id: i64,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub time: i64,
    #[serde(default, deserialize_with = "lenient::milli")]
    pub amount: Milli,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Yeast {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::milli")]
    pub amount: Milli,
    #[serde(default, deserialize_with = "lenient::string")]
    pub unit: String,
    #[serde(default)]
    pub attenuation: Option<Milli>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjunct {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub adjunct_usage_type_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub unit: String,
    #[serde(default, deserialize_with = "lenient::milli")]
    pub amount: Milli,
    #[serde(default, deserialize_with = "lenient::opt_integer")]
    pub time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MashEntry {
    #[serde(default, deserialize_with = "lenient::integer")]
    pub order: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::milli")]
    pub temperature: Milli,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FermentationEntry {
    #[serde(default, deserialize_with = "lenient::integer")]
    pub order: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::milli")]
    pub temperature: Milli,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub time: i64,
}

pub(crate) mod lenient {
    use serde::de::{DeserializeOwned, Error as _};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use crate::models::Milli;

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(opt_string(deserializer)?.unwrap_or_default())
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            Value::String(text) if text.is_empty() => Ok(None),
            Value::String(text) => Ok(Some(text)),
            Value::Number(number) => Ok(Some(number.to_string())),
            Value::Bool(flag) => Ok(Some(flag.to_string())),
            other => Err(D::Error::custom(format!("expected text, got {other}"))),
        }
    }

    pub fn milli<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Milli, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Milli::ZERO),
            Value::String(text) if text.trim().is_empty() => Ok(Milli::ZERO),
            other => serde_json::from_value(other).map_err(D::Error::custom),
        }
    }

    pub fn integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        Ok(opt_integer(deserializer)?.unwrap_or_default())
    }

    pub fn opt_integer<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<i64>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            Value::String(text) if text.trim().is_empty() => Ok(None),
            other => {
                let value: Milli = serde_json::from_value(other).map_err(D::Error::custom)?;
                Ok(Some(value.round_int()))
            }
        }
    }

    pub fn boolean<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(false),
            Value::Bool(flag) => Ok(flag),
            Value::Number(number) => Ok(number.as_f64().is_some_and(|value| value != 0.0)),
            Value::String(text) => Ok(matches!(
                text.trim().to_ascii_lowercase().as_str(),
                "1" | "true"
            )),
            other => Err(D::Error::custom(format!("expected boolean, got {other}"))),
        }
    }

    pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Vec::new()),
            other => serde_json::from_value(other).map_err(D::Error::custom),
        }
    }
}
