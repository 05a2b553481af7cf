//! Local recipe model as read from the brewing database.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::Milli;

/// A brew ("Sud") from the local database with its nested rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRecipe {
    /// Local row id
    pub id: i64,
    pub name: String,
    /// Free-text comment, may carry `[[Name: Value]]` tags
    pub comment: String,
    /// Creation time (local wall clock)
    pub created_at: NaiveDateTime,
    /// Last modification time (local wall clock)
    pub modified_at: NaiveDateTime,
    /// Wort volume at pitching, litres
    pub batch_volume: Milli,
    /// Wort volume at the end of the boil, litres
    pub boil_volume: Milli,
    /// Wort volume before straining the hops, litres
    pub pre_strain_volume: Milli,
    /// Green beer volume at bottling, litres
    pub bottled_volume: Milli,
    pub boil_minutes: i64,
    pub original_plato: Milli,
    /// Last gravity reading of the main fermentation, if any
    pub final_plato: Option<Milli>,
    pub abv: Milli,
    pub efficiency_percent: Milli,
    pub ibu: Milli,
    pub color_ebc: Milli,
    pub malts: Vec<Malt>,
    pub hops: Vec<HopAddition>,
    pub additions: Vec<Addition>,
    pub yeast: Option<YeastPitch>,
    pub mash_steps: Vec<MashRest>,
    /// Fermentation steps derived from structured local data
    pub fermentation_steps: Vec<FermentationStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Malt {
    pub name: String,
    pub share_percent: Milli,
    pub color_ebc: Milli,
    pub amount_kg: Milli,
}

/// A kettle hop addition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopAddition {
    pub name: String,
    pub alpha: Milli,
    pub pellets: bool,
    pub amount_g: Milli,
    /// Minutes before the end of the boil; zero or negative means whirlpool
    pub minutes: i64,
    pub first_wort: bool,
}

/// When an additional ingredient goes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdditionStage {
    Fermentation,
    Boil,
    Mash,
}

impl AdditionStage {
    /// Map the database `Zeitpunkt` code.
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Fermentation),
            1 => Some(Self::Boil),
            2 => Some(Self::Mash),
            _ => None,
        }
    }
}

/// Hop inventory data looked up for hop-type additions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopVariety {
    pub alpha: Milli,
    pub pellets: bool,
}

/// An additional ingredient ("weitere Zutat").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addition {
    pub name: String,
    /// True for hops added outside the kettle (dry hopping)
    pub is_hop: bool,
    /// Extract yield in percent; positive means fermentable
    pub yield_percent: Milli,
    pub color_ebc: Milli,
    pub amount_g: Milli,
    pub stage: AdditionStage,
    /// Contact time in minutes
    pub duration_minutes: i64,
    /// Inventory data when the addition is a known hop
    pub hop: Option<HopVariety>,
}

impl Addition {
    pub fn is_fermentable(&self) -> bool {
        !self.is_hop && self.yield_percent.is_positive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YeastPitch {
    pub name: String,
    /// Number of packages pitched
    pub units: Milli,
    /// Apparent attenuation in percent from the yeast inventory
    pub attenuation_percent: Option<i64>,
    /// Dry yeast (packets) versus liquid (vials)
    pub dry: bool,
    /// Free-text package size such as `11,5 g`
    pub package: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MashRest {
    pub name: String,
    pub temperature: Milli,
    pub minutes: i64,
}

/// A fermentation step: name, duration in days and temperature in °C.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FermentationStep {
    pub name: String,
    pub days: u32,
    pub temperature: Milli,
}

impl FermentationStep {
    pub fn new(name: impl Into<String>, days: u32, temperature: Milli) -> Self {
        Self {
            name: name.into(),
            days,
            temperature,
        }
    }
}
