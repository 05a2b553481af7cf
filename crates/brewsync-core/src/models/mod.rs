//! Data models for brewsync

mod document;
mod quantity;
mod recipe;
mod remote;

pub use document::{
    Adjunct, AdjunctUsage, Fermentable, FermentableUsage, FermentationEntry, Hop, HopForm,
    HopUsage, MashEntry, RecipeDocument, Yeast, DEFAULT_SOURCE, RECIPE_TYPE_ALL_GRAIN,
    UNIT_TYPE_METRIC, YEAST_UNITS,
};
pub use quantity::{Milli, ParseMilliError};
pub use recipe::{
    Addition, AdditionStage, FermentationStep, HopAddition, HopVariety, LocalRecipe, Malt,
    MashRest, YeastPitch,
};
pub use remote::RemoteRecipe;
