//! Local recipe database access

mod kbh;

pub use kbh::{KbhRepository, RecipeRepository, MAIN_FERMENTATION};
