//! Comparison of local and remote recipes and the resulting sync plan.

mod diff;
mod engine;
mod report;

pub use diff::{
    diff_documents, managed_fields, ChangeSet, FieldChange, FieldValue, Ingredient, Scalar, Step,
};
pub use engine::{
    group_by_name, plan_delete, plan_push, unique_matches, SyncAction, TranslatedRecipe,
};
pub use report::{
    ActionKind, DeleteEntry, DeleteReport, DiffOutcome, DiffReport, ListEntry, ListReport,
    Outcome, SyncEntry, SyncReport, TranslationFailure,
};
