//! Structural comparison of recipe documents.
//!
//! Every managed field is lifted into a [`FieldValue`] so documents compare
//! field by field instead of as opaque JSON. Lists compare in order.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{
    Adjunct, Fermentable, FermentationEntry, Hop, MashEntry, Milli, RecipeDocument, Yeast,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Fixed(Milli),
    Text(String),
}

impl From<Option<Milli>> for Scalar {
    fn from(value: Option<Milli>) -> Self {
        value.map_or(Self::Null, Self::Fixed)
    }
}

impl From<Option<String>> for Scalar {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::Text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Ingredient {
    Fermentable(Fermentable),
    Hop(Hop),
    Yeast(Yeast),
    Adjunct(Adjunct),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Step {
    Mash(MashEntry),
    Fermentation(FermentationEntry),
}

/// One document field, by category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(Scalar),
    Ingredients(Vec<Ingredient>),
    Steps(Vec<Step>),
}

impl FieldValue {
    /// The value absent on the remote side.
    pub const fn null() -> Self {
        Self::Scalar(Scalar::Null)
    }
}

fn ingredients<T: Clone>(items: &[T], wrap: fn(T) -> Ingredient) -> FieldValue {
    FieldValue::Ingredients(items.iter().cloned().map(wrap).collect())
}

fn steps<T: Clone>(items: &[T], wrap: fn(T) -> Step) -> FieldValue {
    FieldValue::Steps(items.iter().cloned().map(wrap).collect())
}

/// Every field this tool owns, in document order. `source` and
/// `parent_recipe_id` belong to the remote side once a recipe exists.
pub fn managed_fields(document: &RecipeDocument) -> Vec<(&'static str, FieldValue)> {
    use FieldValue::Scalar as S;

    vec![
        ("name", S(Scalar::Text(document.name.clone()))),
        ("description", S(Scalar::Text(document.description.clone()))),
        ("notes", S(Scalar::Text(document.notes.clone()))),
        ("batch_size", S(Scalar::Fixed(document.batch_size))),
        ("boil_size", S(Scalar::Fixed(document.boil_size))),
        ("boil_time", S(Scalar::Int(document.boil_time))),
        ("og", S(Scalar::Fixed(document.og))),
        ("fg", S(Scalar::Fixed(document.fg))),
        ("abv", S(document.abv.into())),
        ("calories", S(Scalar::Int(document.calories))),
        ("efficiency", S(Scalar::Fixed(document.efficiency))),
        ("ibu", S(Scalar::Fixed(document.ibu))),
        ("bggu", S(Scalar::Fixed(document.bggu))),
        ("srm", S(Scalar::Int(document.srm))),
        ("losses", S(document.losses.into())),
        ("bjcp_style_id", S(document.bjcp_style_id.clone().into())),
        ("is_public", S(Scalar::Bool(document.is_public))),
        ("is_active", S(Scalar::Bool(document.is_active))),
        ("image_url", S(document.image_url.clone().into())),
        ("unit_type_id", S(Scalar::Int(document.unit_type_id))),
        ("recipe_type_id", S(Scalar::Int(document.recipe_type_id))),
        ("fermentables", ingredients(&document.fermentables, Ingredient::Fermentable)),
        ("hops", ingredients(&document.hops, Ingredient::Hop)),
        ("yeasts", ingredients(&document.yeasts, Ingredient::Yeast)),
        ("adjuncts", ingredients(&document.adjuncts, Ingredient::Adjunct)),
        ("mash_steps", steps(&document.mash_steps, Step::Mash)),
        (
            "fermentation_steps",
            steps(&document.fermentation_steps, Step::Fermentation),
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub field: &'static str,
    pub local: FieldValue,
    pub remote: FieldValue,
}

/// Field-level differences between a local document and its remote match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub changes: Vec<FieldChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn fields(&self) -> Vec<&'static str> {
        self.changes.iter().map(|change| change.field).collect()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.changes.iter().any(|change| change.field == field)
    }

    /// Overlay the local side of every change onto a remote JSON body.
    /// Fields outside the change set keep their remote values.
    pub fn apply_to(&self, body: &mut Value) -> serde_json::Result<()> {
        if !body.is_object() {
            *body = Value::Object(Map::new());
        }
        if let Value::Object(object) = body {
            for change in &self.changes {
                object.insert(change.field.to_string(), serde_json::to_value(&change.local)?);
            }
        }
        Ok(())
    }
}

/// Compare `local` with `remote`; a missing remote document differs in every
/// managed field. With `force` every managed field is included.
pub fn diff_documents(
    local: &RecipeDocument,
    remote: Option<&RecipeDocument>,
    force: bool,
) -> ChangeSet {
    let remote_fields = remote.map(managed_fields);
    let changes = managed_fields(local)
        .into_iter()
        .enumerate()
        .filter_map(|(index, (field, local_value))| {
            let remote_value = remote_fields
                .as_ref()
                .map_or_else(FieldValue::null, |fields| fields[index].1.clone());
            let differs = remote_fields.is_none() || local_value != remote_value;
            (force || differs).then_some(FieldChange {
                field,
                local: local_value,
                remote: remote_value,
            })
        })
        .collect();
    ChangeSet { changes }
}
