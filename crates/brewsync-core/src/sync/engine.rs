//! Planning of push and delete passes.
//!
//! Planning is pure: it sees the translated local recipes and the remote
//! catalogue and decides what should happen. Executing the plan is the
//! service layer's job, which is what keeps dry-run free of special cases.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use super::diff::{diff_documents, ChangeSet};
use crate::models::{RecipeDocument, RemoteRecipe};
use crate::pattern::NamePattern;

/// A local recipe after translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedRecipe {
    pub local_id: i64,
    pub name: String,
    pub document: RecipeDocument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncAction {
    Create {
        local_id: i64,
        name: String,
        document: RecipeDocument,
    },
    Update {
        local_id: i64,
        remote_id: i64,
        name: String,
        changes: ChangeSet,
    },
    NoOp {
        local_id: i64,
        remote_id: i64,
        name: String,
    },
    /// More than one remote recipe carries the name; nothing is done.
    Ambiguous {
        local_id: i64,
        name: String,
        remote_ids: Vec<i64>,
    },
}

impl SyncAction {
    pub const fn local_id(&self) -> i64 {
        match self {
            Self::Create { local_id, .. }
            | Self::Update { local_id, .. }
            | Self::NoOp { local_id, .. }
            | Self::Ambiguous { local_id, .. } => *local_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Create { name, .. }
            | Self::Update { name, .. }
            | Self::NoOp { name, .. }
            | Self::Ambiguous { name, .. } => name,
        }
    }

    pub const fn remote_id(&self) -> Option<i64> {
        match self {
            Self::Update { remote_id, .. } | Self::NoOp { remote_id, .. } => Some(*remote_id),
            Self::Create { .. } | Self::Ambiguous { .. } => None,
        }
    }

    /// Whether executing the action writes to the remote service.
    pub const fn is_write(&self) -> bool {
        matches!(self, Self::Create { .. } | Self::Update { .. })
    }
}

/// Remote recipes grouped by exact name, in catalogue order.
pub fn group_by_name(remotes: &[RemoteRecipe]) -> HashMap<&str, Vec<&RemoteRecipe>> {
    let mut groups: HashMap<&str, Vec<&RemoteRecipe>> = HashMap::new();
    for remote in remotes {
        groups.entry(remote.name.as_str()).or_default().push(remote);
    }
    groups
}

/// Remote ids matched by exactly one remote recipe for some selected local
/// name. These are the records whose full documents a push needs.
pub fn unique_matches(
    locals: &[TranslatedRecipe],
    remotes: &[RemoteRecipe],
    pattern: &NamePattern,
) -> Vec<i64> {
    let groups = group_by_name(remotes);
    let ids: BTreeSet<i64> = locals
        .iter()
        .filter(|local| pattern.matches(&local.name))
        .filter_map(|local| match groups.get(local.name.as_str()).map(Vec::as_slice) {
            Some([only]) => Some(only.id),
            _ => None,
        })
        .collect();
    ids.into_iter().collect()
}

/// Decide one action per selected local recipe, in local id order.
///
/// A uniquely matched remote recipe is compared through its full document;
/// a summary-only entry compares as missing, so every field is updated.
pub fn plan_push(
    locals: &[TranslatedRecipe],
    remotes: &[RemoteRecipe],
    pattern: &NamePattern,
    force: bool,
) -> Vec<SyncAction> {
    let groups = group_by_name(remotes);
    let mut selected: Vec<&TranslatedRecipe> = locals
        .iter()
        .filter(|local| pattern.matches(&local.name))
        .collect();
    selected.sort_by_key(|local| local.local_id);

    selected
        .into_iter()
        .map(|local| {
            let matches = groups
                .get(local.name.as_str())
                .map_or(&[][..], Vec::as_slice);
            match matches {
                [] => SyncAction::Create {
                    local_id: local.local_id,
                    name: local.name.clone(),
                    document: local.document.clone(),
                },
                [remote] => {
                    let changes =
                        diff_documents(&local.document, remote.document().as_ref(), force);
                    if changes.is_empty() {
                        SyncAction::NoOp {
                            local_id: local.local_id,
                            remote_id: remote.id,
                            name: local.name.clone(),
                        }
                    } else {
                        tracing::debug!(
                            "Recipe '{}' differs in {}",
                            local.name,
                            changes.fields().join(", ")
                        );
                        SyncAction::Update {
                            local_id: local.local_id,
                            remote_id: remote.id,
                            name: local.name.clone(),
                            changes,
                        }
                    }
                }
                many => {
                    tracing::warn!(
                        "Recipe name '{}' matches {} remote recipes",
                        local.name,
                        many.len()
                    );
                    SyncAction::Ambiguous {
                        local_id: local.local_id,
                        name: local.name.clone(),
                        remote_ids: many.iter().map(|remote| remote.id).collect(),
                    }
                }
            }
        })
        .collect()
}

/// Remote recipes selected for deletion. Local presence is not consulted.
pub fn plan_delete<'a>(remotes: &'a [RemoteRecipe], pattern: &NamePattern) -> Vec<&'a RemoteRecipe> {
    remotes
        .iter()
        .filter(|remote| pattern.matches(&remote.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::models::Milli;
    use crate::test_support::sample_recipe;
    use crate::translate::translate_recipe;

    fn translated(id: i64, name: &str) -> TranslatedRecipe {
        TranslatedRecipe {
            local_id: id,
            name: name.to_string(),
            document: translate_recipe(&sample_recipe(id, name)).unwrap(),
        }
    }

    fn full_remote(id: i64, document: &RecipeDocument) -> RemoteRecipe {
        let mut body = serde_json::to_value(document).unwrap();
        body["id"] = json!(id);
        body["updated_at"] = json!("2024-03-01 10:00:00");
        RemoteRecipe::from_json(body).unwrap()
    }

    fn summary_remote(id: i64, name: &str) -> RemoteRecipe {
        RemoteRecipe::from_json(json!({"id": id, "name": name})).unwrap()
    }

    #[test]
    fn unmatched_local_is_created() {
        let locals = vec![translated(1, "X")];
        let actions = plan_push(&locals, &[], &NamePattern::any(), false);
        assert!(matches!(&actions[0], SyncAction::Create { local_id: 1, name, .. } if name == "X"));
        assert!(actions[0].is_write());
    }

    #[test]
    fn batch_size_difference_updates_only_that_field() {
        let local = translated(1, "X");
        let mut remote_document = local.document.clone();
        remote_document.batch_size = Milli::from_int(25);
        let remotes = vec![full_remote(40, &remote_document)];

        let actions = plan_push(&[local], &remotes, &NamePattern::any(), false);
        match &actions[0] {
            SyncAction::Update {
                remote_id, changes, ..
            } => {
                assert_eq!(*remote_id, 40);
                assert_eq!(changes.fields(), vec!["batch_size"]);
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn equal_documents_are_noop() {
        let local = translated(1, "X");
        let remotes = vec![full_remote(40, &local.document)];
        let actions = plan_push(&[local], &remotes, &NamePattern::any(), false);
        assert_eq!(
            actions,
            vec![SyncAction::NoOp {
                local_id: 1,
                remote_id: 40,
                name: "X".to_string()
            }]
        );
        assert!(!actions[0].is_write());
    }

    #[test]
    fn force_turns_noop_into_full_update() {
        let local = translated(1, "X");
        let remotes = vec![full_remote(40, &local.document)];
        let actions = plan_push(&[local], &remotes, &NamePattern::any(), true);
        assert!(matches!(&actions[0], SyncAction::Update { changes, .. } if changes.contains("name")));
    }

    #[test]
    fn duplicate_remote_names_are_ambiguous() {
        let locals = vec![translated(1, "X")];
        let remotes = vec![summary_remote(40, "X"), summary_remote(41, "X")];
        let actions = plan_push(&locals, &remotes, &NamePattern::any(), false);
        assert_eq!(
            actions,
            vec![SyncAction::Ambiguous {
                local_id: 1,
                name: "X".to_string(),
                remote_ids: vec![40, 41]
            }]
        );
        assert!(unique_matches(&locals, &remotes, &NamePattern::any()).is_empty());
    }

    #[test]
    fn matching_is_case_sensitive() {
        let locals = vec![translated(1, "Pale Ale")];
        let remotes = vec![summary_remote(40, "pale ale")];
        let actions = plan_push(&locals, &remotes, &NamePattern::any(), false);
        assert!(matches!(actions[0], SyncAction::Create { .. }));
    }

    #[test]
    fn pattern_selects_and_order_is_by_local_id() {
        let locals = vec![translated(3, "Stout"), translated(2, "Pale"), translated(1, "Pils")];
        let pattern = NamePattern::new("P*").unwrap();
        let actions = plan_push(&locals, &[], &pattern, false);
        let ids: Vec<i64> = actions.iter().map(SyncAction::local_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn summary_only_match_updates_everything() {
        let locals = vec![translated(1, "X")];
        let remotes = vec![summary_remote(40, "X")];
        assert_eq!(unique_matches(&locals, &remotes, &NamePattern::any()), vec![40]);

        let actions = plan_push(&locals, &remotes, &NamePattern::any(), false);
        let SyncAction::Update { remote_id, changes, .. } = &actions[0] else {
            panic!("expected an update, got {:?}", actions[0]);
        };
        assert_eq!(*remote_id, 40);
        assert_eq!(
            changes.len(),
            crate::sync::managed_fields(&locals[0].document).len()
        );
    }

    #[test]
    fn delete_ignores_local_presence() {
        let remotes = vec![
            summary_remote(40, "Old IPA"),
            summary_remote(41, "Stout"),
            summary_remote(42, "Old Ale"),
        ];
        let pattern = NamePattern::new("Old*").unwrap();
        let ids: Vec<i64> = plan_delete(&remotes, &pattern).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![40, 42]);
    }

    #[test]
    fn actions_serialize_with_kind_tag() {
        let value = serde_json::to_value(SyncAction::NoOp {
            local_id: 1,
            remote_id: 2,
            name: "X".to_string(),
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"action": "no_op", "local_id": 1, "remote_id": 2, "name": "X"})
        );
    }
}
