use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::enums::RelationshipType;

/// Wire value for an empty condition/immunization/allergy field.
pub const NONE_SENTINEL: &str = "None";

/// Insertion-ordered set of labels, deduplicated by exact string equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ConditionSet {
    items: Vec<String>,
    seen: HashSet<String>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `label` unless it is empty or already present. Returns whether it was added.
    pub fn insert(&mut self, label: impl Into<String>) -> bool {
        let label = label.into();
        if label.is_empty() || self.seen.contains(&label) {
            return false;
        }
        self.seen.insert(label.clone());
        self.items.push(label);
        true
    }

    pub fn remove(&mut self, label: &str) -> bool {
        if !self.seen.remove(label) {
            return false;
        }
        self.items.retain(|item| item != label);
        true
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.seen.clear();
    }

    pub fn contains(&self, label: &str) -> bool {
        self.seen.contains(label)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    /// Labels in first-seen order.
    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    /// Union in place, keeping `self`'s order first.
    pub fn merge(&mut self, other: &ConditionSet) {
        for label in other.iter() {
            self.insert(label);
        }
    }

    /// Space-joined labels; empty string when the set is empty.
    pub fn join(&self) -> String {
        self.items.join(" ")
    }

    /// Space-joined labels, or the `"None"` sentinel when empty.
    pub fn wire_value(&self) -> String {
        if self.is_empty() {
            NONE_SENTINEL.to_string()
        } else {
            self.join()
        }
    }
}

impl<S: Into<String>> FromIterator<S> for ConditionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<S: Into<String>> Extend<S> for ConditionSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for label in iter {
            self.insert(label);
        }
    }
}

impl From<Vec<String>> for ConditionSet {
    fn from(items: Vec<String>) -> Self {
        items.into_iter().collect()
    }
}

impl From<ConditionSet> for Vec<String> {
    fn from(set: ConditionSet) -> Self {
        set.items
    }
}

/// A person whose conditions are assessed (self or relative).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub conditions: ConditionSet,
    pub immunizations: ConditionSet,
    pub allergies: ConditionSet,
}

impl Subject {
    pub fn new(id: impl Into<String>, conditions: ConditionSet) -> Self {
        Self {
            id: id.into(),
            conditions,
            immunizations: ConditionSet::new(),
            allergies: ConditionSet::new(),
        }
    }
}

/// Directed edge: `subject_id` is a relative of `related_subject_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub subject_id: String,
    pub related_subject_id: String,
    pub relationship_type: RelationshipType,
}

/// A relative subject together with its edge category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relative {
    pub relationship: RelationshipType,
    pub subject: Subject,
}

/// Root subject plus relatives, each linked to the root by exactly one edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalGraph {
    pub root: Subject,
    pub relatives: Vec<Relative>,
}

/// Deterministic id of a relative: `<lowercased-type>-<rootId>`.
pub fn relative_id(kind: RelationshipType, root_id: &str) -> String {
    format!("{}-{}", kind.id_prefix(), root_id)
}

impl CanonicalGraph {
    pub fn new(root: Subject) -> Self {
        Self {
            root,
            relatives: Vec::new(),
        }
    }

    /// Root first, then relatives in insertion order.
    pub fn subjects(&self) -> impl Iterator<Item = &Subject> {
        std::iter::once(&self.root).chain(self.relatives.iter().map(|r| &r.subject))
    }

    pub fn relationships(&self) -> Vec<Relationship> {
        self.relatives
            .iter()
            .map(|relative| Relationship {
                subject_id: relative.subject.id.clone(),
                related_subject_id: self.root.id.clone(),
                relationship_type: relative.relationship,
            })
            .collect()
    }

    pub fn relative(&self, kind: RelationshipType) -> Option<&Subject> {
        self.relatives
            .iter()
            .find(|r| r.relationship == kind)
            .map(|r| &r.subject)
    }
}
