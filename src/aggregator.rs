//! Normalization of collected conditions into the canonical graph.
//!
//! Projection, deduplication, relationship classification and graph
//! construction are pure functions; the collectors call them and the
//! request builder consumes their output.

use crate::collector::RawFamilyData;
use crate::models::fhir::{CodeableConcept, CodedRecord, FamilyMemberHistory};
use crate::models::{
    relative_id, CanonicalGraph, ConditionSet, RelationshipCategory, RelationshipType, Relative,
    Subject,
};

/// HL7 v3 RoleCode codes, checked before any label.
const ROLE_CODES: &[(&str, RelationshipType)] = &[
    ("FTH", RelationshipType::Father),
    ("NFTH", RelationshipType::Father),
    ("MTH", RelationshipType::Mother),
    ("NMTH", RelationshipType::Mother),
    ("SIB", RelationshipType::Sibling),
    ("NSIB", RelationshipType::Sibling),
    ("HSIB", RelationshipType::Sibling),
    ("STPSIB", RelationshipType::Sibling),
    ("TWIN", RelationshipType::Sibling),
    ("BRO", RelationshipType::Sibling),
    ("NBRO", RelationshipType::Sibling),
    ("HBRO", RelationshipType::Sibling),
    ("STPBRO", RelationshipType::Sibling),
    ("TWINBRO", RelationshipType::Sibling),
    ("SIS", RelationshipType::Sibling),
    ("NSIS", RelationshipType::Sibling),
    ("HSIS", RelationshipType::Sibling),
    ("STPSIS", RelationshipType::Sibling),
    ("TWINSIS", RelationshipType::Sibling),
];

/// Exact (lowercased) labels.
const LABELS: &[(&str, RelationshipType)] = &[
    ("father", RelationshipType::Father),
    ("natural father", RelationshipType::Father),
    ("mother", RelationshipType::Mother),
    ("natural mother", RelationshipType::Mother),
    ("sibling", RelationshipType::Sibling),
    ("natural sibling", RelationshipType::Sibling),
];

/// Display label of a coded record: first coding display, then free text.
pub fn project_display_text<R: CodedRecord>(record: &R) -> Option<String> {
    record
        .primary_concept()
        .and_then(CodeableConcept::display_text)
        .map(str::to_string)
}

/// Distinct display labels of `records`, in first-seen order.
pub fn dedupe_labels<R: CodedRecord>(records: &[R]) -> ConditionSet {
    let mut labels = ConditionSet::new();
    let mut unlabeled = 0usize;
    for record in records {
        match project_display_text(record) {
            Some(label) => {
                labels.insert(label);
            }
            None => unlabeled += 1,
        }
    }
    if unlabeled > 0 {
        tracing::debug!(unlabeled, "Skipped records without a display label");
    }
    labels
}

/// Distinct display labels joined with single spaces (`""` when none).
pub fn dedupe_join<R: CodedRecord>(records: &[R]) -> String {
    dedupe_labels(records).join()
}

fn label_category(label: &str) -> Option<RelationshipType> {
    let lower = label.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }
    if let Some((_, kind)) = LABELS.iter().find(|(l, _)| *l == lower) {
        return Some(*kind);
    }
    if lower.contains("brother") || lower.contains("sister") {
        return Some(RelationshipType::Sibling);
    }
    None
}

/// Classify a family-history relationship concept.
///
/// Priority: RoleCode of the first coding, its display label, then the
/// concept text. Anything unresolved is `Unknown`.
pub fn classify_relationship(concept: Option<&CodeableConcept>) -> RelationshipCategory {
    let Some(concept) = concept else {
        return RelationshipCategory::Unknown;
    };
    let coding = concept.first_coding();

    let by_code = coding
        .and_then(|c| c.code.as_deref())
        .map(str::trim)
        .and_then(|code| {
            ROLE_CODES
                .iter()
                .find(|(c, _)| c.eq_ignore_ascii_case(code))
                .map(|(_, kind)| *kind)
        });

    by_code
        .or_else(|| coding.and_then(|c| c.display.as_deref()).and_then(label_category))
        .or_else(|| concept.text.as_deref().and_then(label_category))
        .map(RelationshipCategory::Known)
        .unwrap_or(RelationshipCategory::Unknown)
}

/// Family-history conditions grouped per prediction category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FamilyBuckets {
    pub father: ConditionSet,
    pub mother: ConditionSet,
    pub sibling: ConditionSet,
}

impl FamilyBuckets {
    pub fn get(&self, kind: RelationshipType) -> &ConditionSet {
        match kind {
            RelationshipType::Father => &self.father,
            RelationshipType::Mother => &self.mother,
            RelationshipType::Sibling => &self.sibling,
        }
    }

    fn get_mut(&mut self, kind: RelationshipType) -> &mut ConditionSet {
        match kind {
            RelationshipType::Father => &mut self.father,
            RelationshipType::Mother => &mut self.mother,
            RelationshipType::Sibling => &mut self.sibling,
        }
    }
}

/// Group FamilyMemberHistory conditions by Father/Mother/Sibling.
/// Brother and sister records share the Sibling bucket; unresolvable
/// relationships are dropped.
pub fn group_family_histories(histories: &[FamilyMemberHistory]) -> FamilyBuckets {
    let mut buckets = FamilyBuckets::default();
    for history in histories {
        let Some(kind) = classify_relationship(history.relationship.as_ref()).known() else {
            tracing::debug!(
                history_id = history.id.as_deref().unwrap_or("-"),
                relationship = history
                    .relationship
                    .as_ref()
                    .and_then(CodeableConcept::display_text)
                    .unwrap_or("Unknown"),
                "Excluding family history with unresolved relationship"
            );
            continue;
        };
        buckets.get_mut(kind).merge(&dedupe_labels(&history.condition));
    }
    buckets
}

/// Build the canonical graph. The root is always present; a relative only
/// when its condition set is non-empty, in Father, Mother, Sibling order.
pub fn build_graph(raw: &RawFamilyData) -> CanonicalGraph {
    let root = Subject {
        id: raw.root_id.clone(),
        conditions: raw.root_conditions.clone(),
        immunizations: raw.root_immunizations.clone(),
        allergies: raw.root_allergies.clone(),
    };
    let mut graph = CanonicalGraph::new(root);

    for kind in RelationshipType::ALL {
        let conditions = raw.relative_conditions(kind);
        if conditions.is_empty() {
            continue;
        }
        graph.relatives.push(Relative {
            relationship: kind,
            subject: Subject::new(relative_id(kind, &raw.root_id), conditions.clone()),
        });
    }

    tracing::debug!(
        root_id = %raw.root_id,
        relatives = graph.relatives.len(),
        "Built canonical graph"
    );
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fhir::{Coding, Condition, FamilyMemberCondition};
    use serde_json::json;

    fn concept(code: Option<&str>, display: Option<&str>) -> CodeableConcept {
        CodeableConcept {
            coding: vec![Coding {
                system: None,
                code: code.map(str::to_string),
                display: display.map(str::to_string),
            }],
            text: None,
        }
    }

    fn history(relationship: &str, conditions: &[&str]) -> FamilyMemberHistory {
        FamilyMemberHistory {
            relationship: Some(concept(None, Some(relationship))),
            condition: conditions
                .iter()
                .map(|c| FamilyMemberCondition {
                    code: Some(concept(None, Some(c))),
                    outcome: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    fn condition(display: &str) -> Condition {
        serde_json::from_value(json!({ "code": { "coding": [{ "display": display }] } })).unwrap()
    }

    #[test]
    fn dedupe_join_first_seen_order() {
        let records = vec![
            condition("Diabetes"),
            condition("Hypertension"),
            condition("Diabetes"),
            Condition::default(),
            condition("Asthma"),
        ];
        assert_eq!(dedupe_join(&records), "Diabetes Hypertension Asthma");
    }

    #[test]
    fn dedupe_join_empty_is_empty_string() {
        let records: Vec<Condition> = vec![];
        assert_eq!(dedupe_join(&records), "");
    }

    #[test]
    fn classify_by_role_code_before_display() {
        let c = concept(Some("mth"), Some("Father"));
        assert_eq!(
            classify_relationship(Some(&c)),
            RelationshipCategory::Known(RelationshipType::Mother)
        );
    }

    #[test]
    fn classify_sibling_labels_any_case() {
        for label in ["Brother", "sister", "Half-Brother", "SISTER", "Natural sibling"] {
            let c = concept(None, Some(label));
            assert_eq!(
                classify_relationship(Some(&c)),
                RelationshipCategory::Known(RelationshipType::Sibling),
                "{label}"
            );
        }
    }

    #[test]
    fn classify_falls_back_to_text() {
        let c = CodeableConcept {
            coding: vec![],
            text: Some("father".into()),
        };
        assert_eq!(
            classify_relationship(Some(&c)),
            RelationshipCategory::Known(RelationshipType::Father)
        );
    }

    #[test]
    fn classify_unresolved_is_unknown() {
        assert_eq!(classify_relationship(None), RelationshipCategory::Unknown);
        let grandfather = concept(Some("GRFTH"), Some("Grandfather"));
        assert_eq!(
            classify_relationship(Some(&grandfather)),
            RelationshipCategory::Unknown
        );
    }

    #[test]
    fn brothers_and_sisters_share_one_sibling_bucket() {
        let histories = vec![
            history("Brother", &["Asthma"]),
            history("Brother", &["Asthma"]),
            history("Sister", &["Diabetes"]),
        ];
        let buckets = group_family_histories(&histories);
        assert_eq!(
            buckets.sibling.as_slice(),
            &["Asthma".to_string(), "Diabetes".to_string()]
        );
        assert!(buckets.father.is_empty());
        assert!(buckets.mother.is_empty());
    }

    #[test]
    fn unknown_relationships_are_excluded() {
        let histories = vec![
            history("Grandmother", &["Cancer"]),
            history("Father", &["Hypertension"]),
        ];
        let buckets = group_family_histories(&histories);
        assert_eq!(buckets.father.join(), "Hypertension");
        assert!(!buckets.mother.contains("Cancer"));
        assert!(!buckets.sibling.contains("Cancer"));
    }

    #[test]
    fn graph_includes_only_non_empty_relatives() {
        let mut raw = RawFamilyData::new("self-assessment");
        raw.father_conditions.insert("Cancer");
        let graph = build_graph(&raw);

        assert_eq!(graph.root.id, "self-assessment");
        assert_eq!(graph.relatives.len(), 1);
        assert_eq!(graph.relatives[0].subject.id, "father-self-assessment");
        assert_eq!(graph.relatives[0].relationship, RelationshipType::Father);
    }

    #[test]
    fn graph_relatives_in_fixed_order() {
        let mut raw = RawFamilyData::new("p1");
        raw.sibling_conditions.insert("Asthma");
        raw.father_conditions.insert("Cancer");
        raw.mother_conditions.insert("Alzheimer");
        let ids: Vec<_> = build_graph(&raw)
            .relatives
            .into_iter()
            .map(|r| r.subject.id)
            .collect();
        assert_eq!(ids, vec!["father-p1", "mother-p1", "sibling-p1"]);
    }
}
