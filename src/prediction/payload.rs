//! Request contract of `POST /predict_proba`.

use serde::{Deserialize, Serialize};

use crate::models::{CanonicalGraph, RelationshipType, Subject};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionPayload {
    pub patients: Vec<PatientEntry>,
    pub relationships: Vec<RelationshipEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientEntry {
    pub id: String,
    pub patient_condition: String,
    pub patient_immunization: String,
    pub patient_allergy: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEntry {
    pub id_patient: String,
    pub related_patient: String,
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
}

impl From<&Subject> for PatientEntry {
    fn from(subject: &Subject) -> Self {
        Self {
            id: subject.id.clone(),
            patient_condition: subject.conditions.wire_value(),
            patient_immunization: subject.immunizations.wire_value(),
            patient_allergy: subject.allergies.wire_value(),
        }
    }
}

impl PredictionPayload {
    /// Serialize a graph: root patient first, one relationship per relative.
    pub fn from_graph(graph: &CanonicalGraph) -> Self {
        let patients = graph.subjects().map(PatientEntry::from).collect();
        let relationships = graph
            .relationships()
            .into_iter()
            .map(|edge| RelationshipEntry {
                id_patient: edge.subject_id,
                related_patient: edge.related_subject_id,
                relationship_type: edge.relationship_type,
            })
            .collect();

        Self {
            patients,
            relationships,
        }
    }

    pub fn root_id(&self) -> Option<&str> {
        self.patients.first().map(|p| p.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::build_graph;
    use crate::collector::{AssessmentDraft, RawFamilyData};
    use serde_json::json;

    #[test]
    fn root_only_with_duplicate_conditions() {
        let mut raw = RawFamilyData::new("self-assessment");
        raw.root_conditions
            .extend(["Diabetes", "Diabetes", "Hypertension"]);
        let payload = PredictionPayload::from_graph(&build_graph(&raw));

        assert_eq!(payload.patients.len(), 1);
        assert_eq!(payload.patients[0].patient_condition, "Diabetes Hypertension");
        assert!(payload.relationships.is_empty());
    }

    #[test]
    fn empty_fields_use_none_sentinel() {
        let payload = PredictionPayload::from_graph(&build_graph(&RawFamilyData::new("p1")));
        let root = &payload.patients[0];
        assert_eq!(root.patient_condition, "None");
        assert_eq!(root.patient_immunization, "None");
        assert_eq!(root.patient_allergy, "None");
    }

    #[test]
    fn father_relationship_round_trip() {
        let mut draft = AssessmentDraft::new();
        draft.father.select("Cancer");
        draft.father.select("Hypertension");
        let raw = draft.to_raw_family_data("self-assessment");
        let payload = PredictionPayload::from_graph(&build_graph(&raw));

        assert_eq!(
            payload.relationships,
            vec![RelationshipEntry {
                id_patient: "father-self-assessment".into(),
                related_patient: "self-assessment".into(),
                relationship_type: RelationshipType::Father,
            }]
        );
        let father = payload
            .patients
            .iter()
            .find(|p| p.id == "father-self-assessment")
            .unwrap();
        assert_eq!(father.patient_condition, "Cancer Hypertension");
        assert_eq!(payload.root_id(), Some("self-assessment"));
    }

    #[test]
    fn wire_format_matches_contract() {
        let mut raw = RawFamilyData::new("p1");
        raw.root_allergies.insert("Peanut");
        raw.sibling_conditions.insert("Asthma");
        let payload = PredictionPayload::from_graph(&build_graph(&raw));

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "patients": [
                    {
                        "id": "p1",
                        "patient_condition": "None",
                        "patient_immunization": "None",
                        "patient_allergy": "Peanut"
                    },
                    {
                        "id": "sibling-p1",
                        "patient_condition": "Asthma",
                        "patient_immunization": "None",
                        "patient_allergy": "None"
                    }
                ],
                "relationships": [
                    { "id_patient": "sibling-p1", "related_patient": "p1", "type": "Sibling" }
                ]
            })
        );
    }

    #[test]
    fn every_related_subject_is_listed() {
        let mut raw = RawFamilyData::new("p1");
        raw.father_conditions.insert("Cancer");
        raw.mother_conditions.insert("Diabetes");
        raw.sibling_conditions.insert("Asthma");
        let payload = PredictionPayload::from_graph(&build_graph(&raw));

        for edge in &payload.relationships {
            assert!(payload.patients.iter().any(|p| p.id == edge.id_patient));
            assert!(payload.patients.iter().any(|p| p.id == edge.related_patient));
        }
        assert_eq!(payload.patients.len(), 4);
    }
}
