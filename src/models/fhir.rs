//! Typed projections of the FHIR R4 resources the pipeline reads.
//!
//! Only the fields the pipeline or its views consume are modelled. Every
//! field is optional and `null`-tolerant: records from the clinical-record
//! store are loosely shaped, and a missing field must degrade to `None`
//! rather than fail the whole load.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Treat an absent or `null` array as empty.
fn vec_or_null<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Coding {
    pub system: Option<String>,
    pub code: Option<String>,
    pub display: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodeableConcept {
    #[serde(deserialize_with = "vec_or_null")]
    pub coding: Vec<Coding>,
    pub text: Option<String>,
}

impl CodeableConcept {
    pub fn first_coding(&self) -> Option<&Coding> {
        self.coding.first()
    }

    /// First coding's display, falling back to the free-text `text`.
    pub fn display_text(&self) -> Option<&str> {
        self.first_coding()
            .and_then(|c| non_empty(c.display.as_ref()))
            .or_else(|| non_empty(self.text.as_ref()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Reference {
    pub reference: Option<String>,
    pub display: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HumanName {
    #[serde(rename = "use")]
    pub name_use: Option<String>,
    pub text: Option<String>,
    pub family: Option<String>,
    #[serde(deserialize_with = "vec_or_null")]
    pub given: Vec<String>,
    #[serde(deserialize_with = "vec_or_null")]
    pub prefix: Vec<String>,
    #[serde(deserialize_with = "vec_or_null")]
    pub suffix: Vec<String>,
}

impl HumanName {
    /// `text` when present, else prefix, given names, family and suffix joined.
    pub fn display(&self) -> Option<String> {
        if let Some(text) = non_empty(self.text.as_ref()) {
            return Some(text.to_string());
        }
        let parts: Vec<&str> = self
            .prefix
            .iter()
            .chain(self.given.iter())
            .chain(self.family.iter())
            .chain(self.suffix.iter())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactPoint {
    pub system: Option<String>,
    pub value: Option<String>,
    #[serde(rename = "use")]
    pub contact_use: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Address {
    pub text: Option<String>,
    #[serde(deserialize_with = "vec_or_null")]
    pub line: Vec<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl Address {
    /// Single-line rendering: `text`, else lines, city, state, postal code, country.
    pub fn one_line(&self) -> Option<String> {
        if let Some(text) = non_empty(self.text.as_ref()) {
            return Some(text.to_string());
        }
        let parts: Vec<&str> = self
            .line
            .iter()
            .chain(self.city.iter())
            .chain(self.state.iter())
            .chain(self.postal_code.iter())
            .chain(self.country.iter())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Patient {
    pub id: Option<String>,
    #[serde(deserialize_with = "vec_or_null")]
    pub name: Vec<HumanName>,
    pub gender: Option<String>,
    pub birth_date: Option<String>,
}

impl Patient {
    pub fn display_name(&self) -> Option<String> {
        self.name.first().and_then(HumanName::display)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Condition {
    pub id: Option<String>,
    pub code: Option<CodeableConcept>,
    pub clinical_status: Option<CodeableConcept>,
    pub subject: Option<Reference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Immunization {
    pub id: Option<String>,
    pub status: Option<String>,
    pub vaccine_code: Option<CodeableConcept>,
    pub occurrence_date_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AllergyIntolerance {
    pub id: Option<String>,
    pub code: Option<CodeableConcept>,
    pub clinical_status: Option<CodeableConcept>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FamilyMemberCondition {
    pub code: Option<CodeableConcept>,
    pub outcome: Option<CodeableConcept>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FamilyMemberHistory {
    pub id: Option<String>,
    pub status: Option<String>,
    pub patient: Option<Reference>,
    pub name: Option<String>,
    pub relationship: Option<CodeableConcept>,
    pub sex: Option<CodeableConcept>,
    #[serde(deserialize_with = "vec_or_null")]
    pub condition: Vec<FamilyMemberCondition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RelatedPerson {
    pub id: Option<String>,
    pub active: Option<bool>,
    pub patient: Option<Reference>,
    #[serde(deserialize_with = "vec_or_null")]
    pub relationship: Vec<CodeableConcept>,
    #[serde(deserialize_with = "vec_or_null")]
    pub name: Vec<HumanName>,
    #[serde(deserialize_with = "vec_or_null")]
    pub telecom: Vec<ContactPoint>,
    pub gender: Option<String>,
    pub birth_date: Option<String>,
    #[serde(deserialize_with = "vec_or_null")]
    pub address: Vec<Address>,
}

/// A FHIR resource type the pipeline reads from the record store.
pub trait FhirResource: for<'de> Deserialize<'de> + Default {
    const RESOURCE_TYPE: &'static str;
}

impl FhirResource for Patient {
    const RESOURCE_TYPE: &'static str = "Patient";
}
impl FhirResource for Condition {
    const RESOURCE_TYPE: &'static str = "Condition";
}
impl FhirResource for Immunization {
    const RESOURCE_TYPE: &'static str = "Immunization";
}
impl FhirResource for AllergyIntolerance {
    const RESOURCE_TYPE: &'static str = "AllergyIntolerance";
}
impl FhirResource for FamilyMemberHistory {
    const RESOURCE_TYPE: &'static str = "FamilyMemberHistory";
}
impl FhirResource for RelatedPerson {
    const RESOURCE_TYPE: &'static str = "RelatedPerson";
}

/// A record whose display label comes from one coded field.
pub trait CodedRecord {
    fn primary_concept(&self) -> Option<&CodeableConcept>;
}

impl CodedRecord for Condition {
    fn primary_concept(&self) -> Option<&CodeableConcept> {
        self.code.as_ref()
    }
}

impl CodedRecord for Immunization {
    fn primary_concept(&self) -> Option<&CodeableConcept> {
        self.vaccine_code.as_ref()
    }
}

impl CodedRecord for AllergyIntolerance {
    fn primary_concept(&self) -> Option<&CodeableConcept> {
        self.code.as_ref()
    }
}

impl CodedRecord for FamilyMemberCondition {
    fn primary_concept(&self) -> Option<&CodeableConcept> {
        self.code.as_ref()
    }
}

/// Decode raw records leniently. A record that does not match the typed
/// shape becomes an empty record so the rest of the load proceeds.
pub fn decode_records<T: FhirResource>(values: Vec<Value>) -> Vec<T> {
    values
        .into_iter()
        .filter(|v| !v.is_null())
        .map(|value| {
            serde_json::from_value::<T>(value).unwrap_or_else(|e| {
                tracing::warn!(
                    resource_type = T::RESOURCE_TYPE,
                    error = %e,
                    "Undecodable record, treating as empty"
                );
                T::default()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_text_prefers_first_coding() {
        let concept: CodeableConcept = serde_json::from_value(json!({
            "coding": [{ "display": "Asthma" }, { "display": "Other" }],
            "text": "asthma (free text)"
        }))
        .unwrap();
        assert_eq!(concept.display_text(), Some("Asthma"));
    }

    #[test]
    fn display_text_falls_back_to_text() {
        let concept: CodeableConcept = serde_json::from_value(json!({
            "coding": [{ "code": "195967001" }],
            "text": "Asthma"
        }))
        .unwrap();
        assert_eq!(concept.display_text(), Some("Asthma"));
    }

    #[test]
    fn display_text_missing_everywhere() {
        let concept: CodeableConcept =
            serde_json::from_value(json!({ "coding": null, "text": "  " })).unwrap();
        assert_eq!(concept.display_text(), None);
    }

    #[test]
    fn family_member_history_null_condition_is_empty() {
        let history: FamilyMemberHistory = serde_json::from_value(json!({
            "resourceType": "FamilyMemberHistory",
            "relationship": { "coding": [{ "code": "FTH", "display": "Father" }] },
            "condition": null
        }))
        .unwrap();
        assert!(history.condition.is_empty());
        assert_eq!(
            history.relationship.unwrap().display_text(),
            Some("Father")
        );
    }

    #[test]
    fn decode_records_degrades_malformed_to_default() {
        let records: Vec<Condition> = decode_records(vec![
            json!({ "code": { "coding": [{ "display": "Diabetes" }] } }),
            json!({ "code": "not-an-object" }),
            Value::Null,
        ]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], Condition::default());
    }

    #[test]
    fn human_name_display() {
        let name: HumanName = serde_json::from_value(json!({
            "given": ["Jane", "Q"],
            "family": "Doe",
            "prefix": ["Dr."]
        }))
        .unwrap();
        assert_eq!(name.display().as_deref(), Some("Dr. Jane Q Doe"));
        assert_eq!(HumanName::default().display(), None);
    }

    #[test]
    fn address_one_line() {
        let address: Address = serde_json::from_value(json!({
            "line": ["1 Main St"],
            "city": "Boston",
            "state": "MA",
            "postalCode": "02110"
        }))
        .unwrap();
        assert_eq!(address.one_line().as_deref(), Some("1 Main St, Boston, MA, 02110"));
    }
}
