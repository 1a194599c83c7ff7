//! Family-history and related-person pages.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::fhir::{FamilyMemberHistory, Patient, RelatedPerson};
use crate::models::ConditionSet;
use crate::records::{fetch_patient, fetch_records, patient_scoped_query, RecordStoreError};
use crate::session::Session;

const UNKNOWN_RELATIONSHIP: &str = "Unknown";
const UNKNOWN_CONDITION: &str = "Unknown Condition";
const UNRANKED: u8 = 99;

fn relationship_rank(label: &str) -> u8 {
    match label {
        "Father" => 1,
        "Mother" => 2,
        "Brother" | "Sister" => 3,
        _ => UNRANKED,
    }
}

// ═══════════════════════════════════════════════════════════
// Family history view
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyGroup {
    pub relationship: String,
    pub rank: u8,
    pub conditions: ConditionSet,
}

/// Group histories by their raw relationship label. Groups are ordered by
/// rank; ties keep first-seen order.
pub fn group_by_relationship(histories: &[FamilyMemberHistory]) -> Vec<FamilyGroup> {
    let mut groups: Vec<FamilyGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for history in histories {
        let label = history
            .relationship
            .as_ref()
            .and_then(|r| r.first_coding())
            .and_then(|c| c.display.as_deref())
            .filter(|d| !d.is_empty())
            .unwrap_or(UNKNOWN_RELATIONSHIP);

        let slot = *index.entry(label.to_string()).or_insert_with(|| {
            groups.push(FamilyGroup {
                relationship: label.to_string(),
                rank: relationship_rank(label),
                conditions: ConditionSet::new(),
            });
            groups.len() - 1
        });

        for condition in &history.condition {
            let name = condition
                .code
                .as_ref()
                .and_then(|c| c.display_text())
                .unwrap_or(UNKNOWN_CONDITION);
            groups[slot].conditions.insert(name);
        }
    }

    groups.sort_by_key(|g| g.rank);
    groups
}

// ═══════════════════════════════════════════════════════════
// Related persons view
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactLink {
    pub system: Option<String>,
    pub value: String,
    pub href: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedPersonSummary {
    pub id: Option<String>,
    pub name: Option<String>,
    pub relationship: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<String>,
    pub contacts: Vec<ContactLink>,
    pub address: Option<String>,
    pub status: Option<&'static str>,
}

impl From<&RelatedPerson> for RelatedPersonSummary {
    fn from(person: &RelatedPerson) -> Self {
        let contacts = person
            .telecom
            .iter()
            .filter_map(|contact| {
                let value = contact.value.as_deref()?;
                let scheme = if contact.system.as_deref() == Some("email") {
                    "mailto:"
                } else {
                    "tel:"
                };
                Some(ContactLink {
                    system: contact.system.clone(),
                    value: value.to_string(),
                    href: format!("{scheme}{value}"),
                })
            })
            .collect();

        Self {
            id: person.id.clone(),
            name: person.name.first().and_then(|n| n.display()),
            relationship: person
                .relationship
                .first()
                .and_then(|r| r.display_text())
                .map(str::to_string),
            gender: person.gender.clone(),
            birth_date: person.birth_date.clone(),
            contacts,
            address: person.address.first().and_then(|a| a.one_line()),
            status: person
                .active
                .map(|active| if active { "Active" } else { "Inactive" }),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Page loads
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    pub id: Option<String>,
    pub name: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<String>,
}

impl From<&Patient> for PatientSummary {
    fn from(patient: &Patient) -> Self {
        Self {
            id: patient.id.clone(),
            name: patient.display_name(),
            gender: patient.gender.clone(),
            birth_date: patient.birth_date.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyHistoryPage {
    pub patient: Option<PatientSummary>,
    pub groups: Vec<FamilyGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedPersonsPage {
    pub patient: Option<PatientSummary>,
    pub related_persons: Vec<RelatedPersonSummary>,
}

/// Patient id of an authorized session, or `None` when the load must not run.
fn authorized_patient(session: &Session) -> Option<&str> {
    if session.access_token().is_none() {
        tracing::debug!("No access token in session, skipping page load");
        return None;
    }
    session.patient_fhir_id()
}

/// Fetch the patient (kept in the session if none is set yet) and run the
/// best-effort user lookup alongside.
async fn load_patient(
    session: &Session,
    patient_id: &str,
) -> Result<Option<PatientSummary>, RecordStoreError> {
    let (patient, ()) = tokio::join!(
        fetch_patient(session.store(), patient_id),
        session.refresh_user()
    );
    if let Some(patient) = patient? {
        session.set_patient_if_absent(patient);
    }
    Ok(session.patient().as_ref().map(PatientSummary::from))
}

pub async fn load_family_history(
    session: &Session,
) -> Result<Option<FamilyHistoryPage>, RecordStoreError> {
    let Some(patient_id) = authorized_patient(session) else {
        return Ok(None);
    };
    let patient = load_patient(session, patient_id).await?;
    let histories: Vec<FamilyMemberHistory> = fetch_records(
        session.store(),
        &patient_scoped_query::<FamilyMemberHistory>(patient_id),
    )
    .await?;

    let groups = group_by_relationship(&histories);
    tracing::info!(patient_id, groups = groups.len(), "Loaded family history");
    Ok(Some(FamilyHistoryPage { patient, groups }))
}

pub async fn load_related_persons(
    session: &Session,
) -> Result<Option<RelatedPersonsPage>, RecordStoreError> {
    let Some(patient_id) = authorized_patient(session) else {
        return Ok(None);
    };
    let patient = load_patient(session, patient_id).await?;
    let persons: Vec<RelatedPerson> = fetch_records(
        session.store(),
        &patient_scoped_query::<RelatedPerson>(patient_id),
    )
    .await?;

    tracing::info!(
        patient_id,
        related_persons = persons.len(),
        "Loaded related persons"
    );
    Ok(Some(RelatedPersonsPage {
        patient,
        related_persons: persons.iter().map(RelatedPersonSummary::from).collect(),
    }))
}
