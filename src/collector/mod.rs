//! Condition collection: two sources, one output shape.
//!
//! The self-assessment wizard (`form`) and the clinical-record store
//! (`record`) both produce `RawFamilyData`, which the aggregator turns into
//! a `CanonicalGraph`.

pub mod form;
pub mod record;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ConditionSet, RelationshipType};
use crate::records::RecordStoreError;

pub use form::{
    AssessmentDraft, ConditionSelection, FormCollector, PersonalInfo, SiblingEntry, SiblingForm,
};
pub use record::{RecordBundle, RecordCollector};

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("No patient selected for this session")]
    NoPatient,

    #[error("Record store error: {0}")]
    RecordStore(#[from] RecordStoreError),
}

/// Condition labels for the root subject and the three relative categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFamilyData {
    pub root_id: String,
    pub root_conditions: ConditionSet,
    pub root_immunizations: ConditionSet,
    pub root_allergies: ConditionSet,
    pub father_conditions: ConditionSet,
    pub mother_conditions: ConditionSet,
    pub sibling_conditions: ConditionSet,
}

impl RawFamilyData {
    pub fn new(root_id: impl Into<String>) -> Self {
        Self {
            root_id: root_id.into(),
            ..Default::default()
        }
    }

    pub fn relative_conditions(&self, kind: RelationshipType) -> &ConditionSet {
        match kind {
            RelationshipType::Father => &self.father_conditions,
            RelationshipType::Mother => &self.mother_conditions,
            RelationshipType::Sibling => &self.sibling_conditions,
        }
    }

    pub fn relative_conditions_mut(&mut self, kind: RelationshipType) -> &mut ConditionSet {
        match kind {
            RelationshipType::Father => &mut self.father_conditions,
            RelationshipType::Mother => &mut self.mother_conditions,
            RelationshipType::Sibling => &mut self.sibling_conditions,
        }
    }
}

/// A source of `RawFamilyData`, selected by deployment mode.
pub trait Collector: Send + Sync {
    fn collect(&self) -> BoxFuture<'_, Result<RawFamilyData, CollectError>>;
}
