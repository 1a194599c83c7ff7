//! Self-assessment draft: the state the wizard accumulates before submission.

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{CollectError, Collector, RawFamilyData};
use crate::models::{ConditionSet, Gender, SiblingKind};

/// Root subject id of a self-assessment.
pub const SELF_ASSESSMENT_ID: &str = "self-assessment";

/// Sentinel option meaning "explicitly nothing".
pub const NONE_OF_THE_ABOVE: &str = "None of the above";

/// Conditions offered by the form; the labels the prediction model knows.
pub const CONDITION_OPTIONS: &[&str] = &[
    "Diabetes",
    "Hypertension",
    "Cancer",
    "Heart Disease",
    "Alzheimer",
    "Asthma",
];

const MAX_AGE: u8 = 130;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("Age is required")]
    AgeRequired,

    #[error("Age must be a whole number between 0 and 130, got {0:?}")]
    InvalidAge(String),

    #[error("Gender is required")]
    GenderRequired,

    #[error("Unknown gender: {0}")]
    InvalidGender(String),
}

// ═══════════════════════════════════════════════════════════
// ConditionSelection
// ═══════════════════════════════════════════════════════════

/// One subject's checklist. The sentinel and real conditions are mutually
/// exclusive; the most recent selection wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSelection {
    conditions: ConditionSet,
    none_selected: bool,
}

impl ConditionSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, label: &str) {
        if label == NONE_OF_THE_ABOVE {
            self.conditions.clear();
            self.none_selected = true;
        } else {
            self.none_selected = false;
            self.conditions.insert(label);
        }
    }

    pub fn deselect(&mut self, label: &str) {
        if label == NONE_OF_THE_ABOVE {
            self.none_selected = false;
        } else {
            self.conditions.remove(label);
        }
    }

    /// Checkbox callback.
    pub fn set_checked(&mut self, label: &str, checked: bool) {
        if checked {
            self.select(label);
        } else {
            self.deselect(label);
        }
    }

    /// Free-text "other" entry. Trimmed; ignored when blank or already present.
    pub fn add_free_text(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() || self.conditions.contains(text) {
            return false;
        }
        self.select(text);
        true
    }

    pub fn is_selected(&self, label: &str) -> bool {
        if label == NONE_OF_THE_ABOVE {
            self.none_selected
        } else {
            self.conditions.contains(label)
        }
    }

    pub fn is_none_selected(&self) -> bool {
        self.none_selected
    }

    /// Selected real conditions (never contains the sentinel).
    pub fn conditions(&self) -> &ConditionSet {
        &self.conditions
    }
}

impl<'a> FromIterator<&'a str> for ConditionSelection {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut selection = Self::new();
        for label in iter {
            selection.select(label);
        }
        selection
    }
}

// ═══════════════════════════════════════════════════════════
// Personal info
// ═══════════════════════════════════════════════════════════

/// Raw step-1 inputs, as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub age: String,
    pub gender: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidPersonalInfo {
    pub age: u8,
    pub gender: Gender,
}

impl PersonalInfo {
    pub fn validate(&self) -> Result<ValidPersonalInfo, FormError> {
        let age_raw = self.age.trim();
        if age_raw.is_empty() {
            return Err(FormError::AgeRequired);
        }
        let age = age_raw
            .parse::<u8>()
            .ok()
            .filter(|age| *age <= MAX_AGE)
            .ok_or_else(|| FormError::InvalidAge(age_raw.to_string()))?;

        let gender_raw = self.gender.trim();
        if gender_raw.is_empty() {
            return Err(FormError::GenderRequired);
        }
        let gender = gender_raw
            .to_lowercase()
            .parse::<Gender>()
            .map_err(|_| FormError::InvalidGender(gender_raw.to_string()))?;

        Ok(ValidPersonalInfo { age, gender })
    }
}

// ═══════════════════════════════════════════════════════════
// Siblings
// ═══════════════════════════════════════════════════════════

/// Nested sub-form opened by "add sibling".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiblingForm {
    pub kind: SiblingKind,
    pub selection: ConditionSelection,
}

/// A confirmed sibling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiblingEntry {
    pub kind: SiblingKind,
    pub conditions: ConditionSet,
}

// ═══════════════════════════════════════════════════════════
// AssessmentDraft
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssessmentDraft {
    pub personal_info: PersonalInfo,
    pub own: ConditionSelection,
    pub father: ConditionSelection,
    pub mother: ConditionSelection,
    siblings: Vec<SiblingEntry>,
}

impl AssessmentDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_sibling_form(&self, kind: SiblingKind) -> SiblingForm {
        SiblingForm {
            kind,
            selection: ConditionSelection::new(),
        }
    }

    pub fn confirm_sibling(&mut self, form: SiblingForm) {
        self.siblings.push(SiblingEntry {
            kind: form.kind,
            conditions: form.selection.conditions().clone(),
        });
    }

    pub fn remove_sibling(&mut self, index: usize) -> Option<SiblingEntry> {
        (index < self.siblings.len()).then(|| self.siblings.remove(index))
    }

    pub fn siblings(&self) -> &[SiblingEntry] {
        &self.siblings
    }

    /// Union of the conditions of every confirmed sibling of `kind`.
    pub fn sibling_conditions(&self, kind: SiblingKind) -> ConditionSet {
        let mut merged = ConditionSet::new();
        for sibling in self.siblings.iter().filter(|s| s.kind == kind) {
            merged.merge(&sibling.conditions);
        }
        merged
    }

    /// Collector output. Brother and sister buckets merge into Sibling.
    pub fn to_raw_family_data(&self, root_id: &str) -> RawFamilyData {
        let mut siblings = self.sibling_conditions(SiblingKind::Brother);
        siblings.merge(&self.sibling_conditions(SiblingKind::Sister));

        RawFamilyData {
            root_id: root_id.to_string(),
            root_conditions: self.own.conditions().clone(),
            father_conditions: self.father.conditions().clone(),
            mother_conditions: self.mother.conditions().clone(),
            sibling_conditions: siblings,
            ..Default::default()
        }
    }
}

/// Form-driven collector: the draft is already complete, no I/O.
pub struct FormCollector {
    draft: AssessmentDraft,
    root_id: String,
}

impl FormCollector {
    pub fn new(draft: AssessmentDraft) -> Self {
        Self {
            draft,
            root_id: SELF_ASSESSMENT_ID.to_string(),
        }
    }
}

impl Collector for FormCollector {
    fn collect(&self) -> BoxFuture<'_, Result<RawFamilyData, CollectError>> {
        future::ready(Ok(self.draft.to_raw_family_data(&self.root_id))).boxed()
    }
}
