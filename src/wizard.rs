//! Self-assessment wizard state machine.
//!
//! `PersonalInfo -> Conditions -> FamilyHistory -> Submitting -> Results`.
//! Backward moves are allowed from steps 2 and 3 only; a failed submission
//! returns to `FamilyHistory` with an error indicator; `reset` abandons any
//! in-flight submission.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::collector::form::{FormError, ValidPersonalInfo, SELF_ASSESSMENT_ID};
use crate::collector::{AssessmentDraft, CollectError, FormCollector};
use crate::generation::{LoadGeneration, LoadTicket};
use crate::prediction::{PredictionError, PredictionReport, PredictionResponse, PredictionService};
use crate::report::{run_prediction, ReportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    PersonalInfo,
    Conditions,
    FamilyHistory,
    Submitting,
    Results,
}

impl WizardStep {
    /// 1-based form step, `None` once the form is submitted.
    pub fn number(&self) -> Option<u8> {
        match self {
            Self::PersonalInfo => Some(1),
            Self::Conditions => Some(2),
            Self::FamilyHistory => Some(3),
            Self::Submitting | Self::Results => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum AssessmentError {
    #[error("Invalid personal information: {0}")]
    InvalidPersonalInfo(#[from] FormError),

    #[error("Cannot {action} from step {from:?}")]
    IllegalTransition {
        from: WizardStep,
        action: &'static str,
    },

    #[error("Could not collect answers: {0}")]
    Collect(#[from] CollectError),

    #[error("Prediction failed: {0}")]
    Prediction(#[from] PredictionError),

    #[error("Submission was superseded")]
    Superseded,
}

pub struct Wizard {
    step: WizardStep,
    draft: AssessmentDraft,
    personal_info: Option<ValidPersonalInfo>,
    error: Option<String>,
    report: Option<PredictionReport>,
    generation: LoadGeneration,
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new()
    }
}

impl Wizard {
    pub fn new() -> Self {
        Self {
            step: WizardStep::PersonalInfo,
            draft: AssessmentDraft::new(),
            personal_info: None,
            error: None,
            report: None,
            generation: LoadGeneration::new(),
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn draft(&self) -> &AssessmentDraft {
        &self.draft
    }

    /// Editable only while the form is shown.
    pub fn draft_mut(&mut self) -> Option<&mut AssessmentDraft> {
        self.step.number().map(|_| &mut self.draft)
    }

    pub fn personal_info(&self) -> Option<ValidPersonalInfo> {
        self.personal_info
    }

    /// Message of the last failed submission.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn report(&self) -> Option<&PredictionReport> {
        self.report.as_ref()
    }

    pub fn next(&mut self) -> Result<WizardStep, AssessmentError> {
        self.step = match self.step {
            WizardStep::PersonalInfo => {
                self.personal_info = Some(self.draft.personal_info.validate()?);
                WizardStep::Conditions
            }
            WizardStep::Conditions => WizardStep::FamilyHistory,
            from => {
                return Err(AssessmentError::IllegalTransition {
                    from,
                    action: "advance",
                })
            }
        };
        Ok(self.step)
    }

    pub fn back(&mut self) -> Result<WizardStep, AssessmentError> {
        self.step = match self.step {
            WizardStep::Conditions => WizardStep::PersonalInfo,
            WizardStep::FamilyHistory => WizardStep::Conditions,
            from => {
                return Err(AssessmentError::IllegalTransition {
                    from,
                    action: "go back",
                })
            }
        };
        Ok(self.step)
    }

    /// Enter `Submitting` and freeze the answers into a collector. The ticket
    /// must be handed back to `finish_submit`.
    pub fn begin_submit(&mut self) -> Result<(LoadTicket, FormCollector), AssessmentError> {
        if self.step != WizardStep::FamilyHistory {
            return Err(AssessmentError::IllegalTransition {
                from: self.step,
                action: "submit",
            });
        }
        let collector = FormCollector::new(self.draft.clone());

        self.error = None;
        self.step = WizardStep::Submitting;
        Ok((self.generation.begin(), collector))
    }

    /// Apply a submission outcome. Returns `false` when the ticket is stale
    /// and the outcome was discarded.
    pub fn finish_submit(
        &mut self,
        ticket: LoadTicket,
        outcome: Result<PredictionResponse, PredictionError>,
    ) -> bool {
        if !self.accepts(ticket) {
            return false;
        }
        match outcome {
            Ok(response) => self.record_success(&response),
            Err(e) => self.record_failure(&e),
        }
        true
    }

    /// Submit and wait for the outcome.
    pub async fn submit(
        &mut self,
        service: &dyn PredictionService,
    ) -> Result<&PredictionReport, AssessmentError> {
        let (ticket, collector) = self.begin_submit()?;
        let outcome = run_prediction(&collector, service).await;
        if !self.accepts(ticket) {
            return Err(AssessmentError::Superseded);
        }
        match outcome {
            Ok(run) => {
                self.record_success(&run.response);
                self.report.as_ref().ok_or(AssessmentError::Superseded)
            }
            Err(ReportError::Prediction(e)) => {
                self.record_failure(&e);
                Err(e.into())
            }
            Err(ReportError::Collect(e)) => {
                self.record_failure(&e);
                Err(e.into())
            }
        }
    }

    fn accepts(&self, ticket: LoadTicket) -> bool {
        let live = self.generation.is_current(ticket) && self.step == WizardStep::Submitting;
        if !live {
            tracing::debug!(step = ?self.step, "Discarding stale assessment result");
        }
        live
    }

    fn record_success(&mut self, response: &PredictionResponse) {
        self.report = Some(PredictionReport::from_response(response, SELF_ASSESSMENT_ID));
        self.step = WizardStep::Results;
    }

    fn record_failure(&mut self, error: &dyn fmt::Display) {
        tracing::warn!(error = %error, "Assessment submission failed");
        self.error = Some(error.to_string());
        self.step = WizardStep::FamilyHistory;
    }

    /// Back to step 1 with a fresh draft; in-flight submissions become stale.
    pub fn reset(&mut self) {
        self.generation.invalidate();
        self.step = WizardStep::PersonalInfo;
        self.draft = AssessmentDraft::new();
        self.personal_info = None;
        self.error = None;
        self.report = None;
    }
}
