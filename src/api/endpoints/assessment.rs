//! Self-assessment endpoints.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AssessmentRequest, AssessmentResponse, ConditionCatalogue};
use crate::collector::form::{CONDITION_OPTIONS, NONE_OF_THE_ABOVE};
use crate::wizard::Wizard;

/// `GET /api/conditions`: checklist options of every step.
pub async fn conditions() -> Json<ConditionCatalogue> {
    Json(ConditionCatalogue {
        conditions: CONDITION_OPTIONS.to_vec(),
        none_option: NONE_OF_THE_ABOVE,
    })
}

/// `POST /api/assessment`: run the wizard end to end and return the
/// results view.
pub async fn submit(
    State(ctx): State<ApiContext>,
    Json(req): Json<AssessmentRequest>,
) -> Result<Json<AssessmentResponse>, ApiError> {
    let mut wizard = Wizard::new();
    if let Some(draft) = wizard.draft_mut() {
        req.apply_to(draft);
    }
    wizard.next()?;
    wizard.next()?;

    let report = wizard.submit(ctx.predictor.as_ref()).await?.clone();
    Ok(Json(AssessmentResponse {
        step: wizard.step(),
        personal_info: wizard.personal_info(),
        report,
    }))
}
