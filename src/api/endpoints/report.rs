//! Record-driven prediction report.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};

use super::request_session;
use crate::api::error::ApiError;
use crate::api::middleware::auth::AccessToken;
use crate::api::types::{ApiContext, SessionQuery};
use crate::collector::RecordCollector;
use crate::report::{generate_report, PatientReport};

/// `GET /api/patients/:id/report`
pub async fn patient_report(
    State(ctx): State<ApiContext>,
    Extension(token): Extension<AccessToken>,
    Path(patient_id): Path<String>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<PatientReport>, ApiError> {
    let session = request_session(&ctx, patient_id, &token, query)?;
    let collector = RecordCollector::new(&session);
    let report = generate_report(&collector, ctx.predictor.as_ref()).await?;
    Ok(Json(report))
}
