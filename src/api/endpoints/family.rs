//! Family history and related persons.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};

use super::request_session;
use crate::api::error::ApiError;
use crate::api::middleware::auth::AccessToken;
use crate::api::types::{ApiContext, SessionQuery};
use crate::family::{
    load_family_history, load_related_persons, FamilyHistoryPage, RelatedPersonsPage,
};

/// `GET /api/patients/:id/family-history`
pub async fn family_history(
    State(ctx): State<ApiContext>,
    Extension(token): Extension<AccessToken>,
    Path(patient_id): Path<String>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<FamilyHistoryPage>, ApiError> {
    let session = request_session(&ctx, patient_id, &token, query)?;
    load_family_history(&session)
        .await?
        .map(Json)
        .ok_or(ApiError::Unauthorized)
}

/// `GET /api/patients/:id/related-persons`
pub async fn related_persons(
    State(ctx): State<ApiContext>,
    Extension(token): Extension<AccessToken>,
    Path(patient_id): Path<String>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<RelatedPersonsPage>, ApiError> {
    let session = request_session(&ctx, patient_id, &token, query)?;
    load_related_persons(&session)
        .await?
        .map(Json)
        .ok_or(ApiError::Unauthorized)
}
