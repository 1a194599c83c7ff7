//! API endpoint handlers, one module per page of the web client.

pub mod assessment;
pub mod chat;
pub mod family;
pub mod health;
pub mod report;

use crate::api::error::ApiError;
use crate::api::middleware::auth::AccessToken;
use crate::api::types::{ApiContext, SessionQuery};
use crate::records::{is_relative_reference, is_valid_id};
use crate::session::Session;

/// Session for a record-driven request: the caller's token opens the store.
///
/// The patient id must be a FHIR id and `fhirUser` a relative
/// `ResourceType/id` reference; both end up in record-store queries.
pub(crate) fn request_session(
    ctx: &ApiContext,
    patient_id: String,
    token: &AccessToken,
    query: SessionQuery,
) -> Result<Session, ApiError> {
    if !is_valid_id(&patient_id) {
        return Err(ApiError::BadRequest("Invalid patient id".into()));
    }
    if let Some(reference) = query.fhir_user.as_deref() {
        if !is_relative_reference(reference) {
            return Err(ApiError::BadRequest(
                "fhirUser must be a relative ResourceType/id reference".into(),
            ));
        }
    }

    let mut session =
        Session::new(ctx.records.open(token.as_deref())).with_patient_id(patient_id);
    if let Some(token) = token.as_deref() {
        session = session.with_access_token(token);
    }
    if let Some(reference) = query.fhir_user {
        session = session.with_fhir_user(reference);
    }
    Ok(session)
}
