//! Contact form route handler.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use larkspur_core::Email;

use crate::error::{AppError, Result};
use crate::services::notifications::{ContactMessage, notify_contact_message};
use crate::state::AppState;
use crate::store::Backend;

/// Contact form data.
#[derive(Debug, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: String,
    pub message: String,
}

/// Response for form submission.
#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub success: bool,
}

/// Submit a contact message to the admin feed.
///
/// POST /api/contact
#[instrument(skip(state, form))]
pub async fn submit<B: Backend>(
    State(state): State<AppState<B>>,
    Json(form): Json<ContactForm>,
) -> Result<Json<ContactResponse>> {
    let email = Email::parse(&form.email)
        .map_err(|_| AppError::BadRequest("Please enter a valid email address.".to_owned()))?;

    if form.name.trim().is_empty() || form.message.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Name and message are required.".to_owned(),
        ));
    }

    let message = ContactMessage {
        name: form.name.trim().to_owned(),
        email,
        subject: form.subject.trim().to_owned(),
        body: form.message.trim().to_owned(),
    };
    notify_contact_message(state.backend().notifications(), &message).await?;

    Ok(Json(ContactResponse { success: true }))
}
