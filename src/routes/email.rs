use axum::extract::State;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::auth::extractor::AuthUser;
use crate::email::deliver;
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::SharedState;
use crate::validation::{not_blank, recipients, ValidJson};

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SendSingleRequest {
    #[validate(custom(function = "not_blank"), email)]
    pub to: String,
    #[validate(custom(function = "not_blank"))]
    pub subject: String,
    #[validate(custom(function = "not_blank"))]
    pub body: String,
}

#[derive(Debug, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct SendMultipleRequest {
    #[validate(length(min = 1, code = "empty"), custom(function = "recipients"))]
    pub to: Vec<String>,
    #[validate(custom(function = "not_blank"))]
    pub subject: String,
    #[validate(custom(function = "not_blank"))]
    pub body: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SendBulkGroupsRequest {
    #[validate(length(min = 1, code = "empty"), nested)]
    pub groups: Vec<SendMultipleRequest>,
}

pub async fn send_single(
    auth: AuthUser,
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<SendSingleRequest>,
) -> Result<ApiResponse, AppError> {
    auth.require_admin()?;

    deliver(state.mailer.as_ref(), &[req.to.trim().to_string()], &req.subject, &req.body)
        .await
        .map_err(AppError::Internal)?;

    Ok(ApiResponse::ok("Email sent successfully"))
}

pub async fn send_multiple(
    auth: AuthUser,
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<SendMultipleRequest>,
) -> Result<ApiResponse, AppError> {
    auth.require_admin()?;

    let to: Vec<String> = req.to.iter().map(|t| t.trim().to_string()).collect();
    deliver(state.mailer.as_ref(), &to, &req.subject, &req.body)
        .await
        .map_err(AppError::Internal)?;

    Ok(ApiResponse::ok("Email sent to multiple users successfully"))
}

/// Sends every group concurrently; one failed group does not fail the rest.
pub async fn send_bulk_groups(
    auth: AuthUser,
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<SendBulkGroupsRequest>,
) -> Result<ApiResponse, AppError> {
    auth.require_admin()?;

    let sends = req.groups.iter().map(|group| {
        let to: Vec<String> = group.to.iter().map(|t| t.trim().to_string()).collect();
        let mailer = state.mailer.clone();
        async move { deliver(mailer.as_ref(), &to, &group.subject, &group.body).await }
    });

    let results: Vec<_> = join_all(sends)
        .await
        .into_iter()
        .map(|outcome| match outcome {
            Ok(()) => json!({
                "success": true,
                "statusCode": 200,
                "message": "Email sent to group successfully",
            }),
            Err(e) => json!({
                "success": false,
                "statusCode": 500,
                "message": e,
            }),
        })
        .collect();

    let all_sent = results.iter().all(|r| r["success"] == true);

    Ok(ApiResponse::ok("Bulk group email processing completed")
        .with_success(all_sent)
        .with_docs(results))
}
