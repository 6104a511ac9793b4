use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Fund, Role};

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub pin: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
}

// -- Transactions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewTransactionRequest {
    pub amount: i64,
    pub purpose: String,
    pub fund: Fund,
    /// Calendar date of the transaction, `YYYY-MM-DD`.
    pub transaction_date: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTransactionRequest {
    pub amount: Option<i64>,
    pub purpose: Option<String>,
    pub fund: Option<Fund>,
    pub transaction_date: Option<String>,
}

// -- Committee --

/// Image payload carried inline as base64, the same way binary bodies are
/// shipped elsewhere in the API.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: String,
    pub data: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewCommitteeMemberRequest {
    pub name: String,
    pub designation: String,
    pub phone: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCommitteeMemberRequest {
    pub name: Option<String>,
    pub designation: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
    pub image: Option<ImageUpload>,
}

fn default_active() -> bool {
    true
}
