use serde::{Deserialize, Serialize};

/// Request body for sign-up. Fields are optional so missing ones
/// surface as field errors rather than a rejected payload.
#[derive(Debug, Default, Deserialize)]
pub struct SignUpRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SignUpResponse {
    pub email: String,
    pub username: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub confirmation_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}
