use axum::{
    extract::{FromRef, State},
    routing::post,
    Json, Router,
};
use time::{Duration, OffsetDateTime};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        code,
        dto::{SignUpRequest, SignUpResponse, TokenRequest, TokenResponse},
        jwt::JwtKeys,
    },
    error::{AppError, AppJson, FieldErrors},
    mail::OutgoingMail,
    state::AppState,
    users::{
        model::{NewUser, User},
        validation::{check_email, check_username, normalize_email, REQUIRED},
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/token", post(retrieve_token))
}

fn required(errors: &mut FieldErrors, field: &str, value: Option<String>) -> String {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => v,
        Some(_) => {
            errors.add(field, "This field may not be blank.");
            String::new()
        }
        None => {
            errors.add(field, REQUIRED);
            String::new()
        }
    }
}

/// Replaces any pending code with a fresh one and mails it to the user.
pub async fn issue_confirmation_code(state: &AppState, user: &User) -> Result<(), AppError> {
    let code = code::generate();
    let hash = code::hash(&code)?;
    let expires_at =
        OffsetDateTime::now_utc() + Duration::minutes(state.config.confirmation_ttl_minutes);

    state
        .users
        .set_confirmation(user.id, Some(hash), Some(expires_at))
        .await?;

    let mail = OutgoingMail::confirmation_code(&state.config.mail.from, &user.email, &code);
    if let Err(e) = state.mailer.send(mail).await {
        error!(error = %e, user_id = %user.id, "confirmation mail failed");
        return Err(AppError::Internal(e));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SignUpRequest>,
) -> Result<Json<SignUpResponse>, AppError> {
    let mut errors = FieldErrors::new();
    let username = required(&mut errors, "username", payload.username);
    let email = normalize_email(&required(&mut errors, "email", payload.email));
    if !username.is_empty() {
        check_username(&mut errors, &username);
    }
    if !email.is_empty() {
        check_email(&mut errors, &email);
    }
    if !errors.is_empty() {
        warn!(?errors, "sign-up payload rejected");
        return Err(AppError::Validation(errors));
    }

    let by_username = state.users.find_by_username(&username).await?;
    let by_email = state.users.find_by_email(&email).await?;

    let user = match (by_username, by_email) {
        (Some(u), Some(e)) if u.id == e.id => {
            info!(user_id = %u.id, "sign-up repeated; re-sending code");
            u
        }
        (None, None) => {
            let user = state.users.create(NewUser::new(&username, &email)).await?;
            info!(user_id = %user.id, username = %user.username, "user signed up");
            user
        }
        (taken_name, taken_email) => {
            if taken_name.is_some() {
                errors.add("username", "A user with that username already exists.");
            }
            if taken_email.is_some() {
                errors.add("email", "A user with that email already exists.");
            }
            warn!(%username, %email, "sign-up conflicts with existing user");
            return Err(AppError::Validation(errors));
        }
    };

    issue_confirmation_code(&state, &user).await?;

    Ok(Json(SignUpResponse {
        email: user.email,
        username: user.username,
    }))
}

#[instrument(skip(state, payload))]
pub async fn retrieve_token(
    State(state): State<AppState>,
    AppJson(payload): AppJson<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let mut errors = FieldErrors::new();
    let username = required(&mut errors, "username", payload.username);
    let confirmation_code = required(&mut errors, "confirmation_code", payload.confirmation_code);
    errors.into_result()?;

    let user = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;

    if !code::check(&user, &confirmation_code, OffsetDateTime::now_utc())? {
        warn!(user_id = %user.id, "confirmation code rejected");
        return Err(AppError::InvalidConfirmationCode);
    }

    // Codes are single use.
    state.users.set_confirmation(user.id, None, None).await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_access(user.id)?;

    info!(user_id = %user.id, "access token issued");
    Ok(Json(TokenResponse { token }))
}
