use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::extractors::{AdminUser, CurrentUser},
    error::{AppError, AppJson, FieldErrors},
    state::AppState,
    users::{
        dto::{page_count, ListQuery, Page, UserBody, UserResponse},
        model::{NewUser, Role, User},
        validation::{check_email, check_name, check_username, normalize_email, REQUIRED},
    },
};

const USERS_PATH: &str = "/api/v1/users";

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/me", get(get_me).patch(patch_me))
        .route(
            "/users/:username",
            get(get_user).patch(patch_user).delete(delete_user),
        )
}

fn parse_role(errors: &mut FieldErrors, raw: &str) -> Option<Role> {
    match raw.parse::<Role>() {
        Ok(role) => Some(role),
        Err(_) => {
            errors.add("role", format!("\"{raw}\" is not a valid choice."));
            None
        }
    }
}

async fn check_username_free(
    state: &AppState,
    errors: &mut FieldErrors,
    username: &str,
    owner: Option<&User>,
) -> Result<(), AppError> {
    if errors.has("username") {
        return Ok(());
    }
    if let Some(existing) = state.users.find_by_username(username).await? {
        if owner.map_or(true, |o| o.id != existing.id) {
            errors.add("username", "A user with that username already exists.");
        }
    }
    Ok(())
}

async fn check_email_free(
    state: &AppState,
    errors: &mut FieldErrors,
    email: &str,
    owner: Option<&User>,
) -> Result<(), AppError> {
    if errors.has("email") {
        return Ok(());
    }
    if let Some(existing) = state.users.find_by_email(email).await? {
        if owner.map_or(true, |o| o.id != existing.id) {
            errors.add("email", "A user with that email already exists.");
        }
    }
    Ok(())
}

/// Partial update; `role` is only honoured when `allow_role` is set.
async fn apply_changes(
    state: &AppState,
    mut user: User,
    body: UserBody,
    allow_role: bool,
) -> Result<User, AppError> {
    let mut errors = FieldErrors::new();
    let current = user.clone();

    if let Some(username) = body.username {
        let username = username.trim().to_string();
        check_username(&mut errors, &username);
        check_username_free(state, &mut errors, &username, Some(&current)).await?;
        user.username = username;
    }
    if let Some(email) = body.email {
        let email = normalize_email(&email);
        check_email(&mut errors, &email);
        check_email_free(state, &mut errors, &email, Some(&current)).await?;
        user.email = email;
    }
    if let Some(first_name) = body.first_name {
        check_name(&mut errors, "first_name", &first_name);
        user.first_name = first_name;
    }
    if let Some(last_name) = body.last_name {
        check_name(&mut errors, "last_name", &last_name);
        user.last_name = last_name;
    }
    if let Some(bio) = body.bio {
        user.bio = bio;
    }
    if allow_role {
        if let Some(role) = body.role.as_deref().and_then(|r| parse_role(&mut errors, r)) {
            user.role = role;
        }
    }
    errors.into_result()?;

    Ok(state.users.update(&user).await?)
}

#[instrument(skip(state, _admin))]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(q): Query<ListQuery>,
) -> Result<Json<Page<UserResponse>>, AppError> {
    let page_size = state.config.page_size;
    let page = q.page.unwrap_or(1);
    let search = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let offset = page
        .checked_sub(1)
        .filter(|p| *p >= 0)
        .and_then(|p| p.checked_mul(page_size))
        .ok_or(AppError::NotFound)?;

    let (users, count) = state.users.list(search, page_size, offset).await?;
    if page > page_count(count, page_size) {
        return Err(AppError::NotFound);
    }

    let results = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(Page::build(
        USERS_PATH, search, page, page_size, count, results,
    )))
}

#[instrument(skip(state, admin, body))]
pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppJson(body): AppJson<UserBody>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let mut errors = FieldErrors::new();

    let username = body.username.map(|u| u.trim().to_string());
    let email = body.email.map(|e| normalize_email(&e));
    match &username {
        Some(u) => check_username(&mut errors, u),
        None => errors.add("username", REQUIRED),
    }
    match &email {
        Some(e) => check_email(&mut errors, e),
        None => errors.add("email", REQUIRED),
    }
    if let Some(u) = &username {
        check_username_free(&state, &mut errors, u, None).await?;
    }
    if let Some(e) = &email {
        check_email_free(&state, &mut errors, e, None).await?;
    }

    let first_name = body.first_name.unwrap_or_default();
    let last_name = body.last_name.unwrap_or_default();
    check_name(&mut errors, "first_name", &first_name);
    check_name(&mut errors, "last_name", &last_name);
    let role = match body.role.as_deref() {
        Some(raw) => parse_role(&mut errors, raw).unwrap_or_default(),
        None => Role::User,
    };
    errors.into_result()?;

    let user = state
        .users
        .create(NewUser {
            username: username.unwrap_or_default(),
            email: email.unwrap_or_default(),
            first_name,
            last_name,
            bio: body.bio.unwrap_or_default(),
            role,
            is_superuser: false,
        })
        .await?;

    info!(admin_id = %admin.id, user_id = %user.id, role = %user.role, "user created");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, _admin))]
pub async fn get_user(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(username): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, admin, body))]
pub async fn patch_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(username): Path<String>,
    AppJson(body): AppJson<UserBody>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;
    let user = apply_changes(&state, user, body, true).await?;
    info!(admin_id = %admin.id, user_id = %user.id, "user updated");
    Ok(Json(user.into()))
}

#[instrument(skip(state, admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(username): Path<String>,
) -> Result<StatusCode, AppError> {
    let user = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;
    if !state.users.delete(user.id).await? {
        return Err(AppError::NotFound);
    }
    info!(admin_id = %admin.id, user_id = %user.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(user))]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}

#[instrument(skip(state, user, body))]
pub async fn patch_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(body): AppJson<UserBody>,
) -> Result<Json<UserResponse>, AppError> {
    let user = apply_changes(&state, user, body, false).await?;
    info!(user_id = %user.id, "profile updated");
    Ok(Json(user.into()))
}
