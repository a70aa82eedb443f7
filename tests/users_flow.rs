mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::setup_test_app;
use yamdb_auth::users::{model::Role, repo::UserRepo};

#[tokio::test]
async fn me_requires_a_valid_bearer_token() {
    let app = setup_test_app();

    let (status, body) = app.get("/api/v1/users/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Authentication credentials were not provided.");

    let (status, _) = app.get("/api/v1/users/me", Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_of_deleted_user_stops_working() {
    let app = setup_test_app();
    let token = app.token_for("ephemeral", "ephemeral@example.com").await;
    let user = app
        .users
        .find_by_username("ephemeral")
        .await
        .unwrap()
        .unwrap();
    app.users.delete(user.id).await.unwrap();

    let (status, _) = app.get("/api/v1/users/me", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_patch_updates_profile_but_not_role() {
    let app = setup_test_app();
    let token = app.token_for("writer", "writer@example.com").await;

    let (status, body) = app
        .patch(
            "/api/v1/users/me",
            Some(&token),
            json!({ "first_name": "Ann", "bio": "Film buff", "role": "admin" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], "Ann");
    assert_eq!(body["bio"], "Film buff");
    assert_eq!(body["role"], "user");

    let stored = app.users.find_by_username("writer").await.unwrap().unwrap();
    assert_eq!(stored.role, Role::User);
}

#[tokio::test]
async fn me_patch_reports_invalid_fields() {
    let app = setup_test_app();
    app.token_for("taken", "taken@example.com").await;
    let token = app.token_for("patcher", "patcher@example.com").await;

    let (status, body) = app
        .patch(
            "/api/v1/users/me",
            Some(&token),
            json!({ "email": "broken", "username": "taken" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("email").is_some());
    assert_eq!(body["username"][0], "A user with that username already exists.");
}

#[tokio::test]
async fn plain_users_and_moderators_cannot_manage_users() {
    let app = setup_test_app();
    let user = app.token_for("plain", "plain@example.com").await;
    let moderator = app.token_with_role("moder", Role::Moderator, false).await;

    for token in [&user, &moderator] {
        let (status, body) = app.get("/api/v1/users", Some(token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            body["detail"],
            "You do not have permission to perform this action."
        );
    }

    let (status, _) = app.get("/api/v1/users", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn superuser_passes_admin_checks() {
    let app = setup_test_app();
    let token = app.token_with_role("boss", Role::User, true).await;
    let (status, body) = app.get("/api/v1/users", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn admin_lists_users_page_by_page() {
    let app = setup_test_app();
    let token = app.admin_token().await;
    for name in ["bob", "carol", "dave"] {
        let (status, _) = app
            .post(
                "/api/v1/users",
                Some(&token),
                json!({ "username": name, "email": format!("{name}@example.com") }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // page size is 2 in the test config
    let (status, first) = app.get("/api/v1/users", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["count"], 4);
    assert_eq!(first["results"].as_array().unwrap().len(), 2);
    assert_eq!(first["results"][0]["username"], "admin");
    assert_eq!(first["next"], "/api/v1/users?page=2");
    assert!(first["previous"].is_null());

    let (status, second) = app.get("/api/v1/users?page=2", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["results"][1]["username"], "dave");
    assert!(second["next"].is_null());

    let (status, _) = app.get("/api/v1/users?page=3", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, found) = app.get("/api/v1/users?search=CAR", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["count"], 1);
    assert_eq!(found["results"][0]["username"], "carol");
}

#[tokio::test]
async fn huge_page_number_is_not_found() {
    let app = setup_test_app();
    let token = app.admin_token().await;

    for page in ["9223372036854775807", "-9223372036854775808", "0"] {
        let (status, body) = app
            .get(&format!("/api/v1/users?page={page}"), Some(&token))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "page={page}");
        assert_eq!(body["detail"], "Not found.");
    }
}

#[tokio::test]
async fn search_links_survive_special_characters() {
    let app = setup_test_app();
    let token = app.admin_token().await;
    for name in ["a+1", "a+2", "a+3", "ab"] {
        let (status, _) = app
            .post(
                "/api/v1/users",
                Some(&token),
                json!({ "username": name, "email": format!("{}@example.com", name.replace('+', "")) }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, first) = app.get("/api/v1/users?search=a%2B", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["count"], 3);
    let next = first["next"].as_str().unwrap();
    assert_eq!(next, "/api/v1/users?page=2&search=a%2B");

    let (status, second) = app.get(next, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["count"], 3);
    assert_eq!(second["results"][0]["username"], "a+3");
    assert_eq!(
        second["previous"].as_str(),
        Some("/api/v1/users?page=1&search=a%2B")
    );
}

#[tokio::test]
async fn admin_create_validates_payload() {
    let app = setup_test_app();
    let token = app.admin_token().await;

    let (status, body) = app
        .post(
            "/api/v1/users",
            Some(&token),
            json!({ "username": "admin", "email": "new@example.com", "role": "king" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("username").is_some());
    assert!(body.get("role").is_some());

    let (status, body) = app
        .post("/api/v1/users", Some(&token), json!({ "bio": "no names" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["username"][0], "This field is required.");
    assert_eq!(body["email"][0], "This field is required.");
}

#[tokio::test]
async fn admin_manages_a_single_user() {
    let app = setup_test_app();
    let token = app.admin_token().await;

    let (status, created) = app
        .post(
            "/api/v1/users",
            Some(&token),
            json!({
                "username": "target",
                "email": "target@example.com",
                "first_name": "Tar",
                "role": "moderator"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["role"], "moderator");

    let (status, fetched) = app.get("/api/v1/users/target", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, patched) = app
        .patch(
            "/api/v1/users/target",
            Some(&token),
            json!({ "role": "admin", "last_name": "Get" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["role"], "admin");
    assert_eq!(patched["last_name"], "Get");
    assert_eq!(patched["first_name"], "Tar");

    let (status, _) = app
        .request(
            Method::PUT,
            "/api/v1/users/target",
            Some(&token),
            Some(json!({ "username": "target", "email": "target@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, body) = app.delete("/api/v1/users/target", Some(&token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = app.get("/api/v1/users/target", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete("/api/v1/users/target", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_patch_with_wrong_types_is_a_field_error() {
    let app = setup_test_app();
    let token = app.admin_token().await;

    let (status, body) = app
        .patch("/api/v1/users/admin", Some(&token), json!({ "bio": ["list"] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["non_field_errors"][0].is_string());
}

#[tokio::test]
async fn admin_created_user_can_sign_in() {
    let app = setup_test_app();
    let token = app.admin_token().await;
    app.post(
        "/api/v1/users",
        Some(&token),
        json!({ "username": "invited", "email": "invited@example.com" }),
    )
    .await;

    let own = app.token_for("invited", "invited@example.com").await;
    let (status, me) = app.get("/api/v1/users/me", Some(&own)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "invited@example.com");
}
