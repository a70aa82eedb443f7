#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use yamdb_auth::{
    app::build_app,
    config::AppConfig,
    mail::{Mailer, MemoryMailer, OutgoingMail},
    state::AppState,
    users::{
        memory::MemoryUserRepo,
        model::{NewUser, Role},
        repo::UserRepo,
    },
};

/// Records mail like `MemoryMailer`, but can be switched off to simulate an outage.
#[derive(Default)]
pub struct FlakyMailer {
    down: AtomicBool,
    pub inner: MemoryMailer,
}

impl FlakyMailer {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for FlakyMailer {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        if self.down.load(Ordering::SeqCst) {
            anyhow::bail!("mail API unreachable");
        }
        self.inner.send(mail).await
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub users: Arc<MemoryUserRepo>,
    pub mail: Arc<FlakyMailer>,
}

pub fn setup_test_app() -> TestApp {
    let users = Arc::new(MemoryUserRepo::new());
    let mail = Arc::new(FlakyMailer::default());
    let state = AppState::from_parts(
        users.clone(),
        mail.clone(),
        Arc::new(AppConfig::for_tests()),
    );
    TestApp {
        router: build_app(state.clone()),
        state,
        users,
        mail,
    }
}

impl TestApp {
    pub fn mailer(&self) -> &MemoryMailer {
        &self.mail.inner
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).unwrap()).await
    }

    /// Posts `body` verbatim, with an optional content type.
    pub async fn post_raw(
        &self,
        uri: &str,
        content_type: Option<&str>,
        body: &str,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(Method::POST).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }

    pub async fn sign_up(&self, username: &str, email: &str) -> (StatusCode, Value) {
        self.post(
            "/api/v1/auth/signup",
            None,
            serde_json::json!({ "username": username, "email": email }),
        )
        .await
    }

    pub async fn exchange(&self, username: &str, code: &str) -> (StatusCode, Value) {
        self.post(
            "/api/v1/auth/token",
            None,
            serde_json::json!({ "username": username, "confirmation_code": code }),
        )
        .await
    }

    /// Full sign-up → mailed code → token round.
    pub async fn token_for(&self, username: &str, email: &str) -> String {
        let (status, body) = self.sign_up(username, email).await;
        assert_eq!(status, StatusCode::OK, "sign-up failed: {body}");
        let code = self.mailer().last_code_for(email).expect("code mailed");
        let (status, body) = self.exchange(username, &code).await;
        assert_eq!(status, StatusCode::OK, "token exchange failed: {body}");
        body["token"].as_str().expect("token in body").to_string()
    }

    /// Seeds a user with the given role, then signs it in.
    pub async fn token_with_role(&self, username: &str, role: Role, superuser: bool) -> String {
        let email = format!("{username}@example.com");
        self.users
            .create(NewUser {
                role,
                is_superuser: superuser,
                ..NewUser::new(username, email.as_str())
            })
            .await
            .unwrap();
        self.token_for(username, &email).await
    }

    pub async fn admin_token(&self) -> String {
        self.token_with_role("admin", Role::Admin, false).await
    }
}
