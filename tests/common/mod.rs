//! Shared fixtures for the integration tests: an in-memory application, token minting and
//! request helpers driving the router through `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use college_erp::{
    AppConfig, AppState, InMemoryRepository, auth, create_router,
    config::SeedAdmin,
    handlers,
    repository::RepositoryState,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const SEED_USERNAME: &str = "ADMTEST";
pub const SEED_PASSWORD: &str = "seed-pass";

/// Development config with a cheap hash cost and a seed admin.
pub fn test_config() -> AppConfig {
    AppConfig {
        password_iterations: 1_000,
        seed_admin: Some(SeedAdmin {
            username: SEED_USERNAME.to_string(),
            password: SEED_PASSWORD.to_string(),
        }),
        ..AppConfig::default()
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub repo: Arc<InMemoryRepository>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let state = AppState::new(repo.clone() as RepositoryState, config);
        handlers::bootstrap_admin(&state)
            .await
            .expect("seed admin should be created");

        Self {
            router: create_router(state.clone()),
            state,
            repo,
        }
    }

    /// A valid bearer header value for an arbitrary caller.
    pub fn bearer(&self) -> String {
        let token = auth::issue_token(
            Uuid::new_v4(),
            "caller@college.edu",
            &self.state.config.jwt_secret,
            Duration::from_secs(3600),
        )
        .unwrap();
        format!("Bearer {token}")
    }

    /// Logs the seed admin in and returns the bearer header value.
    pub async fn login(&self) -> String {
        let (status, _, body) = self
            .post(
                "/api/admin/login",
                None,
                serde_json::json!({ "username": SEED_USERNAME, "password": SEED_PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "seed login failed: {body}");
        format!("Bearer {}", body["token"].as_str().unwrap())
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        send(&self.router, request).await
    }

    pub async fn post(
        &self,
        uri: &str,
        bearer: Option<&str>,
        body: Value,
    ) -> (StatusCode, HeaderMap, Value) {
        self.send(json_request(Method::POST, uri, bearer, Some(body)))
            .await
    }

    pub async fn get(&self, uri: &str, bearer: Option<&str>) -> (StatusCode, HeaderMap, Value) {
        self.send(json_request(Method::GET, uri, bearer, None)).await
    }
}

/// Drives one request through the router and decodes the JSON body (`Null` if none).
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, body)
}

/// Builds a request from a fixed client address, optionally authenticated.
pub fn json_request(
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(value) = bearer {
        builder = builder.header(header::AUTHORIZATION, value);
    }

    let body = match body {
        Some(value) => Body::from(serde_json::to_vec(&value).unwrap()),
        None => Body::empty(),
    };

    let mut request = builder.body(body).unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 50000))));
    request
}

pub fn sample_admin() -> Value {
    serde_json::json!({
        "name": "Anita Desai",
        "email": "Anita.Desai@College.edu",
        "department": "Administration",
        "dob": "1985-07-21",
        "contactNumber": "9876543210",
        "joiningYear": "2015"
    })
}

pub fn sample_student() -> Value {
    serde_json::json!({
        "name": "Riya Sharma",
        "email": "riya@college.edu",
        "department": "Computer Science",
        "dob": "2003-04-15",
        "contactNumber": "9876543210",
        "section": "A",
        "gender": "Female",
        "batch": "2021-2025",
        "year": "3",
        "fatherName": "Raj Sharma",
        "motherName": "Meera Sharma",
        "fatherContactNumber": "9876500000",
        "motherContactNumber": "9876511111"
    })
}

pub fn sample_faculty() -> Value {
    serde_json::json!({
        "name": "Dr Kiran Rao",
        "email": "kiran.rao@college.edu",
        "department": "Physics",
        "dob": "1978-11-02",
        "contactNumber": "9000000000",
        "gender": "Male",
        "designation": "Professor",
        "joiningYear": "2008"
    })
}

pub fn sample_subject() -> Value {
    serde_json::json!({
        "subjectName": "Data Structures",
        "subjectCode": "CS201",
        "department": "Computer Science",
        "year": "2",
        "totalLectures": 40
    })
}

pub fn sample_notice() -> Value {
    serde_json::json!({
        "topic": "Mid-term schedule",
        "content": "Mid-term examinations begin on the first Monday of October.",
        "date": "2024-09-20",
        "noticeFor": "Student",
        "from": "Examination Cell"
    })
}
