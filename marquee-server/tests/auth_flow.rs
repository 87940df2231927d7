use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{Value, json};

#[path = "support/mod.rs"]
mod support;

use support::{bearer, build_test_app, signup};

#[tokio::test]
async fn first_account_is_admin_and_later_ones_are_not() -> Result<()> {
    let app = build_test_app()?;

    let first = app
        .server
        .post("/api/auth/signup")
        .json(&json!({
            "email": "  Owner@Example.com ",
            "password": "correct horse battery",
            "username": "owner"
        }))
        .await;
    first.assert_status(StatusCode::CREATED);
    let body: Value = first.json();
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["user"]["email"], "owner@example.com");
    assert_eq!(body["data"]["user"]["role"], "admin");
    assert!(body["data"]["user"].get("password_hash").is_none());

    let second = app
        .server
        .post("/api/auth/signup")
        .json(&json!({ "email": "viewer@example.com", "password": "correct horse battery" }))
        .await;
    second.assert_status(StatusCode::CREATED);
    let body: Value = second.json();
    assert_eq!(body["data"]["user"]["role"], "user");
    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() -> Result<()> {
    let app = build_test_app()?;
    signup(&app.server, "viewer@example.com").await?;

    let again = app
        .server
        .post("/api/auth/signup")
        .json(&json!({ "email": "VIEWER@example.com", "password": "another password" }))
        .await;
    again.assert_status(StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn signup_rejects_bad_input() -> Result<()> {
    let app = build_test_app()?;

    app.server
        .post("/api/auth/signup")
        .json(&json!({ "email": "not-an-email", "password": "correct horse battery" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .post("/api/auth/signup")
        .json(&json!({ "email": "viewer@example.com", "password": "short" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn login_issues_a_usable_token() -> Result<()> {
    let app = build_test_app()?;
    signup(&app.server, "viewer@example.com").await?;

    let login = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "viewer@example.com", "password": "correct horse battery" }))
        .await;
    login.assert_status_ok();
    let body: Value = login.json();
    let token = body["data"]["token"].as_str().unwrap_or_default().to_string();
    assert!(!token.is_empty());

    let me = app
        .server
        .get("/api/users/me")
        .add_header("Authorization", bearer(&token))
        .await;
    me.assert_status_ok();
    let body: Value = me.json();
    assert_eq!(body["data"]["email"], "viewer@example.com");
    Ok(())
}

#[tokio::test]
async fn login_failures_share_one_message() -> Result<()> {
    let app = build_test_app()?;
    signup(&app.server, "viewer@example.com").await?;

    let wrong_password = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "viewer@example.com", "password": "wrong password!" }))
        .await;
    wrong_password.assert_status(StatusCode::UNAUTHORIZED);
    let unknown_user = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "nobody@example.com", "password": "correct horse battery" }))
        .await;
    unknown_user.assert_status(StatusCode::UNAUTHORIZED);

    let a: Value = wrong_password.json();
    let b: Value = unknown_user.json();
    assert_eq!(a["error"], b["error"]);
    Ok(())
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() -> Result<()> {
    let app = build_test_app()?;

    app.server
        .get("/api/users/me")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .get("/api/watchlist")
        .add_header("Authorization", bearer("not-a-token"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn profile_image_accepts_http_urls_and_clears_on_null() -> Result<()> {
    let app = build_test_app()?;
    let (_, token) = signup(&app.server, "viewer@example.com").await?;

    let set = app
        .server
        .put("/api/users/me/image")
        .add_header("Authorization", bearer(&token))
        .json(&json!({ "image": "https://images.example.com/me.png" }))
        .await;
    set.assert_status_ok();
    let body: Value = set.json();
    assert_eq!(body["data"]["image"], "https://images.example.com/me.png");

    app.server
        .put("/api/users/me/image")
        .add_header("Authorization", bearer(&token))
        .json(&json!({ "image": "javascript:alert(1)" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let cleared = app
        .server
        .put("/api/users/me/image")
        .add_header("Authorization", bearer(&token))
        .json(&json!({ "image": null }))
        .await;
    cleared.assert_status_ok();
    let body: Value = cleared.json();
    assert!(body["data"]["image"].is_null());
    Ok(())
}
