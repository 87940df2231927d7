use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{Value, json};

#[path = "support/mod.rs"]
mod support;

use support::{bearer, build_test_app, signup};

#[tokio::test]
async fn admin_routes_are_closed_to_regular_users() -> Result<()> {
    let app = build_test_app()?;
    let (_, _admin) = signup(&app.server, "owner@example.com").await?;
    let (_, viewer) = signup(&app.server, "viewer@example.com").await?;

    app.server
        .get("/api/admin/users")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    let forbidden = app
        .server
        .get("/api/admin/users")
        .add_header("Authorization", bearer(&viewer))
        .await;
    forbidden.assert_status(StatusCode::FORBIDDEN);
    let body: Value = forbidden.json();
    assert_eq!(body["error"], "Admin access required");
    Ok(())
}

#[tokio::test]
async fn admins_manage_roles_but_not_their_own() -> Result<()> {
    let app = build_test_app()?;
    let (admin_id, admin) = signup(&app.server, "owner@example.com").await?;
    let (viewer_id, viewer) = signup(&app.server, "viewer@example.com").await?;

    let users = app
        .server
        .get("/api/admin/users")
        .add_header("Authorization", bearer(&admin))
        .await;
    users.assert_status_ok();
    let body: Value = users.json();
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));

    app.server
        .patch(&format!("/api/admin/users/{admin_id}/role"))
        .add_header("Authorization", bearer(&admin))
        .json(&json!({ "role": "user" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .patch(&format!("/api/admin/users/{viewer_id}/role"))
        .add_header("Authorization", bearer(&admin))
        .json(&json!({ "role": "superuser" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let promoted = app
        .server
        .patch(&format!("/api/admin/users/{viewer_id}/role"))
        .add_header("Authorization", bearer(&admin))
        .json(&json!({ "role": "admin" }))
        .await;
    promoted.assert_status_ok();
    let body: Value = promoted.json();
    assert_eq!(body["data"]["role"], "admin");

    // The role is read per request, so the existing token picks it up.
    app.server
        .get("/api/admin/users")
        .add_header("Authorization", bearer(&viewer))
        .await
        .assert_status_ok();
    Ok(())
}

#[tokio::test]
async fn deleting_a_user_revokes_their_token() -> Result<()> {
    let app = build_test_app()?;
    let (admin_id, admin) = signup(&app.server, "owner@example.com").await?;
    let (viewer_id, viewer) = signup(&app.server, "viewer@example.com").await?;

    app.server
        .delete(&format!("/api/admin/users/{admin_id}"))
        .add_header("Authorization", bearer(&admin))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .delete(&format!("/api/admin/users/{viewer_id}"))
        .add_header("Authorization", bearer(&admin))
        .await
        .assert_status_ok();
    app.server
        .delete(&format!("/api/admin/users/{viewer_id}"))
        .add_header("Authorization", bearer(&admin))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    app.server
        .get("/api/users/me")
        .add_header("Authorization", bearer(&viewer))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn maintenance_mode_blocks_users_but_not_admins() -> Result<()> {
    let app = build_test_app()?;
    let (_, admin) = signup(&app.server, "owner@example.com").await?;
    let (_, viewer) = signup(&app.server, "viewer@example.com").await?;

    app.server
        .put("/api/admin/maintenance")
        .add_header("Authorization", bearer(&admin))
        .json(&json!({ "enabled": true, "message": "  Upgrading storage  " }))
        .await
        .assert_status_ok();

    let status = app.server.get("/api/settings/maintenance").await;
    status.assert_status_ok();
    let body: Value = status.json();
    assert_eq!(body["data"]["maintenanceMode"], true);
    assert_eq!(body["data"]["maintenanceMessage"], "Upgrading storage");

    let blocked = app
        .server
        .get("/api/watchlist")
        .add_header("Authorization", bearer(&viewer))
        .await;
    blocked.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = blocked.json();
    assert_eq!(body["error"], "Upgrading storage");

    app.server
        .get("/api/watchlist")
        .add_header("Authorization", bearer(&admin))
        .await
        .assert_status_ok();

    // Sign-in and health stay reachable so an admin can get back in.
    app.server
        .post("/api/auth/login")
        .json(&json!({ "email": "owner@example.com", "password": "correct horse battery" }))
        .await
        .assert_status_ok();
    app.server.get("/api/health").await.assert_status_ok();

    app.server
        .put("/api/admin/maintenance")
        .add_header("Authorization", bearer(&admin))
        .json(&json!({ "enabled": false }))
        .await
        .assert_status_ok();
    app.server
        .get("/api/watchlist")
        .add_header("Authorization", bearer(&viewer))
        .await
        .assert_status_ok();
    Ok(())
}

#[tokio::test]
async fn maintenance_without_a_message_uses_the_default() -> Result<()> {
    let app = build_test_app()?;
    let (_, admin) = signup(&app.server, "owner@example.com").await?;

    app.server
        .put("/api/admin/maintenance")
        .add_header("Authorization", bearer(&admin))
        .json(&json!({ "enabled": true, "message": "   " }))
        .await
        .assert_status_ok();

    let blocked = app.server.get("/api/sources").await;
    blocked.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = blocked.json();
    assert_eq!(
        body["error"],
        "Marquee is down for maintenance. Please check back soon."
    );
    Ok(())
}

#[tokio::test]
async fn visits_are_logged_and_listed_for_admins() -> Result<()> {
    let app = build_test_app()?;
    let (admin_id, admin) = signup(&app.server, "owner@example.com").await?;

    let anonymous = app
        .server
        .post("/api/visitors/log")
        .add_header(
            "User-Agent",
            "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0",
        )
        .json(&json!({ "url": "/movie/603", "referer": "https://search.example.com" }))
        .await;
    anonymous.assert_status_ok();
    let body: Value = anonymous.json();
    assert_eq!(body["data"]["logged"], true);

    app.server
        .post("/api/visitors/log")
        .add_header("Authorization", bearer(&admin))
        .text("definitely not json")
        .await
        .assert_status_ok();

    let page = app
        .server
        .get("/api/admin/visitors")
        .add_query_param("limit", 10)
        .add_header("Authorization", bearer(&admin))
        .await;
    page.assert_status_ok();
    let body: Value = page.json();
    assert_eq!(body["data"]["total"], 2);
    let items = body["data"]["items"].as_array().cloned().unwrap_or_default();
    assert_eq!(items.len(), 2);
    assert!(
        items
            .iter()
            .any(|item| item["userId"].as_str() == Some(admin_id.as_str()))
    );
    assert!(
        items
            .iter()
            .any(|item| item["url"] == "/movie/603" && item["ip"] == "127.0.0.1")
    );

    let cleared = app
        .server
        .delete("/api/admin/visitors")
        .add_header("Authorization", bearer(&admin))
        .await;
    cleared.assert_status_ok();
    let body: Value = cleared.json();
    assert_eq!(body["data"]["deleted"], 2);
    Ok(())
}

#[tokio::test]
async fn playtime_queue_status_reports_depth() -> Result<()> {
    let app = build_test_app()?;
    let (_, admin) = signup(&app.server, "owner@example.com").await?;

    app.server
        .post("/api/watch-history/playtime")
        .add_header("Authorization", bearer(&admin))
        .json(&json!({ "mediaId": 603, "mediaType": "movie", "currentTime": 5.0 }))
        .await
        .assert_status(StatusCode::ACCEPTED);

    let status = app
        .server
        .get("/api/admin/playtime/queue")
        .add_header("Authorization", bearer(&admin))
        .await;
    status.assert_status_ok();
    let body: Value = status.json();
    assert_eq!(body["data"]["queueDepth"], 1);
    assert!(body["data"]["maxBatch"].as_u64().unwrap_or_default() >= 1);
    Ok(())
}
