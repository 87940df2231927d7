#![cfg(feature = "e2e")]

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Result, anyhow};
use axum::http::StatusCode;
use axum_test::TestServer;
use marquee_core::{
    application::unit_of_work::AppUnitOfWork, auth::AuthCrypto, database::PostgresDatabase,
    rate_limit::InMemoryRateLimiter,
};
use marquee_server::{AppState, create_app};
use serde_json::{Value, json};
use sqlx::PgPool;

#[path = "support/mod.rs"]
mod support;

use support::{bearer, signup, test_config};

fn postgres_server(pool: PgPool) -> Result<(TestServer, AppState)> {
    let config = test_config();
    let crypto = AuthCrypto::fast(config.auth.password_pepper.as_bytes())
        .map_err(|err| anyhow!("failed to build auth crypto: {err}"))?;
    let db = Arc::new(PostgresDatabase::from_pool(pool));
    let state = AppState::new(
        config,
        AppUnitOfWork::from_postgres(&db),
        crypto,
        Arc::new(InMemoryRateLimiter::new()),
    )
    .with_postgres(db);

    let server = TestServer::builder()
        .http_transport()
        .build(create_app(state.clone()).into_make_service_with_connect_info::<SocketAddr>())
        .map_err(|err| anyhow!(err.to_string()))?;
    Ok((server, state))
}

#[sqlx::test(migrator = "marquee_core::MIGRATOR")]
async fn health_checks_the_database(pool: PgPool) -> Result<()> {
    let (server, _) = postgres_server(pool)?;

    let health = server.get("/api/health").await;
    health.assert_status_ok();
    let body: Value = health.json();
    assert_eq!(body["data"]["store"], "postgres");
    assert_eq!(body["data"]["databaseOk"], true);
    Ok(())
}

#[sqlx::test(migrator = "marquee_core::MIGRATOR")]
async fn gated_requests_do_not_rewrite_the_settings_row(pool: PgPool) -> Result<()> {
    let (server, _) = postgres_server(pool.clone())?;
    let (_, token) = signup(&server, "viewer@example.com").await?;

    server
        .get("/api/watchlist")
        .add_header("Authorization", bearer(&token))
        .await
        .assert_status_ok();
    let version_of = |pool: PgPool| async move {
        sqlx::query_scalar::<_, String>(
            "SELECT xmin::text FROM settings WHERE key = 'app_settings'",
        )
        .fetch_one(&pool)
        .await
    };
    let before = version_of(pool.clone()).await?;

    for _ in 0..3 {
        server
            .get("/api/watchlist")
            .add_header("Authorization", bearer(&token))
            .await
            .assert_status_ok();
    }
    assert_eq!(version_of(pool).await?, before);
    Ok(())
}

#[sqlx::test(migrator = "marquee_core::MIGRATOR")]
async fn heartbeats_coalesce_into_one_postgres_row(pool: PgPool) -> Result<()> {
    let (server, state) = postgres_server(pool.clone())?;
    let (user_id, token) = signup(&server, "viewer@example.com").await?;

    for current_time in [15.0, 45.0, 90.0] {
        server
            .post("/api/watch-history/playtime")
            .add_header("Authorization", bearer(&token))
            .json(&json!({
                "mediaId": 1399,
                "mediaType": "tv",
                "seasonNumber": 1,
                "episodeNumber": 4,
                "currentTime": current_time,
                "source": "vidnest"
            }))
            .await
            .assert_status(StatusCode::ACCEPTED);
    }
    state.playtime.flush_all().await?;

    let rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM watch_history WHERE user_id = $1::uuid")
            .bind(&user_id)
            .fetch_one(&pool)
            .await?;
    assert_eq!(rows, 1);

    let history = server
        .get("/api/watch-history/tv/1399")
        .add_header("Authorization", bearer(&token))
        .await;
    let body: Value = history.json();
    assert_eq!(body["data"][0]["currentTime"], 90.0);
    assert_eq!(body["data"][0]["episodeNumber"], 4);
    Ok(())
}

#[sqlx::test(migrator = "marquee_core::MIGRATOR")]
async fn explicit_source_survives_heartbeats_in_postgres(pool: PgPool) -> Result<()> {
    let (server, _) = postgres_server(pool)?;
    let (_, token) = signup(&server, "viewer@example.com").await?;

    server
        .post("/api/user/source")
        .add_header("Authorization", bearer(&token))
        .json(&json!({ "source": "vidlink", "explicit": true }))
        .await
        .assert_status_ok();
    let heartbeat = server
        .post("/api/user/source")
        .add_header("Authorization", bearer(&token))
        .json(&json!({ "source": "videasy" }))
        .await;
    let body: Value = heartbeat.json();
    assert_eq!(body["data"]["status"], "rejected");

    let resolved = server
        .get("/api/user/source")
        .add_header("Authorization", bearer(&token))
        .await;
    let body: Value = resolved.json();
    assert_eq!(body["data"]["source"], "vidlink");
    Ok(())
}

#[sqlx::test(migrator = "marquee_core::MIGRATOR")]
async fn duplicate_watchlist_rows_conflict_in_postgres(pool: PgPool) -> Result<()> {
    let (server, _) = postgres_server(pool)?;
    let (_, token) = signup(&server, "viewer@example.com").await?;
    let entry = json!({ "mediaId": 550, "mediaType": "movie", "title": "Fight Club" });

    server
        .post("/api/watchlist")
        .add_header("Authorization", bearer(&token))
        .json(&entry)
        .await
        .assert_status(StatusCode::CREATED);
    server
        .post("/api/watchlist")
        .add_header("Authorization", bearer(&token))
        .json(&entry)
        .await
        .assert_status(StatusCode::CONFLICT);
    Ok(())
}
