#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Authentication and authorization integration tests.

mod common;

use axum::http::{StatusCode, header};
use serde_json::json;

use common::{TEST_PASSWORD, TestApp};
use prodata_kernel::models::Account;
use prodata_test_utils::test_account;

#[tokio::test]
async fn health_is_public() {
    let Some(app) = TestApp::try_new().await else {
        return;
    };

    let (status, body) = app.send_json("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], true);

    app.cleanup().await;
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let Some(app) = TestApp::try_new().await else {
        return;
    };

    for uri in ["/api/cbo", "/api/reports/data", "/api/dashboard/stats", "/api/auth/me"] {
        let response = app.send("GET", uri, None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    let response = app
        .send("GET", "/api/cbo", Some("not-a-jwt"), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    app.cleanup().await;
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let Some(app) = TestApp::try_new().await else {
        return;
    };
    app.operator_token("auth_badpass").await;

    for body in [
        json!({ "username": "auth_badpass", "password": "wrong-password" }),
        json!({ "username": "nobody", "password": TEST_PASSWORD }),
        json!({ "username": "", "password": "" }),
    ] {
        let (status, response) = app
            .send_json("POST", "/api/auth/login", None, Some(body))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(response["error"], "invalid username or password");
    }

    app.cleanup().await;
}

#[tokio::test]
async fn me_returns_account_without_hash() {
    let Some(app) = TestApp::try_new().await else {
        return;
    };
    let token = app.operator_token("auth_me").await;

    let (status, body) = app
        .send_json("GET", "/api/auth/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["username"], "auth_me");
    assert_eq!(body["role"], "operador");
    assert!(body["lastLogin"].is_string());
    assert!(body.get("passwordHash").is_none());

    app.cleanup().await;
}

#[tokio::test]
async fn account_admin_requires_admin_role() {
    let Some(app) = TestApp::try_new().await else {
        return;
    };
    let operator = app.operator_token("auth_operator").await;
    let admin = app.admin_token("auth_admin").await;

    let new_account = test_account("auth_created").to_json();

    let (status, _) = app
        .send_json("POST", "/api/users", Some(&operator), Some(new_account.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send_json("GET", "/api/audit", Some(&operator), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send_json("POST", "/api/users", Some(&admin), Some(new_account))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["username"], "auth_created");
    assert!(body.get("password").is_none());
    assert!(body.get("passwordHash").is_none());

    // The created account can log in.
    app.login("auth_created", "test-password-123").await;

    let (status, body) = app
        .send_json(
            "POST",
            "/api/users",
            Some(&admin),
            Some(test_account("auth_second_admin").admin().to_json()),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["role"], "admin");

    let (status, _) = app
        .send_json(
            "POST",
            "/api/users",
            Some(&admin),
            Some(test_account("auth_short").with_password("short").to_json()),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.cleanup().await;
}

#[tokio::test]
async fn admin_cannot_delete_self() {
    let Some(app) = TestApp::try_new().await else {
        return;
    };
    let admin = app.admin_token("auth_self").await;

    let (_, me) = app.send_json("GET", "/api/auth/me", Some(&admin), None).await;
    let id = me["id"].as_str().unwrap();

    let (status, _) = app
        .send_json("DELETE", &format!("/api/users/{id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.cleanup().await;
}

#[tokio::test]
async fn inactive_account_cannot_log_in() {
    let Some(app) = TestApp::try_new().await else {
        return;
    };
    let admin = app.admin_token("auth_deactivator").await;
    app.operator_token("auth_inactive").await;

    let (_, list) = app
        .send_json("GET", "/api/users?search=auth_inactive", Some(&admin), None)
        .await;
    let id = list["data"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send_json(
            "PUT",
            &format!("/api/users/{id}"),
            Some(&admin),
            Some(json!({ "ativo": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ativo"], false);

    let (status, _) = app
        .send_json(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "username": "auth_inactive", "password": TEST_PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    app.cleanup().await;
}

#[tokio::test]
async fn existing_tokens_follow_account_changes() {
    let Some(app) = TestApp::try_new().await else {
        return;
    };
    let boss = app.admin_token("auth_boss").await;

    sqlx::query("UPDATE users SET role = 'operador' WHERE username = 'auth_boss'")
        .execute(&app.db)
        .await
        .unwrap();

    let (status, _) = app
        .send_json(
            "POST",
            "/api/users",
            Some(&boss),
            Some(test_account("auth_after_demotion").to_json()),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Still an authenticated operator.
    let (status, _) = app.send_json("GET", "/api/cbo", Some(&boss), None).await;
    assert_eq!(status, StatusCode::OK);

    sqlx::query("UPDATE users SET active = FALSE WHERE username = 'auth_boss'")
        .execute(&app.db)
        .await
        .unwrap();

    let response = app.send("GET", "/api/cbo", Some(&boss), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

    app.cleanup().await;
}

#[tokio::test]
async fn tokens_of_deleted_accounts_are_refused() {
    let Some(app) = TestApp::try_new().await else {
        return;
    };
    let admin = app.admin_token("auth_remover").await;
    let operator = app.operator_token("auth_removed").await;

    let (_, me) = app.send_json("GET", "/api/auth/me", Some(&operator), None).await;
    let id = me["id"].as_str().unwrap();

    let response = app
        .send("DELETE", &format!("/api/users/{id}"), Some(&admin), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, _) = app
        .send_json("GET", "/api/dashboard/stats", Some(&operator), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    app.cleanup().await;
}

#[tokio::test]
async fn bootstrap_admin_is_validated_and_audited() {
    let Some(app) = TestApp::try_new().await else {
        return;
    };

    let err = Account::upsert_admin(&app.db, "root", TEST_PASSWORD, "not-an-email", "Root")
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("email"), "{err}");

    let err = Account::upsert_admin(&app.db, "root", "short", "root@example.org", "Root")
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("password"), "{err}");

    let created = Account::upsert_admin(&app.db, "root", TEST_PASSWORD, "root@example.org", "Root")
        .await
        .unwrap();
    let promoted = Account::upsert_admin(&app.db, "root", TEST_PASSWORD, "root@example.org", "Root")
        .await
        .unwrap();
    assert_eq!(created.id, promoted.id);

    let admin = app.login("root", TEST_PASSWORD).await;
    let (status, body) = app
        .send_json("GET", "/api/audit?table=users", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e["actorId"].is_null()));
    assert!(entries.iter().all(|e| e["recordId"] == created.id.to_string()));
    let actions: Vec<&str> = entries.iter().map(|e| e["action"].as_str().unwrap()).collect();
    assert!(actions.contains(&"create"));
    assert!(actions.contains(&"update"));

    app.cleanup().await;
}
