mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn register_login_and_profile() -> Result<()> {
    let stack = common::full_stack().await?;
    let alice = common::sign_up(&stack, "Alice@Example.com", "pw-alice").await?;

    let resp = stack
        .client
        .get(stack.gateway("/api/users/me"))
        .bearer_auth(&alice.token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let me: Value = resp.json().await?;
    assert_eq!(me["email"], "alice@example.com");
    assert_eq!(me["username"], "Alice");
    assert!(me.get("password_hash").is_none());

    let resp = stack
        .client
        .post(stack.gateway("/api/auth/register"))
        .json(&json!({ "email": "alice@example.com", "password": "again" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = stack
        .client
        .post(stack.gateway("/api/auth/login"))
        .json(&json!({ "username_or_email": "alice@example.com", "password": "wrong" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await?;
    assert_eq!(body["message"], "Invalid credentials");
    Ok(())
}

#[tokio::test]
async fn other_profiles_are_forbidden() -> Result<()> {
    let stack = common::full_stack().await?;
    let alice = common::sign_up(&stack, "alice@example.com", "pw-alice").await?;
    let bob = common::sign_up(&stack, "bob@example.com", "pw-bob").await?;

    let resp = stack
        .client
        .get(stack.gateway(&format!("/api/users/{}", alice.user_id)))
        .bearer_auth(&bob.token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = stack
        .client
        .get(stack.gateway(&format!("/api/users/{}", alice.user_id)))
        .bearer_auth(&alice.token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn preferences_default_then_update() -> Result<()> {
    let stack = common::full_stack().await?;
    let alice = common::sign_up(&stack, "alice@example.com", "pw-alice").await?;
    let url = stack.gateway("/api/users/me/preferences");

    let resp = stack.client.get(&url).bearer_auth(&alice.token).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let prefs: Value = resp.json().await?;
    assert_eq!(prefs["theme"], "LIGHT");
    assert_eq!(prefs["owner_id"], alice.user_id.as_str());

    let resp = stack
        .client
        .put(&url)
        .bearer_auth(&alice.token)
        .json(&json!({ "theme": "DARK", "language": "EN" }))
        .send()
        .await?;
    let prefs: Value = resp.json().await?;
    assert_eq!(prefs["theme"], "DARK");
    assert_eq!(prefs["language"], "EN");
    Ok(())
}

#[tokio::test]
async fn account_deletion_purges_owned_data() -> Result<()> {
    let stack = common::full_stack().await?;
    let alice = common::sign_up(&stack, "alice@example.com", "pw-alice").await?;

    for title in ["a", "b"] {
        let resp = stack
            .client
            .post(stack.gateway("/api/notes"))
            .bearer_auth(&alice.token)
            .json(&json!({ "title": title }))
            .send()
            .await?;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let resp = stack
        .client
        .delete(stack.gateway("/api/users/me"))
        .bearer_auth(&alice.token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let report: Value = resp.json().await?;
    assert_eq!(report["deleted"]["notes"], 2);
    assert_eq!(report["deleted"]["tasks"], 0);

    // The token is still valid, but nothing is left behind it
    let resp = stack
        .client
        .get(stack.gateway("/api/notes"))
        .bearer_auth(&alice.token)
        .send()
        .await?;
    let notes: Vec<Value> = resp.json().await?;
    assert!(notes.is_empty());

    let resp = stack
        .client
        .get(stack.gateway("/api/users/me"))
        .bearer_auth(&alice.token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = stack
        .client
        .post(stack.gateway("/api/auth/login"))
        .json(&json!({ "username_or_email": "alice", "password": "pw-alice" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
