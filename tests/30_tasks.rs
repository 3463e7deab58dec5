mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn create_task(stack: &common::Stack, token: &str, body: Value) -> Result<Value> {
    let resp = stack
        .client
        .post(stack.gateway("/api/tasks"))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await?;
    anyhow::ensure!(resp.status() == StatusCode::CREATED, "create returned {}", resp.status());
    Ok(resp.json().await?)
}

fn id(task: &Value) -> String {
    task["id"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn task_lifecycle() -> Result<()> {
    let stack = common::full_stack().await?;
    let alice = common::sign_up(&stack, "alice@example.com", "pw-alice").await?;

    let parent = create_task(&stack, &alice.token, json!({ "title": "Move house", "priority": "HIGH" })).await?;
    assert_eq!(parent["status"], "PENDING");
    assert_eq!(parent["priority"], "HIGH");

    let child = create_task(
        &stack,
        &alice.token,
        json!({ "title": "Pack books", "parent_task_id": id(&parent) }),
    )
    .await?;

    let resp = stack
        .client
        .get(stack.gateway(&format!("/api/tasks/{}/subtasks", id(&parent))))
        .bearer_auth(&alice.token)
        .send()
        .await?;
    let subtasks: Vec<Value> = resp.json().await?;
    assert_eq!(subtasks.len(), 1);
    assert_eq!(subtasks[0]["id"], child["id"]);

    let resp = stack
        .client
        .put(stack.gateway(&format!("/api/tasks/{}/complete", id(&child))))
        .bearer_auth(&alice.token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let done: Value = resp.json().await?;
    assert_eq!(done["status"], "COMPLETED");
    assert!(done["completed_date"].is_string());

    let resp = stack
        .client
        .put(stack.gateway(&format!("/api/tasks/{}/status?status=IN_PROGRESS", id(&parent))))
        .bearer_auth(&alice.token)
        .send()
        .await?;
    let moved: Value = resp.json().await?;
    assert_eq!(moved["status"], "IN_PROGRESS");

    let resp = stack
        .client
        .get(stack.gateway("/api/tasks?status=COMPLETED"))
        .bearer_auth(&alice.token)
        .send()
        .await?;
    let completed: Vec<Value> = resp.json().await?;
    assert_eq!(completed.len(), 1);

    // Deleting the parent takes the subtask with it
    let resp = stack
        .client
        .delete(stack.gateway(&format!("/api/tasks/{}", id(&parent))))
        .bearer_auth(&alice.token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = stack
        .client
        .get(stack.gateway(&format!("/api/tasks/{}", id(&child))))
        .bearer_auth(&alice.token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn foreign_parent_is_rejected() -> Result<()> {
    let stack = common::full_stack().await?;
    let alice = common::sign_up(&stack, "alice@example.com", "pw-alice").await?;
    let bob = common::sign_up(&stack, "bob@example.com", "pw-bob").await?;

    let parent = create_task(&stack, &alice.token, json!({ "title": "Alice's" })).await?;

    let resp = stack
        .client
        .post(stack.gateway("/api/tasks"))
        .bearer_auth(&bob.token)
        .json(&json!({ "title": "Sneaky", "parent_task_id": id(&parent) }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn bulk_delete_reports_count() -> Result<()> {
    let stack = common::full_stack().await?;
    let alice = common::sign_up(&stack, "alice@example.com", "pw-alice").await?;

    create_task(&stack, &alice.token, json!({ "title": "one" })).await?;
    create_task(&stack, &alice.token, json!({ "title": "two" })).await?;

    let resp = stack
        .client
        .delete(stack.gateway("/api/tasks"))
        .bearer_auth(&alice.token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await?;
    assert_eq!(body["deleted"], 2);
    Ok(())
}
