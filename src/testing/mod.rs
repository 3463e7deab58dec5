//! Fixtures shared by unit tests

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::auth::TokenCodec;
use crate::database::models::{Task, TaskPriority, TaskStatus};

pub const TEST_SECRET: &str = "unit-test-secret";

pub fn codec() -> Arc<TokenCodec> {
    Arc::new(TokenCodec::new(TEST_SECRET, Duration::hours(1)).expect("test codec"))
}

/// A pending task with every optional field empty
pub fn task(owner_id: Uuid, title: &str) -> Task {
    let now = Utc::now();
    Task {
        id: Uuid::new_v4(),
        owner_id,
        title: title.to_string(),
        description: None,
        status: TaskStatus::Pending,
        priority: TaskPriority::Medium,
        category: None,
        due_date: None,
        reminder_date: None,
        completed_date: None,
        estimated_duration_minutes: None,
        actual_duration_minutes: None,
        tags: Vec::new(),
        attachment_urls: Vec::new(),
        location: None,
        is_recurring: false,
        recurrence_type: None,
        recurrence_end_date: None,
        parent_task_id: None,
        order_index: 0,
        created_at: now,
        updated_at: now,
    }
}
