use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::database::models::{RecurrenceType, Task, TaskCategory, TaskPriority, TaskStatus};
use crate::database::store::{OwnedStore, StoreError};
use crate::ownership::AccessError;
use crate::services::owned::{CreatePayload, OwnedResourceService, PatchPayload};
use crate::services::{FieldErrors, ServiceError};

/// Deepest parent chain walked when checking for cycles
const MAX_TASK_DEPTH: usize = 64;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub category: Option<TaskCategory>,
    pub due_date: Option<DateTime<Utc>>,
    pub reminder_date: Option<DateTime<Utc>>,
    pub estimated_duration_minutes: Option<i32>,
    pub tags: Option<Vec<String>>,
    pub attachment_urls: Option<Vec<String>>,
    pub location: Option<String>,
    pub is_recurring: Option<bool>,
    pub recurrence_type: Option<RecurrenceType>,
    pub recurrence_end_date: Option<DateTime<Utc>>,
    pub parent_task_id: Option<Uuid>,
    pub order_index: Option<i32>,
}

impl CreatePayload<Task> for CreateTask {
    fn validate(&self) -> Result<(), ServiceError> {
        let mut errors = FieldErrors::new();
        errors.require_text("title", self.title.as_deref(), "Title");
        if matches!(self.estimated_duration_minutes, Some(m) if m < 0) {
            errors.add("estimated_duration_minutes", "Duration must not be negative");
        }
        errors.into_result()
    }

    fn into_record(self, id: Uuid, owner_id: Uuid, now: DateTime<Utc>) -> Task {
        let status = self.status.unwrap_or_default();
        Task {
            id,
            owner_id,
            title: self.title.unwrap_or_default().trim().to_string(),
            description: self.description,
            status,
            priority: self.priority.unwrap_or_default(),
            category: self.category,
            due_date: self.due_date,
            reminder_date: self.reminder_date,
            completed_date: (status == TaskStatus::Completed).then_some(now),
            estimated_duration_minutes: self.estimated_duration_minutes,
            actual_duration_minutes: None,
            tags: self.tags.unwrap_or_default(),
            attachment_urls: self.attachment_urls.unwrap_or_default(),
            location: self.location,
            is_recurring: self.is_recurring.unwrap_or(false),
            recurrence_type: self.recurrence_type,
            recurrence_end_date: self.recurrence_end_date,
            parent_task_id: self.parent_task_id,
            order_index: self.order_index.unwrap_or(0),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub category: Option<TaskCategory>,
    pub due_date: Option<DateTime<Utc>>,
    pub reminder_date: Option<DateTime<Utc>>,
    pub estimated_duration_minutes: Option<i32>,
    pub actual_duration_minutes: Option<i32>,
    pub tags: Option<Vec<String>>,
    pub attachment_urls: Option<Vec<String>>,
    pub location: Option<String>,
    pub is_recurring: Option<bool>,
    pub recurrence_type: Option<RecurrenceType>,
    pub recurrence_end_date: Option<DateTime<Utc>>,
    pub parent_task_id: Option<Uuid>,
    pub order_index: Option<i32>,
}

impl PatchPayload<Task> for UpdateTask {
    fn validate(&self) -> Result<(), ServiceError> {
        let mut errors = FieldErrors::new();
        errors.non_blank("title", self.title.as_deref(), "Title");
        for (field, value) in [
            ("estimated_duration_minutes", self.estimated_duration_minutes),
            ("actual_duration_minutes", self.actual_duration_minutes),
        ] {
            if matches!(value, Some(m) if m < 0) {
                errors.add(field, "Duration must not be negative");
            }
        }
        errors.into_result()
    }

    fn apply_to(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            task.description = Some(description);
        }
        if let Some(status) = self.status {
            set_status(task, status, Utc::now());
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(category) = self.category {
            task.category = Some(category);
        }
        if let Some(due) = self.due_date {
            task.due_date = Some(due);
        }
        if let Some(reminder) = self.reminder_date {
            task.reminder_date = Some(reminder);
        }
        if let Some(minutes) = self.estimated_duration_minutes {
            task.estimated_duration_minutes = Some(minutes);
        }
        if let Some(minutes) = self.actual_duration_minutes {
            task.actual_duration_minutes = Some(minutes);
        }
        if let Some(tags) = self.tags {
            task.tags = tags;
        }
        if let Some(urls) = self.attachment_urls {
            task.attachment_urls = urls;
        }
        if let Some(location) = self.location {
            task.location = Some(location);
        }
        if let Some(recurring) = self.is_recurring {
            task.is_recurring = recurring;
        }
        if let Some(kind) = self.recurrence_type {
            task.recurrence_type = Some(kind);
        }
        if let Some(end) = self.recurrence_end_date {
            task.recurrence_end_date = Some(end);
        }
        if let Some(parent) = self.parent_task_id {
            task.parent_task_id = Some(parent);
        }
        if let Some(index) = self.order_index {
            task.order_index = index;
        }
    }
}

fn set_status(task: &mut Task, status: TaskStatus, now: DateTime<Utc>) {
    task.status = status;
    if status == TaskStatus::Completed && task.completed_date.is_none() {
        task.completed_date = Some(now);
    }
}

/// Rules that span several fields, checked on the final record
fn check_schedule(task: &Task) -> Result<(), ServiceError> {
    let mut errors = FieldErrors::new();
    if let (Some(reminder), Some(due)) = (task.reminder_date, task.due_date) {
        if reminder > due {
            errors.add("reminder_date", "Reminder date cannot be after the due date");
        }
    }
    if task.is_recurring && task.recurrence_type.is_none() {
        errors.add("recurrence_type", "Recurrence type is required for recurring tasks");
    }
    errors.into_result()
}

/// Due-date views over an owner's tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueWindow {
    /// Due on the current UTC day
    Today,
    /// Due before now and not completed
    Overdue,
    /// Due from the start of today through the next seven days
    Week,
}

impl DueWindow {
    fn contains(self, task: &Task, now: DateTime<Utc>) -> bool {
        let Some(due) = task.due_date else {
            return false;
        };
        match self {
            DueWindow::Today => due.date_naive() == now.date_naive(),
            DueWindow::Overdue => due < now && task.status != TaskStatus::Completed,
            DueWindow::Week => {
                let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
                due >= start && due < start + Duration::days(7)
            }
        }
    }
}

/// Order by `order_index`, newest first within the same index
fn in_display_order(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(|a, b| {
        a.order_index
            .cmp(&b.order_index)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    tasks
}

#[derive(Clone)]
pub struct TaskService {
    inner: OwnedResourceService<Task>,
}

impl TaskService {
    pub fn new(store: Arc<dyn OwnedStore<Task>>) -> Self {
        Self {
            inner: OwnedResourceService::new(store),
        }
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    pub async fn create(&self, owner_id: Uuid, mut payload: CreateTask) -> Result<Task, ServiceError> {
        payload.validate()?;

        if let Some(parent_id) = payload.parent_task_id {
            self.inner.get_one(parent_id, owner_id).await?;
        }

        if payload.order_index.unwrap_or(0) == 0 {
            payload.order_index = Some(self.next_order_index(owner_id).await?);
        }

        let preview = payload.clone().into_record(Uuid::nil(), owner_id, Utc::now());
        check_schedule(&preview)?;

        self.inner.create(owner_id, payload).await
    }

    pub async fn get_one(&self, id: Uuid, owner_id: Uuid) -> Result<Task, ServiceError> {
        self.inner.get_one(id, owner_id).await
    }

    /// Owner's tasks, optionally only those in `status`
    pub async fn list_all_for_owner(
        &self,
        owner_id: Uuid,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, ServiceError> {
        let tasks = match status {
            Some(status) => {
                tracing::debug!("Listing {:?} tasks for {}", status, owner_id);
                self.inner
                    .store()
                    .list_matching(owner_id, "status", json!(status))
                    .await?
            }
            None => self.inner.list_all_for_owner(owner_id).await?,
        };
        Ok(in_display_order(tasks))
    }

    /// Owner's tasks whose due date falls in `window`, earliest due first
    pub async fn due_in(&self, owner_id: Uuid, window: DueWindow, now: DateTime<Utc>) -> Result<Vec<Task>, ServiceError> {
        tracing::debug!("Listing {:?} tasks for {}", window, owner_id);
        let mut tasks: Vec<Task> = self
            .inner
            .list_all_for_owner(owner_id)
            .await?
            .into_iter()
            .filter(|task| window.contains(task, now))
            .collect();
        tasks.sort_by_key(|task| task.due_date);
        Ok(tasks)
    }

    pub async fn update(&self, id: Uuid, owner_id: Uuid, patch: UpdateTask) -> Result<Task, ServiceError> {
        tracing::debug!("Updating Task {} for {}", id, owner_id);
        let mut task = self.inner.get_one(id, owner_id).await?;
        patch.validate()?;

        if let Some(parent_id) = patch.parent_task_id {
            self.check_new_parent(id, parent_id, owner_id).await?;
        }

        patch.apply_to(&mut task);
        check_schedule(&task)?;

        let saved = self.inner.save(owner_id, task).await?;
        tracing::info!("Updated Task {}", id);
        Ok(saved)
    }

    pub async fn complete(&self, id: Uuid, owner_id: Uuid) -> Result<Task, ServiceError> {
        let mut task = self.inner.get_one(id, owner_id).await?;
        task.status = TaskStatus::Completed;
        task.completed_date = Some(Utc::now());

        let saved = self.inner.save(owner_id, task).await?;
        tracing::info!("Completed Task {}", id);
        Ok(saved)
    }

    pub async fn update_status(&self, id: Uuid, owner_id: Uuid, status: TaskStatus) -> Result<Task, ServiceError> {
        let mut task = self.inner.get_one(id, owner_id).await?;
        set_status(&mut task, status, Utc::now());

        let saved = self.inner.save(owner_id, task).await?;
        tracing::info!("Task {} status -> {:?}", id, status);
        Ok(saved)
    }

    /// Direct children of a task the requester owns
    pub async fn subtasks(&self, id: Uuid, owner_id: Uuid) -> Result<Vec<Task>, ServiceError> {
        self.inner.get_one(id, owner_id).await?;
        let children = self.children(id, owner_id).await?;
        Ok(in_display_order(children))
    }

    /// Delete a task and every task below it
    pub async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<(), ServiceError> {
        self.inner.get_one(id, owner_id).await?;

        // Collect the whole subtree first, then remove leaves before parents
        let mut subtree = vec![id];
        let mut cursor = 0;
        while cursor < subtree.len() {
            let children = self.children(subtree[cursor], owner_id).await?;
            subtree.extend(children.into_iter().map(|t| t.id));
            cursor += 1;
        }

        let store = self.inner.store();
        for task_id in subtree.iter().rev() {
            store.delete(*task_id).await?;
        }

        if subtree.len() > 1 {
            tracing::info!("Deleted Task {} with {} subtasks", id, subtree.len() - 1);
        } else {
            tracing::info!("Deleted Task {}", id);
        }
        Ok(())
    }

    pub async fn delete_all_for_owner(&self, owner_id: Uuid) -> Result<u64, ServiceError> {
        self.inner.delete_all_for_owner(owner_id).await
    }

    async fn children(&self, parent_id: Uuid, owner_id: Uuid) -> Result<Vec<Task>, ServiceError> {
        Ok(self
            .inner
            .store()
            .list_matching(owner_id, "parent_task_id", json!(parent_id))
            .await?)
    }

    async fn next_order_index(&self, owner_id: Uuid) -> Result<i32, ServiceError> {
        let tasks = self.inner.list_all_for_owner(owner_id).await?;
        let highest = tasks.iter().map(|t| t.order_index).max().unwrap_or(0);
        highest
            .checked_add(1)
            .ok_or_else(|| ServiceError::invalid("order_index", "Order index is at its maximum; set one explicitly"))
    }

    /// The new parent must be owned by the requester and must not sit below `task_id`
    async fn check_new_parent(&self, task_id: Uuid, parent_id: Uuid, owner_id: Uuid) -> Result<(), ServiceError> {
        let mut ancestor = Some(parent_id);
        let mut depth = 0;

        while let Some(current) = ancestor {
            if current == task_id || depth > MAX_TASK_DEPTH {
                let mut errors = FieldErrors::new();
                errors.add("parent_task_id", "A task cannot be its own parent or ancestor");
                return errors.into_result();
            }
            let node = match self.inner.get_one(current, owner_id).await {
                Ok(node) => node,
                // Dangling link further up the chain ends the walk
                Err(ServiceError::Access(AccessError::NotFound { .. })) if current != parent_id => break,
                Err(err) => return Err(err),
            };
            ancestor = node.parent_task_id;
            depth += 1;
        }

        Ok(())
    }
}
