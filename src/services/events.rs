use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::Event;
use crate::services::owned::{CreatePayload, OwnedResourceService, PatchPayload};
use crate::services::{FieldErrors, ServiceError};

pub type EventService = OwnedResourceService<Event>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateEvent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_timestamp: Option<DateTime<Utc>>,
    pub location: Option<String>,
}

impl CreatePayload<Event> for CreateEvent {
    fn validate(&self) -> Result<(), ServiceError> {
        let mut errors = FieldErrors::new();
        errors.require_text("title", self.title.as_deref(), "Title");
        if self.event_timestamp.is_none() {
            errors.add("event_timestamp", "Event timestamp is required");
        }
        errors.into_result()
    }

    fn into_record(self, id: Uuid, owner_id: Uuid, now: DateTime<Utc>) -> Event {
        Event {
            id,
            owner_id,
            title: self.title.unwrap_or_default().trim().to_string(),
            description: self.description,
            // validate() guarantees presence
            event_timestamp: self.event_timestamp.unwrap_or(now),
            location: self.location,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEvent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_timestamp: Option<DateTime<Utc>>,
    pub location: Option<String>,
}

impl PatchPayload<Event> for UpdateEvent {
    fn validate(&self) -> Result<(), ServiceError> {
        let mut errors = FieldErrors::new();
        errors.non_blank("title", self.title.as_deref(), "Title");
        errors.into_result()
    }

    fn apply_to(self, event: &mut Event) {
        if let Some(title) = self.title {
            event.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            event.description = Some(description);
        }
        if let Some(at) = self.event_timestamp {
            event.event_timestamp = at;
        }
        if let Some(location) = self.location {
            event.location = Some(location);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::ownership::AccessError;
    use chrono::Duration;
    use std::sync::Arc;

    fn service() -> EventService {
        EventService::new(Arc::new(MemoryStore::<Event>::new()))
    }

    #[tokio::test]
    async fn title_and_timestamp_are_required() {
        let err = service()
            .create(Uuid::new_v4(), CreateEvent::default())
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation { field_errors, .. } => {
                assert!(field_errors.contains_key("title"));
                assert!(field_errors.contains_key("event_timestamp"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn events_are_isolated_per_owner() {
        let service = service();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let at = Utc::now() + Duration::days(3);

        let event = service
            .create(
                alice,
                CreateEvent {
                    title: Some("Dentist".to_string()),
                    event_timestamp: Some(at),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(event.event_timestamp, at);

        assert!(service.list_all_for_owner(bob).await.unwrap().is_empty());
        assert!(matches!(
            service.delete(event.id, bob).await,
            Err(ServiceError::Access(AccessError::Unauthorized { .. }))
        ));

        let moved = service
            .update(
                event.id,
                alice,
                UpdateEvent {
                    location: Some("Clinic".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.location.as_deref(), Some("Clinic"));

        service.delete(event.id, alice).await.unwrap();
        assert!(matches!(
            service.get_one(event.id, alice).await,
            Err(ServiceError::Access(AccessError::NotFound { .. }))
        ));
    }
}
