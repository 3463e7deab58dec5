use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::Note;
use crate::services::owned::{CreatePayload, OwnedResourceService, PatchPayload};
use crate::services::{FieldErrors, ServiceError};

pub type NoteService = OwnedResourceService<Note>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateNote {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_uri: Option<String>,
}

impl CreatePayload<Note> for CreateNote {
    fn validate(&self) -> Result<(), ServiceError> {
        let mut errors = FieldErrors::new();
        errors.require_text("title", self.title.as_deref(), "Title");
        errors.into_result()
    }

    fn into_record(self, id: Uuid, owner_id: Uuid, now: DateTime<Utc>) -> Note {
        Note {
            id,
            owner_id,
            title: self.title.unwrap_or_default().trim().to_string(),
            description: self.description,
            image_uri: self.image_uri,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNote {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_uri: Option<String>,
}

impl PatchPayload<Note> for UpdateNote {
    fn validate(&self) -> Result<(), ServiceError> {
        let mut errors = FieldErrors::new();
        errors.non_blank("title", self.title.as_deref(), "Title");
        errors.into_result()
    }

    fn apply_to(self, note: &mut Note) {
        if let Some(title) = self.title {
            note.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            note.description = Some(description);
        }
        if let Some(image_uri) = self.image_uri {
            note.image_uri = Some(image_uri);
        }
    }
}
