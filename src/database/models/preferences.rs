use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::store::Table;
use crate::ownership::OwnedRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    #[default]
    Es,
    En,
}

/// Per-user settings, one row per user, owned by that user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub theme: Theme,
    pub language: Language,
    pub notifications_enabled: bool,
    pub email_notifications: bool,
    pub push_notifications: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserPreferences {
    pub fn defaults_for(owner_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            theme: Theme::default(),
            language: Language::default(),
            notifications_enabled: true,
            email_notifications: true,
            push_notifications: true,
            created_at: now,
            updated_at: now,
        }
    }
}

impl OwnedRecord for UserPreferences {
    const KIND: &'static str = "UserPreferences";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Table for UserPreferences {
    const TABLE: &'static str = "user_preferences";
    const UPDATABLE: &'static [&'static str] = &[
        "theme",
        "language",
        "notifications_enabled",
        "email_notifications",
        "push_notifications",
        "updated_at",
    ];
    const FILTERABLE: &'static [&'static str] = &[];
}
