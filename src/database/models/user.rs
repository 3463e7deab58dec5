use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::store::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Stored account row. Never serialized to clients; see [`UserProfile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub profile_image_url: Option<String>,
    pub role: Role,
    pub active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            password_hash,
            first_name: None,
            last_name: None,
            phone_number: None,
            profile_image_url: None,
            role: Role::User,
            active: true,
            email_verified: false,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Table for User {
    const TABLE: &'static str = "users";
    const UPDATABLE: &'static [&'static str] = &[
        "username",
        "email",
        "password_hash",
        "first_name",
        "last_name",
        "phone_number",
        "profile_image_url",
        "role",
        "active",
        "email_verified",
        "updated_at",
    ];
    const FILTERABLE: &'static [&'static str] = &["username", "email"];
}

/// Client-facing view of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub profile_image_url: Option<String>,
    pub role: Role,
    pub active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone_number: user.phone_number,
            profile_image_url: user.profile_image_url,
            role: user.role,
            active: user.active,
            email_verified: user.email_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_never_carries_password_hash() {
        let user = User::new("alice", "alice@example.com", "$argon2id$secret".to_string());
        let json = serde_json::to_value(UserProfile::from(user)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "USER");
        assert_eq!(json["active"], true);
    }
}
