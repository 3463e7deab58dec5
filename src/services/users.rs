use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::{Identity, TokenCodec};
use crate::database::models::preferences::{Language, Theme};
use crate::database::models::{User, UserPreferences, UserProfile};
use crate::database::store::{OwnedStore, StoreError};
use crate::database::users::UserStore;
use crate::ownership::{authorize, AccessError};
use crate::services::clients::{purge_everywhere, OwnedDataClient, PurgeReport};
use crate::services::owned::{OwnedResourceService, PatchPayload};
use crate::services::{FieldErrors, ServiceError};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "username", alias = "email")]
    pub username_or_email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfile {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangePassword {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePreferences {
    pub theme: Option<Theme>,
    pub language: Option<Language>,
    pub notifications_enabled: Option<bool>,
    pub email_notifications: Option<bool>,
    pub push_notifications: Option<bool>,
}

impl PatchPayload<UserPreferences> for UpdatePreferences {
    fn validate(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    fn apply_to(self, prefs: &mut UserPreferences) {
        if let Some(theme) = self.theme {
            prefs.theme = theme;
        }
        if let Some(language) = self.language {
            prefs.language = language;
        }
        if let Some(flag) = self.notifications_enabled {
            prefs.notifications_enabled = flag;
        }
        if let Some(flag) = self.email_notifications {
            prefs.email_notifications = flag;
        }
        if let Some(flag) = self.push_notifications {
            prefs.push_notifications = flag;
        }
    }
}

fn hashed(password: &str) -> Result<String, ServiceError> {
    hash_password(password).map_err(ServiceError::Password)
}

/// Username used when registration omits one
fn default_username(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    preferences: OwnedResourceService<UserPreferences>,
    codec: Arc<TokenCodec>,
    owned_data: Vec<Arc<dyn OwnedDataClient>>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserStore>,
        preferences: Arc<dyn OwnedStore<UserPreferences>>,
        codec: Arc<TokenCodec>,
        owned_data: Vec<Arc<dyn OwnedDataClient>>,
    ) -> Self {
        Self {
            users,
            preferences: OwnedResourceService::new(preferences),
            codec,
            owned_data,
        }
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.users.ping().await
    }

    pub async fn register(&self, payload: RegisterUser) -> Result<UserProfile, ServiceError> {
        let mut errors = FieldErrors::new();
        errors.require_text("email", payload.email.as_deref(), "Email");
        errors.require_text("password", payload.password.as_deref(), "Password");
        errors.non_blank("username", payload.username.as_deref(), "Username");
        errors.into_result()?;

        let raw_email = payload.email.unwrap_or_default();
        let username = payload
            .username
            .map(|u| u.trim().to_string())
            .unwrap_or_else(|| default_username(raw_email.trim()));
        let email = raw_email.trim().to_lowercase();

        if self.users.find_by_username(&username).await?.is_some() {
            return Err(ServiceError::Conflict(format!("Username '{}' is already taken", username)));
        }
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict(format!("Email '{}' is already registered", email)));
        }

        let mut user = User::new(username, email, hashed(&payload.password.unwrap_or_default())?);
        user.first_name = payload.first_name;
        user.last_name = payload.last_name;
        user.phone_number = payload.phone_number;

        let user = self.users.insert(user).await?;
        tracing::info!("Registered user {} ({})", user.username, user.id);
        Ok(user.into())
    }

    pub async fn login(&self, payload: LoginRequest) -> Result<LoginResponse, ServiceError> {
        let mut errors = FieldErrors::new();
        errors.require_text("username_or_email", payload.username_or_email.as_deref(), "Username or email");
        errors.require_text("password", payload.password.as_deref(), "Password");
        errors.into_result()?;

        let login = payload.username_or_email.unwrap_or_default();
        let login = login.trim();
        let password = payload.password.unwrap_or_default();

        let found = match self.users.find_by_username(login).await? {
            Some(user) => Some(user),
            None if login.contains('@') => self.users.find_by_email(login).await?,
            None => None,
        };

        let user = match found {
            Some(user) if user.active => user,
            Some(user) => {
                tracing::warn!("Login refused for inactive user {}", user.id);
                return Err(ServiceError::InvalidCredentials);
            }
            None => {
                tracing::warn!("Login refused for unknown user");
                return Err(ServiceError::InvalidCredentials);
            }
        };

        if !verify_password(&password, &user.password_hash).map_err(ServiceError::Password)? {
            tracing::warn!("Login refused for {}: wrong password", user.id);
            return Err(ServiceError::InvalidCredentials);
        }

        let token = self.codec.issue(&Identity {
            user_id: user.id,
            username: user.username.clone(),
        })?;

        tracing::info!("User {} logged in", user.id);
        Ok(LoginResponse {
            token,
            token_type: "Bearer",
            expires_in: self.codec.ttl().num_seconds(),
            user: user.into(),
        })
    }

    async fn current(&self, user_id: Uuid) -> Result<User, ServiceError> {
        self.users
            .find(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User not found with id: {}", user_id)))
    }

    pub async fn me(&self, user_id: Uuid) -> Result<UserProfile, ServiceError> {
        Ok(self.current(user_id).await?.into())
    }

    /// Another user's profile is never visible; only the requester themself
    pub async fn get_by_id(&self, id: Uuid, requester_id: Uuid) -> Result<UserProfile, ServiceError> {
        let user = self
            .users
            .find(id)
            .await?
            .ok_or(AccessError::NotFound { kind: "User", id })?;

        authorize(user.id, requester_id).map_err(|_| {
            tracing::warn!("Unauthorized access to User {} by {}", id, requester_id);
            AccessError::Unauthorized { kind: "User", id }
        })?;

        Ok(user.into())
    }

    pub async fn update_me(&self, user_id: Uuid, patch: UpdateProfile) -> Result<UserProfile, ServiceError> {
        let mut errors = FieldErrors::new();
        errors.non_blank("username", patch.username.as_deref(), "Username");
        errors.non_blank("email", patch.email.as_deref(), "Email");
        errors.into_result()?;

        let mut user = self.current(user_id).await?;

        if let Some(username) = patch.username.map(|u| u.trim().to_string()) {
            if username != user.username {
                if self.users.find_by_username(&username).await?.is_some() {
                    return Err(ServiceError::Conflict(format!("Username '{}' is already taken", username)));
                }
                user.username = username;
            }
        }
        if let Some(email) = patch.email.map(|e| e.trim().to_lowercase()) {
            if email != user.email {
                if self.users.find_by_email(&email).await?.is_some() {
                    return Err(ServiceError::Conflict(format!("Email '{}' is already registered", email)));
                }
                user.email = email;
                user.email_verified = false;
            }
        }
        if let Some(v) = patch.first_name {
            user.first_name = Some(v);
        }
        if let Some(v) = patch.last_name {
            user.last_name = Some(v);
        }
        if let Some(v) = patch.phone_number {
            user.phone_number = Some(v);
        }
        if let Some(v) = patch.profile_image_url {
            user.profile_image_url = Some(v);
        }

        user.updated_at = Utc::now();
        let user = self.users.update(user).await?;
        tracing::info!("Updated profile of {}", user_id);
        Ok(user.into())
    }

    pub async fn change_password(&self, user_id: Uuid, payload: ChangePassword) -> Result<(), ServiceError> {
        let mut errors = FieldErrors::new();
        errors.require_text("current_password", payload.current_password.as_deref(), "Current password");
        errors.require_text("new_password", payload.new_password.as_deref(), "New password");
        errors.into_result()?;

        let mut user = self.current(user_id).await?;
        let current = payload.current_password.unwrap_or_default();
        if !verify_password(&current, &user.password_hash).map_err(ServiceError::Password)? {
            let mut errors = FieldErrors::new();
            errors.add("current_password", "Current password is incorrect");
            return errors.into_result();
        }

        user.password_hash = hashed(&payload.new_password.unwrap_or_default())?;
        user.updated_at = Utc::now();
        self.users.update(user).await?;
        tracing::info!("Password changed for {}", user_id);
        Ok(())
    }

    pub async fn deactivate(&self, user_id: Uuid) -> Result<UserProfile, ServiceError> {
        let mut user = self.current(user_id).await?;
        user.active = false;
        user.updated_at = Utc::now();
        let user = self.users.update(user).await?;
        tracing::info!("Deactivated {}", user_id);
        Ok(user.into())
    }

    /// Purge the user's data from every resource service, then remove the account.
    /// The account stays when any service could not be purged.
    pub async fn delete_account(&self, user_id: Uuid) -> Result<PurgeReport, ServiceError> {
        self.current(user_id).await?;

        let report = purge_everywhere(&self.owned_data, user_id).await.into_result()?;

        self.preferences.delete_all_for_owner(user_id).await?;
        self.users.delete(user_id).await?;
        tracing::info!("Deleted account {}", user_id);
        Ok(report)
    }

    /// The user's preferences, created with defaults on first access
    pub async fn preferences(&self, user_id: Uuid) -> Result<UserPreferences, ServiceError> {
        self.current(user_id).await?;

        if let Some(existing) = self.preferences.list_all_for_owner(user_id).await?.into_iter().next() {
            return Ok(existing);
        }

        let defaults = UserPreferences::defaults_for(user_id, Utc::now());
        match self.preferences.store().insert(defaults).await {
            Ok(created) => {
                tracing::info!("Created default preferences for {}", user_id);
                Ok(created)
            }
            // A concurrent first read won the insert
            Err(StoreError::Duplicate(_)) => self
                .preferences
                .list_all_for_owner(user_id)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| ServiceError::NotFound("Preferences not found".to_string())),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn update_preferences(
        &self,
        user_id: Uuid,
        patch: UpdatePreferences,
    ) -> Result<UserPreferences, ServiceError> {
        let prefs = self.preferences(user_id).await?;
        self.preferences.update(prefs.id, user_id, patch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryStore, MemoryUserStore};
    use crate::services::clients::ClientError;
    use crate::testing;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClient {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl OwnedDataClient for CountingClient {
        fn service(&self) -> crate::types::ServiceKind {
            crate::types::ServiceKind::Notes
        }

        async fn purge_owner(&self, _owner_id: Uuid) -> Result<u64, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ClientError::Status {
                    service: crate::types::ServiceKind::Notes,
                    status: 500,
                })
            } else {
                Ok(2)
            }
        }
    }

    fn service_with(clients: Vec<Arc<dyn OwnedDataClient>>) -> UserService {
        UserService::new(
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryStore::<UserPreferences>::new()),
            testing::codec(),
            clients,
        )
    }

    fn service() -> UserService {
        service_with(Vec::new())
    }

    fn registration(email: &str, password: &str) -> RegisterUser {
        RegisterUser {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            ..Default::default()
        }
    }

    fn login(who: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username_or_email: Some(who.to_string()),
            password: Some(password.to_string()),
        }
    }

    #[tokio::test]
    async fn register_defaults_username_and_rejects_duplicates() {
        let service = service();
        let profile = service.register(registration("Alice@Example.com", "pw-123456")).await.unwrap();
        assert_eq!(profile.username, "Alice");
        assert_eq!(profile.email, "alice@example.com");

        let dup_email = service.register(registration("alice@example.com", "x")).await.unwrap_err();
        assert!(matches!(dup_email, ServiceError::Conflict(_)));

        let dup_name = RegisterUser {
            username: Some("Alice".to_string()),
            ..registration("other@example.com", "x")
        };
        assert!(matches!(service.register(dup_name).await, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn login_issues_verifiable_token() {
        let service = service();
        let profile = service.register(registration("bob@example.com", "hunter22")).await.unwrap();

        let by_name = service.login(login("bob", "hunter22")).await.unwrap();
        let claims = testing::codec().verify(&by_name.token).unwrap();
        assert_eq!(claims.sub, "bob");
        assert_eq!(claims.user_uuid(), Some(profile.id));
        assert_eq!(by_name.token_type, "Bearer");

        assert!(service.login(login("BOB@example.com", "hunter22")).await.is_ok());
    }

    #[tokio::test]
    async fn bad_credentials_are_indistinguishable() {
        let service = service();
        let profile = service.register(registration("carol@example.com", "right")).await.unwrap();

        assert!(matches!(
            service.login(login("carol", "wrong")).await,
            Err(ServiceError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login(login("nobody", "right")).await,
            Err(ServiceError::InvalidCredentials)
        ));

        service.deactivate(profile.id).await.unwrap();
        assert!(matches!(
            service.login(login("carol", "right")).await,
            Err(ServiceError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn profiles_are_self_only() {
        let service = service();
        let alice = service.register(registration("alice@example.com", "pw")).await.unwrap();
        let bob = service.register(registration("bob@example.com", "pw")).await.unwrap();

        assert_eq!(service.get_by_id(alice.id, alice.id).await.unwrap().id, alice.id);
        assert!(matches!(
            service.get_by_id(alice.id, bob.id).await,
            Err(ServiceError::Access(AccessError::Unauthorized { .. }))
        ));
        assert!(matches!(
            service.get_by_id(Uuid::new_v4(), bob.id).await,
            Err(ServiceError::Access(AccessError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn password_change_requires_current_password() {
        let service = service();
        let user = service.register(registration("dave@example.com", "old-pass")).await.unwrap();

        let wrong = ChangePassword {
            current_password: Some("nope".to_string()),
            new_password: Some("new-pass".to_string()),
        };
        assert!(matches!(
            service.change_password(user.id, wrong).await,
            Err(ServiceError::Validation { .. })
        ));

        let right = ChangePassword {
            current_password: Some("old-pass".to_string()),
            new_password: Some("new-pass".to_string()),
        };
        service.change_password(user.id, right).await.unwrap();
        assert!(service.login(login("dave", "new-pass")).await.is_ok());
        assert!(service.login(login("dave", "old-pass")).await.is_err());
    }

    #[tokio::test]
    async fn preferences_default_then_update() {
        let service = service();
        let user = service.register(registration("erin@example.com", "pw")).await.unwrap();

        let prefs = service.preferences(user.id).await.unwrap();
        assert_eq!(prefs.owner_id, user.id);
        assert_eq!(prefs.theme, Theme::Light);
        assert!(prefs.notifications_enabled);
        assert_eq!(service.preferences(user.id).await.unwrap().id, prefs.id);

        let updated = service
            .update_preferences(
                user.id,
                UpdatePreferences {
                    theme: Some(Theme::Dark),
                    push_notifications: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.theme, Theme::Dark);
        assert!(!updated.push_notifications);
        assert_eq!(updated.language, Language::Es);
    }

    #[tokio::test]
    async fn delete_account_purges_then_removes() {
        let client = Arc::new(CountingClient {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let as_dyn: Arc<dyn OwnedDataClient> = client.clone();
        let service = service_with(vec![as_dyn]);
        let user = service.register(registration("frank@example.com", "pw")).await.unwrap();
        service.preferences(user.id).await.unwrap();

        let report = service.delete_account(user.id).await.unwrap();
        assert_eq!(report.deleted.get("notes"), Some(&2));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(service.me(user.id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn failed_purge_keeps_account() {
        let client = Arc::new(CountingClient {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let as_dyn: Arc<dyn OwnedDataClient> = client;
        let service = service_with(vec![as_dyn]);
        let user = service.register(registration("gina@example.com", "pw")).await.unwrap();

        let err = service.delete_account(user.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Client(ClientError::Incomplete(_))));
        assert!(service.me(user.id).await.is_ok());
    }
}
