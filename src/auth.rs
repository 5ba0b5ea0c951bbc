// 👤 Local user profiles and the current session
//
// Credentials are checked against the profiles kept in local storage.
// Passwords are stored as salted SHA-256 digests, never in clear.

use crate::storage::{KvStorage, KEY_CURRENT_USER, KEY_USERS};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    EmailTaken(String),
    MissingField(&'static str),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::EmailTaken(email) => write!(f, "a user with login '{}' already exists", email),
            AuthError::MissingField(field) => write!(f, "{} is required", field),
        }
    }
}

impl std::error::Error for AuthError {}

// ============================================================================
// USER PROFILE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    /// Login name; the default account uses a bare word instead of an address
    pub email: String,
    pub password_hash: String,
    /// CREFITO registration number
    pub license: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_base64: Option<String>,
}

impl UserProfile {
    fn default_admin() -> Self {
        let id = "1".to_string();
        UserProfile {
            password_hash: hash_password(&id, "123"),
            id,
            name: "Gerson Bruno".to_string(),
            email: "admin".to_string(),
            license: "12345-F".to_string(),
            photo_base64: None,
        }
    }

    pub fn check_password(&self, password: &str) -> bool {
        self.password_hash == hash_password(&self.id, password)
    }
}

/// Profile without the password digest, for display and the API
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub license: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_base64: Option<String>,
}

impl From<&UserProfile> for PublicProfile {
    fn from(user: &UserProfile) -> Self {
        PublicProfile {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            license: user.license.clone(),
            photo_base64: user.photo_base64.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub license: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub license: Option<String>,
    pub photo_base64: Option<String>,
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// AUTH STATE
// ============================================================================

pub struct AuthState {
    storage: KvStorage,
    users: Vec<UserProfile>,
    current: Option<UserProfile>,
}

impl AuthState {
    /// Load users and the remembered session. An empty store gets the
    /// default `admin` account.
    pub fn load(storage: KvStorage) -> Result<Self> {
        let users = match storage.get_json::<Vec<UserProfile>>(KEY_USERS)? {
            Some(users) => users,
            None => vec![UserProfile::default_admin()],
        };
        let current = storage.get_json::<UserProfile>(KEY_CURRENT_USER)?;

        let state = AuthState {
            storage,
            users,
            current,
        };
        state.persist()?;
        Ok(state)
    }

    fn persist(&self) -> Result<()> {
        self.storage.set_json(KEY_USERS, &self.users)?;
        match &self.current {
            Some(user) => self.storage.set_json(KEY_CURRENT_USER, user)?,
            None => {
                self.storage.remove(KEY_CURRENT_USER)?;
            }
        }
        Ok(())
    }

    pub fn current_user(&self) -> Option<&UserProfile> {
        self.current.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }

    /// Start a session when `email` and `password` match a stored profile
    pub fn login(&mut self, email: &str, password: &str) -> Result<bool> {
        let found = self
            .users
            .iter()
            .find(|u| u.email == email && u.check_password(password))
            .cloned();

        match found {
            Some(user) => {
                log::info!("user '{}' logged in", user.email);
                self.current = Some(user);
                self.persist()?;
                Ok(true)
            }
            None => {
                log::warn!("failed login for '{}'", email);
                Ok(false)
            }
        }
    }

    pub fn logout(&mut self) -> Result<()> {
        if let Some(user) = self.current.take() {
            log::info!("user '{}' logged out", user.email);
        }
        self.persist()
    }

    /// Add a profile. Does not log the new user in.
    pub fn register(&mut self, new: NewUser) -> Result<UserProfile> {
        let email = new.email.trim().to_string();
        if new.name.trim().is_empty() {
            return Err(AuthError::MissingField("name").into());
        }
        if email.is_empty() {
            return Err(AuthError::MissingField("email").into());
        }
        if new.password.is_empty() {
            return Err(AuthError::MissingField("password").into());
        }
        if self.users.iter().any(|u| u.email == email) {
            return Err(AuthError::EmailTaken(email).into());
        }

        let id = uuid::Uuid::new_v4().to_string();
        let user = UserProfile {
            password_hash: hash_password(&id, &new.password),
            id,
            name: new.name.trim().to_string(),
            email,
            license: new.license,
            photo_base64: None,
        };

        self.users.push(user.clone());
        self.persist()?;
        log::info!("registered user '{}'", user.email);
        Ok(user)
    }

    /// Update the logged-in user's profile; a no-op when nobody is logged in
    pub fn update_profile(&mut self, patch: ProfilePatch) -> Result<Option<UserProfile>> {
        let Some(mut user) = self.current.clone() else {
            return Ok(None);
        };

        if patch.name.as_deref().map_or(false, |n| n.trim().is_empty()) {
            return Err(AuthError::MissingField("name").into());
        }
        if let Some(email) = &patch.email {
            let email = email.trim();
            if email.is_empty() {
                return Err(AuthError::MissingField("email").into());
            }
            if self.users.iter().any(|u| u.email == email && u.id != user.id) {
                return Err(AuthError::EmailTaken(email.to_string()).into());
            }
        }

        if let Some(name) = patch.name {
            user.name = name.trim().to_string();
        }
        if let Some(email) = patch.email {
            user.email = email.trim().to_string();
        }
        if let Some(password) = patch.password.filter(|p| !p.is_empty()) {
            user.password_hash = hash_password(&user.id, &password);
        }
        if let Some(license) = patch.license {
            user.license = license;
        }
        if let Some(photo) = patch.photo_base64 {
            user.photo_base64 = if photo.is_empty() { None } else { Some(photo) };
        }

        for stored in self.users.iter_mut().filter(|u| u.id == user.id) {
            *stored = user.clone();
        }
        self.current = Some(user.clone());
        self.persist()?;
        Ok(Some(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> AuthState {
        AuthState::load(KvStorage::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn test_default_admin_can_log_in() {
        let mut auth = fresh();
        assert!(!auth.is_authenticated());

        assert!(!auth.login("admin", "wrong").unwrap());
        assert!(auth.login("admin", "123").unwrap());
        assert_eq!(auth.current_user().unwrap().name, "Gerson Bruno");
    }

    #[test]
    fn test_password_is_not_stored_in_clear() {
        let auth = fresh();
        let raw = auth.storage.get_raw(KEY_USERS).unwrap().unwrap();
        assert!(!raw.contains("\"123\""));
        assert_eq!(auth.users[0].password_hash.len(), 64);
    }

    #[test]
    fn test_session_survives_reload() {
        let storage = KvStorage::open_in_memory().unwrap();
        {
            let mut auth = AuthState::load(storage.clone()).unwrap();
            auth.login("admin", "123").unwrap();
        }

        let mut auth = AuthState::load(storage.clone()).unwrap();
        assert!(auth.is_authenticated());

        auth.logout().unwrap();
        assert!(storage.get_raw(KEY_CURRENT_USER).unwrap().is_none());
    }

    #[test]
    fn test_register_then_login() {
        let mut auth = fresh();
        auth.register(NewUser {
            name: "Paula Reis".to_string(),
            email: "paula@clinica.com".to_string(),
            password: "s3nha".to_string(),
            license: "54321-F".to_string(),
        })
        .unwrap();

        assert!(!auth.is_authenticated());
        assert!(auth.login("paula@clinica.com", "s3nha").unwrap());
    }

    #[test]
    fn test_duplicate_login_rejected() {
        let mut auth = fresh();
        let err = auth
            .register(NewUser {
                name: "Outro".to_string(),
                email: "admin".to_string(),
                password: "x".to_string(),
                license: String::new(),
            })
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<AuthError>(),
            Some(&AuthError::EmailTaken("admin".to_string()))
        );
    }

    #[test]
    fn test_update_profile() {
        let mut auth = fresh();
        assert!(auth.update_profile(ProfilePatch::default()).unwrap().is_none());

        auth.login("admin", "123").unwrap();
        auth.update_profile(ProfilePatch {
            name: Some("Dr. Gerson Bruno".to_string()),
            password: Some("nova".to_string()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(auth.users[0].name, "Dr. Gerson Bruno");
        auth.logout().unwrap();
        assert!(!auth.login("admin", "123").unwrap());
        assert!(auth.login("admin", "nova").unwrap());
    }

    #[test]
    fn test_update_profile_rejects_email_of_another_user() {
        let mut auth = fresh();
        auth.register(NewUser {
            name: "Paula Reis".to_string(),
            email: "paula@clinica.com".to_string(),
            password: "s3nha".to_string(),
            license: String::new(),
        })
        .unwrap();
        auth.login("admin", "123").unwrap();

        let err = auth
            .update_profile(ProfilePatch {
                email: Some(" paula@clinica.com ".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<AuthError>(),
            Some(&AuthError::EmailTaken("paula@clinica.com".to_string()))
        );
        assert_eq!(auth.current_user().unwrap().email, "admin");
    }

    #[test]
    fn test_update_profile_rejects_blank_name_or_email() {
        let mut auth = fresh();
        auth.login("admin", "123").unwrap();

        let err = auth
            .update_profile(ProfilePatch {
                name: Some("   ".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.downcast_ref::<AuthError>(), Some(&AuthError::MissingField("name")));

        let err = auth
            .update_profile(ProfilePatch {
                email: Some(String::new()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.downcast_ref::<AuthError>(), Some(&AuthError::MissingField("email")));

        let user = auth.current_user().unwrap();
        assert_eq!((user.name.as_str(), user.email.as_str()), ("Gerson Bruno", "admin"));
        assert!(auth.login("admin", "123").unwrap());
    }
}
