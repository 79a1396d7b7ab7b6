use std::sync::Arc;

use crate::db::models::{UserId, UserProfile};
use crate::error::AppResult;
use crate::gateway::{DocPath, DocumentGateway, GatewayError};
use crate::session::Session;

const ANONYMOUS_NAME: &str = "Anonymous user";
const UNKNOWN_HANDLE: &str = "unknown";

impl UserProfile {
    /// "First Last" when both names are set.
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
                format!("{} {}", first, last)
            }
            _ => ANONYMOUS_NAME.to_string(),
        }
    }

    /// Username, else the local part of the e-mail address.
    pub fn handle(&self) -> String {
        if let Some(username) = self.username.as_deref().filter(|u| !u.is_empty()) {
            return username.to_string();
        }
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|local| !local.is_empty())
            .unwrap_or(UNKNOWN_HANDLE)
            .to_string()
    }
}

/// Uploader details shown next to an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploader {
    pub id: UserId,
    pub name: String,
    pub handle: String,
    pub avatar: Option<String>,
}

impl Uploader {
    pub fn from_profile(id: UserId, profile: &UserProfile) -> Self {
        Self {
            id,
            name: profile.display_name(),
            handle: profile.handle(),
            avatar: profile.avatar.clone().filter(|a| !a.is_empty()),
        }
    }
}

pub async fn get_profile(
    gateway: &Arc<dyn DocumentGateway>,
    user: &UserId,
) -> AppResult<Option<UserProfile>> {
    let doc = gateway.get(&DocPath::user(user)).await?;
    match doc {
        Some(value) => Ok(Some(
            serde_json::from_value(value).map_err(GatewayError::from)?,
        )),
        None => Ok(None),
    }
}

/// Overwrite the signed-in user's own profile. A missing username is taken
/// from the e-mail address.
pub async fn save_profile(
    gateway: &Arc<dyn DocumentGateway>,
    session: &Session,
    profile: &UserProfile,
) -> AppResult<()> {
    let user = session.require_user()?;

    let mut profile = profile.clone();
    if profile.username.as_deref().map_or(true, str::is_empty) {
        profile.username = Some(profile.handle()).filter(|h| h != UNKNOWN_HANDLE);
    }
    let data = serde_json::to_value(&profile).map_err(GatewayError::from)?;
    gateway.set(&DocPath::user(&user.id), data).await?;
    tracing::info!("Saved profile for {}", user.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::gateway::SqliteGateway;
    use crate::error::AppError;
    use crate::session::SessionUser;

    #[test]
    fn display_name_needs_both_names() {
        let full = UserProfile {
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            ..UserProfile::default()
        };
        assert_eq!(full.display_name(), "Ada Lovelace");

        let partial = UserProfile {
            first_name: Some("Ada".into()),
            ..UserProfile::default()
        };
        assert_eq!(partial.display_name(), "Anonymous user");
    }

    #[test]
    fn handle_falls_back_to_email_then_unknown() {
        let with_email = UserProfile {
            email: Some("ada@example.com".into()),
            ..UserProfile::default()
        };
        assert_eq!(with_email.handle(), "ada");

        let with_username = UserProfile {
            username: Some("countess".into()),
            email: Some("ada@example.com".into()),
            ..UserProfile::default()
        };
        assert_eq!(with_username.handle(), "countess");

        assert_eq!(UserProfile::default().handle(), "unknown");
    }

    #[tokio::test]
    async fn save_then_get_profile() {
        let pool = db::memory_pool().unwrap();
        db::run_migrations(&pool).unwrap();
        let gw: Arc<dyn DocumentGateway> = Arc::new(SqliteGateway::new(pool));
        let session = Session::sign_in(SessionUser {
            id: UserId::new("u1"),
            display_name: None,
        });

        let profile = UserProfile {
            username: Some("ada".into()),
            avatar: Some("https://img/ada.png".into()),
            ..UserProfile::default()
        };
        save_profile(&gw, &session, &profile).await.unwrap();

        let loaded = get_profile(&gw, &UserId::new("u1")).await.unwrap().unwrap();
        assert_eq!(loaded, profile);
        assert!(get_profile(&gw, &UserId::new("u2")).await.unwrap().is_none());

        let from_email = UserProfile {
            email: Some("grace@example.com".into()),
            ..UserProfile::default()
        };
        save_profile(&gw, &session, &from_email).await.unwrap();
        let loaded = get_profile(&gw, &UserId::new("u1")).await.unwrap().unwrap();
        assert_eq!(loaded.username.as_deref(), Some("grace"));

        assert!(matches!(
            save_profile(&gw, &Session::anonymous(), &profile).await,
            Err(AppError::AuthenticationRequired)
        ));
    }
}
