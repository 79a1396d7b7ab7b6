use crate::db::models::{AuthorRef, UserId};
use crate::error::{AppError, AppResult};

/// Name recorded on comments when the user has no display name.
const FALLBACK_AUTHOR_NAME: &str = "User";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: UserId,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone)]
struct ActiveSession {
    user: SessionUser,
}

/// Who is acting. Passed explicitly into every mutation; created at sign-in
/// and invalidated at sign-out.
#[derive(Debug, Clone, Default)]
pub struct Session {
    active: Option<ActiveSession>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn sign_in(user: SessionUser) -> Self {
        tracing::debug!("Session started for {}", user.id);
        Self {
            active: Some(ActiveSession { user }),
        }
    }

    pub fn sign_out(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::debug!("Session ended for {}", active.user.id);
        }
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.active.as_ref().map(|a| &a.user)
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user().map(|u| &u.id)
    }

    pub fn is_signed_in(&self) -> bool {
        self.active.is_some()
    }

    /// The signed-in user, or `AuthenticationRequired`.
    pub fn require_user(&self) -> AppResult<&SessionUser> {
        self.user().ok_or(AppError::AuthenticationRequired)
    }

    /// Author snapshot for a new comment or reply.
    pub fn author_ref(&self) -> AppResult<AuthorRef> {
        let user = self.require_user()?;
        Ok(AuthorRef {
            id: user.id.clone(),
            name: user
                .display_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| FALLBACK_AUTHOR_NAME.to_string()),
        })
    }
}
