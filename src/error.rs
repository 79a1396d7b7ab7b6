use crate::gateway::GatewayError;
use crate::images::ImageSourceError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Not allowed")]
    AuthorizationDenied,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Image source error: {0}")]
    ImageSource(#[from] ImageSourceError),
}

impl AppError {
    /// Text shown to the user when an operation is refused or fails.
    pub fn user_message(&self) -> String {
        match self {
            AppError::AuthenticationRequired => "You need to sign in to do that.".to_string(),
            AppError::AuthorizationDenied => {
                "Only the author or the image owner can change this.".to_string()
            }
            AppError::Validation(msg) => msg.clone(),
            AppError::NotFound(what) => format!("{} no longer exists.", what),
            AppError::Gateway(e) => {
                tracing::error!("Gateway error: {}", e);
                "Could not reach the server. Your view was refreshed.".to_string()
            }
            AppError::ImageSource(e) => {
                tracing::error!("Image source error: {}", e);
                "Could not load images right now.".to_string()
            }
        }
    }

    /// Network or remote failures, as opposed to refusals decided locally.
    pub fn is_remote(&self) -> bool {
        matches!(self, AppError::Gateway(_) | AppError::ImageSource(_))
    }
}

pub type AppResult<T> = Result<T, AppError>;
