use crate::db::models::UserId;
use crate::error::{AppError, AppResult};

/// A comment or reply may be changed by its author, or by the owner of the
/// image it was written under.
pub fn can_modify(caller: &UserId, author: &UserId, item_owner: Option<&UserId>) -> bool {
    caller == author || item_owner == Some(caller)
}

pub fn ensure_can_modify(
    caller: &UserId,
    author: &UserId,
    item_owner: Option<&UserId>,
) -> AppResult<()> {
    if can_modify(caller, author, item_owner) {
        Ok(())
    } else {
        tracing::warn!("{} may not modify content by {}", caller, author);
        Err(AppError::AuthorizationDenied)
    }
}
