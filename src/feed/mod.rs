// Paginated feeds and the scroll trigger that drives them
mod domain;
mod paginator;
mod scroll;
mod sources;

pub use self::domain::{Cursor, FetchOutcome, Page, SkipReason};
pub use self::paginator::{FeedPaginator, PageSource};
pub use self::scroll::{
    IgnoreReason, ScrollTrigger, Sentinel, TriggerOutcome, TriggerState, VisibilityEvent,
};
pub use self::sources::{ExploreSource, UploadsSource, UserUploadsSource, UPLOAD_ORDER_FIELD};
