//! Records mirrored from the remote API, and the lookups derived from them.

pub mod category;
pub mod event;
pub mod submission;
pub mod time;

pub use category::{CategoriesIndex, Category, CategoryId};
pub use event::{Event, EventDraft, EventId};
pub use submission::{NewsletterSignup, Registration};
pub use time::Moment;
