//! Client-side core of the event board: a mirror of the remote event and
//! category collections, the category lookup derived from it, and filtered
//! views over the events.

pub mod config;
pub mod data;
pub mod filter;
pub mod sync;

pub use config::GatewayConfig;
pub use data::{Category, CategoryId, Event, EventDraft, EventId, Moment};
pub use filter::{filter_events, EventFilter, FilteredView};
pub use sync::{CollectionStore, GatewayError, HttpGateway, ResourceApi};
