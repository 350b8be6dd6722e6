//! Keeping a local mirror of the remote collections in sync with the
//! resource API.

pub mod client;
pub mod gateway;
pub mod server;
pub mod submit;
pub mod transaction;

pub use client::{CollectionStore, Collections, ListenerKey, LoadOutcome, StoreChange};
pub use gateway::{Endpoint, GatewayError, HttpGateway, ResourceApi};
pub use server::{InMemoryServer, Route};
pub use submit::SubmitError;
