use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::{category::CategoryId, time::Moment};

/// A unique, server-assigned ID that can be used to refer to an event.
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A scheduled event as stored by the remote API.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    /// A short description of the event, e.g. "Jazz Night".
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    /// A longer description of the event.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    /// URL of the event's cover image.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub image: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub location: String,
    pub start_time: Moment,
    pub end_time: Moment,
    /// The categories to which this event belongs, in the order they were
    /// picked. May contain duplicates and IDs of categories that do not
    /// exist.
    #[serde(default, deserialize_with = "null_as_default")]
    pub category_ids: Vec<CategoryId>,
    /// Fields the server keeps that this client does not edit, such as
    /// `createdBy`. Sent back untouched when the record is replaced.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Stores event data, except the ID under which the server keeps it.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub image: String,
    pub location: String,
    pub start_time: Moment,
    pub end_time: Moment,
    pub category_ids: Vec<CategoryId>,
}

impl EventDraft {
    /// Attaches an ID, producing the full record sent when replacing an
    /// existing event.
    pub fn with_id(self, id: EventId) -> Event {
        let EventDraft { title, description, image, location, start_time, end_time, category_ids } =
            self;
        Event {
            id,
            title,
            description,
            image,
            location,
            start_time,
            end_time,
            category_ids,
            extra: Map::new(),
        }
    }
}

impl Event {
    /// Returns the editable part of this event, e.g. to prefill an edit form.
    pub fn to_draft(&self) -> EventDraft {
        EventDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
            location: self.location.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            category_ids: self.category_ids.clone(),
        }
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    null_as_default(deserializer)
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
