//! One-shot submissions that leave no local state behind: registering
//! interest in an event and signing up for the newsletter.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::data::{EventId, NewsletterSignup, Registration};

use super::gateway::{GatewayError, ResourceApi};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("the {0} field is required")]
    MissingField(&'static str),
    #[error("{0:?} is not a valid email address")]
    InvalidEmail(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"))
}

/// Trims both fields and checks that they are present and that the email
/// looks like one.
fn validate_contact(name: &str, email: &str) -> Result<(String, String), SubmitError> {
    let (name, email) = (name.trim(), email.trim());
    if name.is_empty() {
        return Err(SubmitError::MissingField("name"));
    }
    if email.is_empty() {
        return Err(SubmitError::MissingField("email"));
    }
    if !email_pattern().is_match(email) {
        return Err(SubmitError::InvalidEmail(email.to_string()));
    }
    Ok((name.to_string(), email.to_string()))
}

pub async fn register_interest<A: ResourceApi>(
    api: &A,
    event_id: EventId,
    name: &str,
    email: &str,
) -> Result<Registration, SubmitError> {
    let (name, email) = validate_contact(name, email)?;
    let registration = Registration { event_id, name, email };
    api.register_interest(&registration).await?;
    tracing::info!("registered interest in event {event_id}");
    Ok(registration)
}

pub async fn subscribe_newsletter<A: ResourceApi>(
    api: &A,
    name: &str,
    email: &str,
) -> Result<NewsletterSignup, SubmitError> {
    let (name, email) = validate_contact(name, email)?;
    let signup = NewsletterSignup { name, email };
    api.subscribe_newsletter(&signup).await?;
    tracing::info!("subscribed to the newsletter");
    Ok(signup)
}
