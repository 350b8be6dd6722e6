use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    rc::Rc,
    time::Duration,
};

use crate::data::{Category, Event, EventDraft, EventId, NewsletterSignup, Registration};

use super::gateway::{GatewayError, ResourceApi};

/// Identifies one operation of [`ResourceApi`], for injecting failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    ListEvents,
    FetchEvent,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
    ListCategories,
    RegisterInterest,
    SubscribeNewsletter,
}

#[derive(Debug, Default)]
struct ServerState {
    events: Vec<Event>,
    categories: Vec<Category>,
    /// The ID that will be assigned to the next created event.
    next_event_id: u64,
    registrations: Vec<Registration>,
    signups: Vec<NewsletterSignup>,
    /// Status codes to answer with instead of serving the request, consumed
    /// one per request.
    failures: HashMap<Route, VecDeque<u16>>,
    latency: Duration,
}

/// An in-process stand-in for the resource API. Clones share the same state,
/// so a test can keep a handle while a store owns another.
///
/// Every request is served (and its effect applied) as soon as it is made;
/// the response is then delivered after the configured latency.
#[derive(Debug, Clone, Default)]
pub struct InMemoryServer {
    state: Rc<RefCell<ServerState>>,
}

impl InMemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an event as if it had been created by some other client.
    pub fn insert_event(&self, draft: EventDraft) -> Event {
        let mut state = self.state.borrow_mut();
        let event = draft.with_id(state.assign_id());
        state.events.push(event.clone());
        event
    }

    /// Stores a record exactly as given, including any fields this client
    /// does not know about.
    pub fn insert_record(&self, event: Event) {
        let mut state = self.state.borrow_mut();
        state.next_event_id = state.next_event_id.max(event.id.0);
        state.events.push(event);
    }

    pub fn insert_category(&self, category: Category) {
        self.state.borrow_mut().categories.push(category);
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    pub fn registrations(&self) -> Vec<Registration> {
        self.state.borrow().registrations.clone()
    }

    pub fn signups(&self) -> Vec<NewsletterSignup> {
        self.state.borrow().signups.clone()
    }

    /// Makes the next request to `route` fail with the given status.
    pub fn fail_next(&self, route: Route, status: u16) {
        self.state.borrow_mut().failures.entry(route).or_default().push_back(status);
    }

    /// Delays the responses to requests made from now on.
    pub fn set_latency(&self, latency: Duration) {
        self.state.borrow_mut().latency = latency;
    }

    async fn serve<T>(
        &self,
        route: Route,
        handler: impl FnOnce(&mut ServerState) -> Result<T, GatewayError>,
    ) -> Result<T, GatewayError> {
        let (response, latency) = {
            let mut state = self.state.borrow_mut();
            let injected = state.failures.get_mut(&route).and_then(VecDeque::pop_front);
            let response = match injected {
                Some(status) => Err(GatewayError::status(status)),
                None => handler(&mut state),
            };
            (response, state.latency)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        response
    }
}

impl ServerState {
    fn assign_id(&mut self) -> EventId {
        self.next_event_id += 1;
        EventId(self.next_event_id)
    }

    fn position(&self, id: EventId) -> Result<usize, GatewayError> {
        self.events.iter().position(|event| event.id == id).ok_or_else(|| GatewayError::status(404))
    }
}

impl ResourceApi for InMemoryServer {
    async fn list_events(&self) -> Result<Vec<Event>, GatewayError> {
        self.serve(Route::ListEvents, |state| Ok(state.events.clone())).await
    }

    async fn fetch_event(&self, id: EventId) -> Result<Event, GatewayError> {
        self.serve(Route::FetchEvent, |state| {
            let position = state.position(id)?;
            Ok(state.events[position].clone())
        })
        .await
    }

    async fn create_event(&self, draft: &EventDraft) -> Result<Event, GatewayError> {
        self.serve(Route::CreateEvent, |state| {
            let event = draft.clone().with_id(state.assign_id());
            state.events.push(event.clone());
            Ok(event)
        })
        .await
    }

    async fn update_event(&self, id: EventId, event: &Event) -> Result<Event, GatewayError> {
        self.serve(Route::UpdateEvent, |state| {
            let position = state.position(id)?;
            // the path decides which record is replaced
            let stored = Event { id, ..event.clone() };
            state.events[position] = stored.clone();
            Ok(stored)
        })
        .await
    }

    async fn delete_event(&self, id: EventId) -> Result<(), GatewayError> {
        self.serve(Route::DeleteEvent, |state| {
            let position = state.position(id)?;
            state.events.remove(position);
            Ok(())
        })
        .await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, GatewayError> {
        self.serve(Route::ListCategories, |state| Ok(state.categories.clone())).await
    }

    async fn register_interest(&self, registration: &Registration) -> Result<(), GatewayError> {
        self.serve(Route::RegisterInterest, |state| {
            state.registrations.push(registration.clone());
            Ok(())
        })
        .await
    }

    async fn subscribe_newsletter(&self, signup: &NewsletterSignup) -> Result<(), GatewayError> {
        self.serve(Route::SubscribeNewsletter, |state| {
            state.signups.push(signup.clone());
            Ok(())
        })
        .await
    }
}
