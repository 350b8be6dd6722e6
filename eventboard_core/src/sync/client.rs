use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    future::Future,
    rc::Rc,
};

use slotmap::{DefaultKey, SlotMap};
use tokio::sync::Mutex;

use crate::data::{CategoriesIndex, Category, CategoryId, Event, EventDraft, EventId};

use super::{
    gateway::{GatewayError, ResourceApi},
    transaction::Commit,
};

/// The mirrored collections, plus the state a consumer needs to present them.
#[derive(Debug, Default, Clone)]
pub struct Collections {
    events: Vec<Event>,
    categories: Vec<Category>,
    /// Derived from `categories`; rebuilt whenever they are replaced.
    index: CategoriesIndex,
    loading: bool,
    /// Left by the last load; cleared only when the next load starts.
    load_error: Option<GatewayError>,
    /// Left by the last mutation; cleared by the next successful one.
    mutation_error: Option<GatewayError>,
}

impl Collections {
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn event(&self, id: EventId) -> Option<&Event> {
        self.events.iter().find(|event| event.id == id)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category_index(&self) -> &CategoriesIndex {
        &self.index
    }

    pub fn category_name(&self, id: CategoryId) -> Option<&str> {
        self.index.name(id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// The failure of the most recent mutation if it failed, otherwise the
    /// failure of the most recent load.
    pub fn error(&self) -> Option<&GatewayError> {
        self.mutation_error.as_ref().or(self.load_error.as_ref())
    }

    /// Whether the mirrored collections are left over from before a failed
    /// load.
    pub fn load_error(&self) -> Option<&GatewayError> {
        self.load_error.as_ref()
    }

    fn replace_all(&mut self, events: Vec<Event>, categories: Vec<Category>) {
        self.index = CategoriesIndex::derive(&categories);
        self.events = events;
        self.categories = categories;
    }
}

/// What just happened to a [`CollectionStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    LoadStarted,
    /// Both collections were replaced.
    Loaded,
    /// In-flight loads were abandoned by their owner.
    LoadAbandoned,
    Created(EventId),
    Updated(EventId),
    Removed(EventId),
    Fetched(EventId),
    /// An operation failed; the collections were left as they were.
    Failed(GatewayError),
}

/// How a call to [`CollectionStore::load`] ended, if it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The downloaded collections are now the mirrored ones.
    Applied,
    /// A newer load was issued (or loads were abandoned) before this one
    /// settled, so its result was thrown away.
    Superseded,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct ListenerKey(DefaultKey);

type Listener = Rc<dyn Fn(&StoreChange, &Collections)>;

/// Mirrors the remote event and category collections. This is the only
/// thing that modifies the mirrored collections, and it does so only after
/// the server has confirmed a change.
///
/// The store is meant to be owned by a single task and shared by reference;
/// its operations may be run concurrently (e.g. with `futures::join!`).
/// Mutations addressed at the same event are queued and take effect in the
/// order they were issued. Loads are tagged with a generation number and only
/// the newest one may apply its result. Mutations confirmed while a load is
/// in flight are applied again on top of its result.
pub struct CollectionStore<A: ResourceApi> {
    api: A,
    /// Replaced copy-on-write, so listeners and readers hold snapshots
    /// rather than borrows.
    collections: RefCell<Rc<Collections>>,
    /// The generation of the most recently issued load.
    load_generation: Cell<u64>,
    /// Number of commits made so far.
    commit_seq: Cell<u64>,
    loads_in_flight: Cell<usize>,
    /// Commits made while any load was in flight, tagged with their sequence
    /// number. Emptied once no load is in flight.
    recent_commits: RefCell<Vec<(u64, Commit)>>,
    /// One queue per event that currently has a mutation in flight.
    lanes: RefCell<HashMap<EventId, Rc<Mutex<()>>>>,
    listeners: RefCell<SlotMap<DefaultKey, Listener>>,
}

impl<A: ResourceApi> CollectionStore<A> {
    /// Creates an empty store. Nothing is downloaded until
    /// [`CollectionStore::load`] is called.
    pub fn new(api: A) -> Self {
        Self {
            api,
            collections: RefCell::new(Rc::new(Collections::default())),
            load_generation: Cell::new(0),
            commit_seq: Cell::new(0),
            loads_in_flight: Cell::new(0),
            recent_commits: RefCell::new(Vec::new()),
            lanes: RefCell::new(HashMap::new()),
            listeners: RefCell::new(SlotMap::new()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Returns a snapshot of the current state. Later changes do not show up
    /// in it.
    pub fn collections(&self) -> Rc<Collections> {
        Rc::clone(&*self.collections.borrow())
    }

    pub fn events(&self) -> Vec<Event> {
        self.collections().events.clone()
    }

    pub fn event(&self, id: EventId) -> Option<Event> {
        self.collections().event(id).cloned()
    }

    pub fn categories(&self) -> Vec<Category> {
        self.collections().categories.clone()
    }

    pub fn category_name(&self, id: CategoryId) -> Option<String> {
        self.collections().category_name(id).map(str::to_string)
    }

    pub fn is_loading(&self) -> bool {
        self.collections().loading
    }

    pub fn error(&self) -> Option<GatewayError> {
        self.collections().error().cloned()
    }

    /// Registers a listener that is called after every change, with the
    /// collections already updated.
    pub fn subscribe(&self, listener: impl Fn(&StoreChange, &Collections) + 'static) -> ListenerKey {
        ListenerKey(self.listeners.borrow_mut().insert(Rc::new(listener)))
    }

    /// Returns whether the listener was still registered.
    pub fn unsubscribe(&self, key: ListenerKey) -> bool {
        self.listeners.borrow_mut().remove(key.0).is_some()
    }

    /// Downloads both collections concurrently and replaces the mirrored ones
    /// if, and only if, both downloads succeed. On failure, nothing is
    /// replaced and the first failure (events before categories) is recorded
    /// and returned.
    ///
    /// Mutations confirmed after the load was issued are applied again to the
    /// downloaded events, since the server may have answered the load before
    /// it saw them.
    pub async fn load(&self) -> Result<LoadOutcome, GatewayError> {
        let generation = self.load_generation.get() + 1;
        self.load_generation.set(generation);
        let _in_flight = LoadInFlight::enter(&self.loads_in_flight, &self.recent_commits);
        let since = self.commit_seq.get();
        self.modify(StoreChange::LoadStarted, |collections| {
            collections.loading = true;
            collections.load_error = None;
            collections.mutation_error = None;
        });

        let (events, categories) =
            futures::join!(self.api.list_events(), self.api.list_categories());

        if self.load_generation.get() != generation {
            tracing::debug!("discarding result of superseded load {generation}");
            return Ok(LoadOutcome::Superseded);
        }

        match (events, categories) {
            (Ok(mut events), Ok(categories)) => {
                let replayed = self.replay_commits(since, &mut events);
                tracing::debug!(
                    "load {generation} applied: {} events, {} categories, {replayed} commits replayed",
                    events.len(),
                    categories.len()
                );
                self.modify(StoreChange::Loaded, |collections| {
                    collections.replace_all(events, categories);
                    collections.loading = false;
                });
                Ok(LoadOutcome::Applied)
            }
            (Err(err), _) | (_, Err(err)) => {
                tracing::warn!("load {generation} failed, keeping previous collections: {err}");
                self.modify(StoreChange::Failed(err.clone()), |collections| {
                    collections.loading = false;
                    collections.load_error = Some(err.clone());
                });
                Err(err)
            }
        }
    }

    /// Discards the results of all loads still in flight, e.g. because the
    /// view that requested them went away.
    pub fn abandon_pending_loads(&self) {
        self.load_generation.set(self.load_generation.get() + 1);
        if self.collections.borrow().loading {
            self.modify(StoreChange::LoadAbandoned, |collections| collections.loading = false);
        }
    }

    /// Asks the server to create an event from the draft and, once confirmed,
    /// appends the server's record.
    pub async fn create(&self, draft: &EventDraft) -> Result<Event, GatewayError> {
        let created = self.confirm(self.api.create_event(draft)).await?;
        self.commit(Commit::Created(created.clone()));
        Ok(created)
    }

    /// Asks the server to replace the event with the given ID and, once
    /// confirmed, replaces the mirrored record in place.
    /// Fields of the mirrored record that the draft does not cover are sent
    /// back unchanged.
    pub async fn update(&self, id: EventId, draft: &EventDraft) -> Result<Event, GatewayError> {
        self.in_lane(id, async {
            let mut record = draft.clone().with_id(id);
            if let Some(current) = self.collections.borrow().event(id) {
                record.extra = current.extra.clone();
            }
            let updated = self.confirm(self.api.update_event(id, &record)).await?;
            self.commit(Commit::Updated(updated.clone()));
            Ok::<_, GatewayError>(updated)
        })
        .await
    }

    /// Asks the server to delete the event and, once confirmed, removes it.
    /// A failure, including the server not knowing the ID, leaves the
    /// collection untouched. A confirmed delete of an event that is not
    /// mirrored is a no-op.
    pub async fn remove(&self, id: EventId) -> Result<(), GatewayError> {
        self.in_lane(id, async {
            self.confirm(self.api.delete_event(id)).await?;
            self.commit(Commit::Removed(id));
            Ok::<_, GatewayError>(())
        })
        .await
    }

    /// Downloads a single event and mirrors it, replacing the existing record
    /// or appending it if it was not mirrored yet.
    pub async fn refresh_event(&self, id: EventId) -> Result<Event, GatewayError> {
        self.in_lane(id, async {
            let fetched = self.confirm(self.api.fetch_event(id)).await?;
            self.commit(Commit::Fetched(fetched.clone()));
            Ok::<_, GatewayError>(fetched)
        })
        .await
    }

    /// Awaits a request, recording its failure.
    async fn confirm<T>(
        &self,
        request: impl Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, GatewayError> {
        request.await.map_err(|err| {
            tracing::warn!("request failed: {err}");
            self.modify(StoreChange::Failed(err.clone()), |collections| {
                collections.mutation_error = Some(err.clone());
            });
            err
        })
    }

    fn commit(&self, commit: Commit) {
        let id = commit.event_id();
        let change = match &commit {
            Commit::Created(_) => StoreChange::Created(id),
            Commit::Updated(_) => StoreChange::Updated(id),
            Commit::Removed(_) => StoreChange::Removed(id),
            Commit::Fetched(_) => StoreChange::Fetched(id),
        };
        let seq = self.commit_seq.get() + 1;
        self.commit_seq.set(seq);
        if self.loads_in_flight.get() > 0 {
            self.recent_commits.borrow_mut().push((seq, commit.clone()));
        }
        self.modify(change, |collections| {
            collections.mutation_error = None;
            if !commit.apply(&mut collections.events) {
                tracing::warn!("event {id} is no longer mirrored, nothing to apply");
            }
        });
    }

    /// Applies the commits made after `since` to freshly downloaded events.
    /// Returns how many there were.
    fn replay_commits(&self, since: u64, events: &mut Vec<Event>) -> usize {
        let recent = self.recent_commits.borrow();
        let mut replayed = 0;
        for (_, commit) in recent.iter().filter(|(seq, _)| *seq > since) {
            commit.clone().apply(events);
            replayed += 1;
        }
        replayed
    }

    /// Runs `operation` once every operation previously queued for the same
    /// event has finished.
    async fn in_lane<T>(&self, id: EventId, operation: impl Future<Output = T>) -> T {
        let lane = self.lanes.borrow_mut().entry(id).or_default().clone();
        let output = {
            let _turn = lane.lock().await;
            operation.await
        };

        // the map and this call hold the only references once nothing else
        // is queued
        let mut lanes = self.lanes.borrow_mut();
        if Rc::strong_count(&lane) == 2
            && lanes.get(&id).is_some_and(|current| Rc::ptr_eq(current, &lane))
        {
            lanes.remove(&id);
        }
        output
    }

    /// Modifies the collections, then notifies the listeners. No borrow is
    /// held while a listener runs, so listeners may call back into the store.
    fn modify(&self, change: StoreChange, f: impl FnOnce(&mut Collections)) {
        let snapshot = {
            let mut current = self.collections.borrow_mut();
            f(Rc::make_mut(&mut *current));
            Rc::clone(&*current)
        };

        let listeners: Vec<Listener> = self.listeners.borrow().values().cloned().collect();
        for listener in listeners {
            listener(&change, &snapshot);
        }
    }
}

/// Counts a load as in flight until it is dropped, whether it settled or was
/// cancelled. Recent commits are only kept while some load is in flight.
struct LoadInFlight<'a> {
    count: &'a Cell<usize>,
    recent_commits: &'a RefCell<Vec<(u64, Commit)>>,
}

impl<'a> LoadInFlight<'a> {
    fn enter(count: &'a Cell<usize>, recent_commits: &'a RefCell<Vec<(u64, Commit)>>) -> Self {
        count.set(count.get() + 1);
        Self { count, recent_commits }
    }
}

impl Drop for LoadInFlight<'_> {
    fn drop(&mut self) {
        let remaining = self.count.get() - 1;
        self.count.set(remaining);
        if remaining == 0 {
            self.recent_commits.borrow_mut().clear();
        }
    }
}
