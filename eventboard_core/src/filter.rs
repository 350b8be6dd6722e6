//! Filtered views over the event collection: free-text search on the title
//! combined with category membership.

use std::collections::HashSet;

use crate::data::{CategoryId, Event};

/// Returns the events whose title contains `search` (case-insensitive, ignoring
/// surrounding whitespace) and which belong to at least one of the `selected`
/// categories. An empty search or an empty selection matches everything for
/// that half of the predicate. The relative order of `events` is kept, and
/// nothing is deduplicated.
pub fn filter_events<'a, I>(events: I, search: &str, selected: &[CategoryId]) -> Vec<&'a Event>
where
    I: IntoIterator<Item = &'a Event>,
{
    let needle = search.trim().to_lowercase();
    let selected: HashSet<CategoryId> = selected.iter().copied().collect();
    events
        .into_iter()
        .filter(|event| matches_search(event, &needle) && matches_categories(event, &selected))
        .collect()
}

fn matches_search(event: &Event, needle: &str) -> bool {
    needle.is_empty() || event.title.to_lowercase().contains(needle)
}

fn matches_categories(event: &Event, selected: &HashSet<CategoryId>) -> bool {
    selected.is_empty() || event.category_ids.iter().any(|id| selected.contains(id))
}

/// The inputs of a filtered view, as picked by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub search: String,
    /// Selected categories in the order they were picked. Never contains
    /// duplicates when built through [`EventFilter::toggle_category`].
    pub categories: Vec<CategoryId>,
}

impl EventFilter {
    pub fn new(search: impl Into<String>, categories: Vec<CategoryId>) -> Self {
        Self { search: search.into(), categories }
    }

    /// Selects the category if it was not selected, otherwise deselects it.
    pub fn toggle_category(&mut self, id: CategoryId) {
        if let Some(position) = self.categories.iter().position(|selected| *selected == id) {
            self.categories.remove(position);
        } else {
            self.categories.push(id);
        }
    }

    /// Whether this filter lets every event through.
    pub fn is_empty(&self) -> bool {
        self.search.trim().is_empty() && self.categories.is_empty()
    }

    pub fn matches(&self, event: &Event) -> bool {
        !filter_events([event], &self.search, &self.categories).is_empty()
    }

    pub fn apply<'a, I>(&self, events: I) -> Vec<&'a Event>
    where
        I: IntoIterator<Item = &'a Event>,
    {
        filter_events(events, &self.search, &self.categories)
    }
}

/// A filter together with its most recent result. The result only changes
/// when [`FilteredView::recompute`] is called, typically from a store
/// subscription.
#[derive(Debug, Clone, Default)]
pub struct FilteredView {
    filter: EventFilter,
    events: Vec<Event>,
}

impl FilteredView {
    pub fn new(filter: EventFilter) -> Self {
        Self { filter, events: Vec::new() }
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Gives mutable access to the filter. The view is stale until the next
    /// call to [`FilteredView::recompute`].
    pub fn filter_mut(&mut self) -> &mut EventFilter {
        &mut self.filter
    }

    pub fn recompute(&mut self, events: &[Event]) {
        self.events = self.filter.apply(events).into_iter().cloned().collect();
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::data::{EventDraft, EventId};

    fn event(id: u64, title: &str, categories: &[u64]) -> Event {
        EventDraft {
            title: title.to_string(),
            description: String::new(),
            image: String::new(),
            location: String::new(),
            start_time: "2024-05-01T09:30".parse().unwrap(),
            end_time: "2024-05-01T11:00".parse().unwrap(),
            category_ids: categories.iter().copied().map(CategoryId).collect(),
        }
        .with_id(EventId(id))
    }

    fn ids(events: &[&Event]) -> Vec<u64> {
        events.iter().map(|event| event.id.0).collect()
    }

    fn sample() -> Vec<Event> {
        vec![
            event(1, "Jazz Night", &[10]),
            event(2, "Football match", &[20]),
            event(3, "Jazz brunch", &[30, 10]),
            event(4, "Quiet reading", &[]),
            event(5, "Street food", &[99]),
        ]
    }

    #[test]
    fn empty_inputs_are_identity() {
        let events = sample();
        assert_eq!(ids(&filter_events(&events, "", &[])), vec![1, 2, 3, 4, 5]);
        assert_eq!(ids(&filter_events(&events, "   ", &[])), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn search_is_trimmed_and_case_insensitive() {
        let events = sample();
        assert_eq!(ids(&filter_events(&events, "  JAZZ ", &[])), vec![1, 3]);
        assert_eq!(ids(&filter_events(&events, "ball", &[])), vec![2]);
        assert!(filter_events(&events, "opera", &[]).is_empty());
    }

    #[test]
    fn category_selection_is_any_of() {
        let events = sample();
        assert_eq!(ids(&filter_events(&events, "", &[CategoryId(10)])), vec![1, 3]);
        assert_eq!(ids(&filter_events(&events, "", &[CategoryId(20), CategoryId(99)])), vec![2, 5]);
        assert!(filter_events(&events, "", &[CategoryId(77)]).is_empty());
    }

    #[test]
    fn predicates_compose_with_and() {
        let events = sample();
        assert_eq!(ids(&filter_events(&events, "jazz", &[CategoryId(30)])), vec![3]);
        assert!(filter_events(&events, "football", &[CategoryId(10)]).is_empty());
    }

    #[test]
    fn filtering_is_idempotent_and_keeps_duplicates() {
        let mut events = sample();
        events.push(events[0].clone());
        let once = filter_events(&events, "jazz", &[CategoryId(10)]);
        let twice = filter_events(once.iter().copied(), "jazz", &[CategoryId(10)]);
        assert_eq!(ids(&once), vec![1, 3, 1]);
        assert_eq!(once, twice);
    }

    #[test]
    fn toggling_adds_then_removes() {
        let mut filter = EventFilter::default();
        assert!(filter.is_empty());
        filter.toggle_category(CategoryId(10));
        filter.toggle_category(CategoryId(20));
        assert_eq!(filter.categories, vec![CategoryId(10), CategoryId(20)]);
        filter.toggle_category(CategoryId(10));
        assert_eq!(filter.categories, vec![CategoryId(20)]);
        assert!(!filter.is_empty());
    }

    #[test]
    fn view_only_changes_on_recompute() {
        let mut events = sample();
        let mut view = FilteredView::new(EventFilter::new("jazz", vec![]));
        view.recompute(&events);
        assert_eq!(view.events().len(), 2);

        events.push(event(6, "Jazz picnic", &[]));
        assert_eq!(view.events().len(), 2);
        view.recompute(&events);
        assert_eq!(view.events().iter().map(|e| e.id.0).collect::<Vec<_>>(), vec![1, 3, 6]);

        view.filter_mut().toggle_category(CategoryId(30));
        view.recompute(&events);
        assert_eq!(view.events().iter().map(|e| e.id.0).collect::<Vec<_>>(), vec![3]);
        assert!(view.filter().matches(&events[2]));
    }
}
