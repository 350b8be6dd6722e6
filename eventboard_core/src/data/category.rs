use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::event::{null_as_default, Event};

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub u64);

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    /// A short display name for the category, e.g. "sports"
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// Lookup from category ID to display name, derived from a category
/// collection. It is always rebuilt from scratch and never patched, so it can
/// never drift from the collection it was derived from.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct CategoriesIndex {
    names: HashMap<CategoryId, String>,
}

impl CategoriesIndex {
    /// Builds the index for the given categories. If the same ID appears more
    /// than once, the later entry wins. Blank names are stored as "".
    pub fn derive(categories: &[Category]) -> Self {
        let names = categories
            .iter()
            .map(|category| {
                let name = if category.name.trim().is_empty() {
                    String::new()
                } else {
                    category.name.clone()
                };
                (category.id, name)
            })
            .collect();
        Self { names }
    }

    /// Returns the display name for the category, or `None` if no such
    /// category is known.
    pub fn name(&self, id: CategoryId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Display names of the event's categories in the order the event lists
    /// them. IDs that do not resolve are skipped.
    pub fn names_for<'a>(&'a self, event: &'a Event) -> impl Iterator<Item = &'a str> + 'a {
        event.category_ids.iter().filter_map(|id| self.name(*id))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
