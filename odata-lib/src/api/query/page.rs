//! One response's worth of query results.

use std::vec;

use crate::model::Entity;

/// Entities from a single response, with the server's paging hints.
///
/// Services cap the size of a response and answer with a next link
/// (`@odata.nextLink`, v2 `__next` or an Atom `<link rel="next">`) when
/// more results remain. [`Query::pages`](super::Query::pages) follows
/// those links for you; a `Page` only records where the next one is.
///
/// The total is only present when the query asked for it with
/// [`include_count`](super::Query::include_count). It counts every entity
/// matching the filter, not the entities of this page.
///
/// ```ignore
/// for page in products.query().include_count().pages() {
///     let page = page?;
///     println!("{} of {:?}", page.len(), page.total_count());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Page {
    entities: Vec<Entity>,
    next_link: Option<String>,
    total_count: Option<usize>,
}

impl Page {
    pub(crate) fn new(entities: Vec<Entity>, next_link: Option<String>, total_count: Option<usize>) -> Self {
        Self {
            entities,
            next_link,
            total_count,
        }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Entities are materialized lazily, so reading them needs `&mut`.
    pub fn entities_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    pub fn into_entities(self) -> Vec<Entity> {
        self.entities
    }

    /// The link exactly as the service sent it; it may be absolute.
    pub fn next_link(&self) -> Option<&str> {
        self.next_link.as_deref()
    }

    pub fn total_count(&self) -> Option<usize> {
        self.total_count
    }

    /// `false` on the last page. An empty page can still have more.
    pub fn has_more(&self) -> bool {
        self.next_link.is_some()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl IntoIterator for Page {
    type Item = Entity;
    type IntoIter = vec::IntoIter<Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}
