//! Lazy iterators over query results.
//!
//! Nothing is requested until the iterator is advanced, and each page is
//! fetched only after the previous one has been consumed.

use std::sync::Arc;

use crate::api::query::Page;
use crate::api::query::Query;
use crate::client::RequestOptions;
use crate::client::Service;
use crate::error::Error;
use crate::model::Entity;
use crate::model::EntityOptions;

/// Iterator over result pages, following next-page links.
///
/// Stops after the first error.
#[derive(Debug)]
pub struct Pages {
    service: Arc<Service>,
    options: EntityOptions,
    next_chunk: Option<String>,
}

impl Pages {
    pub(crate) fn new(service: Arc<Service>, options: EntityOptions, first_chunk: String) -> Self {
        Self {
            service,
            options,
            next_chunk: Some(first_chunk),
        }
    }

    fn fetch(&mut self, chunk: &str) -> Result<Page, Error> {
        let response = self.service.execute(chunk, RequestOptions::default())?;
        let page = response.page(&self.options)?;
        if let Some(link) = page.next_link() {
            log::debug!("Following next page link {}", link);
            self.next_chunk = Some(self.service.relative_chunk(link));
        }
        Ok(page)
    }
}

impl Iterator for Pages {
    type Item = Result<Page, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.next_chunk.take()?;
        Some(self.fetch(&chunk))
    }
}

/// Iterator over every result of a query, page after page.
#[derive(Debug)]
pub struct Entities {
    pages: Pages,
    current: std::vec::IntoIter<Entity>,
}

impl Entities {
    pub(crate) fn new(pages: Pages) -> Self {
        Self {
            pages,
            current: Vec::new().into_iter(),
        }
    }
}

impl Iterator for Entities {
    type Item = Result<Entity, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entity) = self.current.next() {
                return Some(Ok(entity));
            }
            match self.pages.next()? {
                Ok(page) => self.current = page.into_entities().into_iter(),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Flattened results of a batched walk (`$skip`/`$top` windows).
///
/// Each exhausted batch triggers the request for the next one; the walk
/// ends at the first empty batch or error.
#[derive(Debug)]
pub struct Batches {
    query: Query,
    size: usize,
    index: usize,
    done: bool,
    current: std::vec::IntoIter<Entity>,
}

impl Batches {
    pub(crate) fn new(query: Query, size: usize) -> Self {
        Self {
            query,
            size,
            index: 0,
            done: false,
            current: Vec::new().into_iter(),
        }
    }

    /// Fetches the next batch, or `None` once an empty batch came back.
    pub(crate) fn next_batch(&mut self) -> Result<Option<Vec<Entity>>, Error> {
        if self.done {
            return Ok(None);
        }
        let skip = self.index * self.size;
        log::debug!("Fetching batch {} of {} (skip {})", self.index, self.query.entity_set(), skip);
        let page = self.query.clone().skip(skip).limit(self.size).execute();
        let entities = match page {
            Ok(page) => page.into_entities(),
            Err(err) => {
                self.done = true;
                return Err(err);
            }
        };
        if entities.is_empty() {
            self.done = true;
            return Ok(None);
        }
        self.index += 1;
        Ok(Some(entities))
    }
}

impl Iterator for Batches {
    type Item = Result<Entity, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entity) = self.current.next() {
                return Some(Ok(entity));
            }
            match self.next_batch() {
                Ok(Some(batch)) => self.current = batch.into_iter(),
                Ok(None) => return None,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
