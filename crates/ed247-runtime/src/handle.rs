//! Ownership-aware, forward-looping cursors over component containers.
//!
//! Every set the runtime hands out (streams of a channel, signals of a
//! stream, search results, ready streams after a wait) is a
//! [`HandleCollection`]. A collection either borrows a container the
//! component owns ("context-owned", lifetime-bound to that borrow) or owns a
//! snapshot ("caller-owned", released by the caller). The cursor walks the
//! elements, then yields `None` once, then starts over.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use crate::error::{Ed247Error, Result};

/// A container a [`HandleCollection`] can walk.
///
/// Implemented for plain vectors of shared handles, ordered maps keyed by
/// id, and vectors of `(key, handle)` pairs. Keyed containers yield the
/// handle, never the key.
pub trait HandleSource {
    type Item: ?Sized;
    type Position: Clone;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of the first element.
    fn first(&self) -> Option<Self::Position>;

    /// Position following `position`, `None` past the last element.
    fn after(&self, position: &Self::Position) -> Option<Self::Position>;

    fn resolve(&self, position: &Self::Position) -> Option<&Arc<Self::Item>>;
}

impl<T: ?Sized> HandleSource for Vec<Arc<T>> {
    type Item = T;
    type Position = usize;

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn first(&self) -> Option<usize> {
        (!Vec::is_empty(self)).then_some(0)
    }

    fn after(&self, position: &usize) -> Option<usize> {
        let next = position + 1;
        (next < Vec::len(self)).then_some(next)
    }

    fn resolve(&self, position: &usize) -> Option<&Arc<T>> {
        self.get(*position)
    }
}

impl<K: Ord + Clone, T: ?Sized> HandleSource for BTreeMap<K, Arc<T>> {
    type Item = T;
    type Position = K;

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn first(&self) -> Option<K> {
        self.keys().next().cloned()
    }

    fn after(&self, position: &K) -> Option<K> {
        self.range((Bound::Excluded(position), Bound::Unbounded))
            .next()
            .map(|(key, _)| key.clone())
    }

    fn resolve(&self, position: &K) -> Option<&Arc<T>> {
        self.get(position)
    }
}

impl<K, T: ?Sized> HandleSource for Vec<(K, Arc<T>)> {
    type Item = T;
    type Position = usize;

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn first(&self) -> Option<usize> {
        (!Vec::is_empty(self)).then_some(0)
    }

    fn after(&self, position: &usize) -> Option<usize> {
        let next = position + 1;
        (next < Vec::len(self)).then_some(next)
    }

    fn resolve(&self, position: &usize) -> Option<&Arc<T>> {
        self.get(*position).map(|(_, handle)| handle)
    }
}

enum Backing<'a, C> {
    Wrapped(&'a C),
    Owned(C),
}

/// Cursor over a [`HandleSource`].
pub struct HandleCollection<'a, C: HandleSource> {
    backing: Backing<'a, C>,
    cursor: Option<C::Position>,
}

impl<'a, C: HandleSource> HandleCollection<'a, C> {
    /// Context-owned view of a container. The collection cannot outlive it.
    pub fn wrap(container: &'a C) -> Self {
        Self {
            backing: Backing::Wrapped(container),
            cursor: None,
        }
    }

    /// Caller-owned collection over an owned snapshot.
    pub fn from_owned(container: C) -> Self {
        Self {
            backing: Backing::Owned(container),
            cursor: None,
        }
    }

    /// Caller-owned copy of a container.
    pub fn copy(container: &C) -> Self
    where
        C: Clone,
    {
        Self::from_owned(container.clone())
    }

    fn container(&self) -> &C {
        match &self.backing {
            Backing::Wrapped(container) => *container,
            Backing::Owned(container) => container,
        }
    }

    pub fn size(&self) -> usize {
        self.container().len()
    }

    pub fn is_empty(&self) -> bool {
        self.container().is_empty()
    }

    /// Whether the component owns the underlying container.
    pub fn is_context_owned(&self) -> bool {
        matches!(self.backing, Backing::Wrapped(_))
    }

    /// Move the cursor before the first element.
    pub fn reset_iterator(&mut self) {
        self.cursor = None;
    }

    /// Element under the cursor, `None` before the first element.
    pub fn get_current(&self) -> Option<Arc<C::Item>> {
        let position = self.cursor.as_ref()?;
        self.container().resolve(position).cloned()
    }

    /// Advance and return the new current element.
    ///
    /// After the last element this yields `None` once, then restarts from
    /// the first.
    pub fn get_next(&mut self) -> Option<Arc<C::Item>> {
        self.cursor = match &self.cursor {
            None => self.container().first(),
            Some(position) => self.container().after(position),
        };
        self.get_current()
    }

    /// Snapshot of every element, in cursor order, without touching the
    /// cursor.
    pub fn iter(&self) -> std::vec::IntoIter<Arc<C::Item>> {
        let container = self.container();
        let mut items = Vec::with_capacity(container.len());
        let mut position = container.first();
        while let Some(current) = position {
            if let Some(item) = container.resolve(&current) {
                items.push(item.clone());
            }
            position = container.after(&current);
        }
        items.into_iter()
    }

    /// Release a caller-owned collection.
    ///
    /// The collection is consumed, so it cannot be used afterwards:
    ///
    /// ```compile_fail
    /// use std::sync::Arc;
    /// use ed247_runtime::HandleCollection;
    ///
    /// let list = HandleCollection::from_owned(vec![Arc::new(1u8)]);
    /// list.release().unwrap();
    /// list.size();
    /// ```
    ///
    /// Releasing a context-owned collection is refused and leaves the
    /// component's container alone.
    pub fn release(self) -> Result<()> {
        match self.backing {
            Backing::Wrapped(_) => Err(Ed247Error::ContextOwned),
            Backing::Owned(container) => {
                drop(container);
                Ok(())
            }
        }
    }
}

impl<C: HandleSource> fmt::Debug for HandleCollection<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleCollection")
            .field("size", &self.size())
            .field("context_owned", &self.is_context_owned())
            .field("at_sentinel", &self.cursor.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handles(n: usize) -> Vec<Arc<usize>> {
        (0..n).map(Arc::new).collect()
    }

    #[test]
    fn full_cycle_yields_each_element_then_sentinel() {
        let items = handles(3);
        let mut list = HandleCollection::wrap(&items);

        let seen: Vec<Option<usize>> = (0..4).map(|_| list.get_next().map(|v| *v)).collect();
        assert_eq!(seen, vec![Some(0), Some(1), Some(2), None]);

        assert_eq!(list.get_next().map(|v| *v), Some(0));
    }

    #[test]
    fn empty_collection_always_yields_none() {
        let items: Vec<Arc<usize>> = Vec::new();
        let mut list = HandleCollection::wrap(&items);
        assert!(list.is_empty());
        for _ in 0..3 {
            assert!(list.get_next().is_none());
        }
    }

    #[test]
    fn current_follows_cursor() {
        let items = handles(2);
        let mut list = HandleCollection::wrap(&items);
        assert!(list.get_current().is_none());
        list.get_next();
        list.get_next();
        assert_eq!(list.get_current().map(|v| *v), Some(1));
        list.reset_iterator();
        assert!(list.get_current().is_none());
        assert_eq!(list.get_next().map(|v| *v), Some(0));
    }

    #[test]
    fn map_source_yields_values_in_key_order() {
        let mut map = BTreeMap::new();
        map.insert(30u16, Arc::new("c"));
        map.insert(10u16, Arc::new("a"));
        map.insert(20u16, Arc::new("b"));

        let mut list = HandleCollection::wrap(&map);
        let mut seen = Vec::new();
        while let Some(value) = list.get_next() {
            seen.push(*value);
        }
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert_eq!(list.size(), 3);
    }

    #[test]
    fn pair_source_yields_values() {
        let pairs = vec![("x".to_string(), Arc::new(1u8)), ("y".to_string(), Arc::new(2u8))];
        let list = HandleCollection::wrap(&pairs);
        let values: Vec<u8> = list.iter().map(|v| *v).collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn wrap_is_context_owned_and_cannot_be_released() {
        let items = handles(1);
        let list = HandleCollection::wrap(&items);
        assert!(list.is_context_owned());
        assert!(matches!(list.release(), Err(Ed247Error::ContextOwned)));
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn copy_is_caller_owned_and_independent() {
        let mut items = handles(2);
        let mut list = HandleCollection::copy(&items);
        items.clear();

        assert!(!list.is_context_owned());
        assert_eq!(list.size(), 2);
        assert_eq!(list.get_next().map(|v| *v), Some(0));
        list.release().expect("caller-owned release should succeed");
    }

    #[test]
    fn iter_does_not_move_cursor() {
        let items = handles(3);
        let mut list = HandleCollection::wrap(&items);
        list.get_next();
        assert_eq!(list.iter().count(), 3);
        assert_eq!(list.get_current().map(|v| *v), Some(0));
    }
}
