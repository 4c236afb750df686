//! Process-local identifier directory.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use ebb_types::EbbId;

use crate::error::{EbbError, Result};

/// Opaque value stored under an identifier.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Outcome of [`LocalIdMap::insert`]. Both variants carry the value that is
/// stored once the call returns.
#[derive(Clone, Debug)]
pub enum Insertion<V> {
    /// This call stored the value.
    Inserted(V),
    /// Another caller got there first; this is its value.
    Existing(V),
}

impl<V> Insertion<V> {
    /// `true` if this call stored the value.
    pub fn inserted(&self) -> bool {
        matches!(self, Insertion::Inserted(_))
    }

    /// The value now stored, whoever stored it.
    pub fn value(&self) -> &V {
        match self {
            Insertion::Inserted(v) | Insertion::Existing(v) => v,
        }
    }

    pub fn into_value(self) -> V {
        match self {
            Insertion::Inserted(v) | Insertion::Existing(v) => v,
        }
    }
}

/// Concurrent map from identifier to an opaque payload.
///
/// Lookups share a read lock. Inserts take the write lock and never
/// overwrite: the first value stored under an id stays there.
#[derive(Default)]
pub struct LocalIdMap {
    entries: RwLock<HashMap<EbbId, Payload>>,
}

impl LocalIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The payload stored under `id`, untyped.
    pub fn find(&self, id: EbbId) -> Option<Payload> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Store `value` unless `id` is already taken.
    pub fn insert(&self, id: EbbId, value: Payload) -> Insertion<Payload> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&id) {
            Some(existing) => Insertion::Existing(Arc::clone(existing)),
            None => {
                entries.insert(id, Arc::clone(&value));
                Insertion::Inserted(value)
            }
        }
    }

    /// Typed lookup. `None` if absent or stored with another type.
    pub fn get<T: Any + Send + Sync>(&self, id: EbbId) -> Option<Arc<T>> {
        self.find(id)?.downcast::<T>().ok()
    }

    /// Typed insert. Fails if the winning value has a different type.
    pub fn insert_typed<T: Any + Send + Sync>(
        &self,
        id: EbbId,
        value: Arc<T>,
    ) -> Result<Insertion<Arc<T>>> {
        let typed = match self.insert(id, value) {
            Insertion::Inserted(v) => v.downcast::<T>().map(Insertion::Inserted),
            Insertion::Existing(v) => v.downcast::<T>().map(Insertion::Existing),
        };
        typed.map_err(|_| EbbError::TypeMismatch {
            id,
            expected: std::any::type_name::<T>(),
        })
    }

    /// Returns `true` if anything is stored under `id`.
    pub fn contains(&self, id: EbbId) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for LocalIdMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalIdMap").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    const ID: EbbId = EbbId::new(1, 9);

    #[test]
    fn find_after_insert() {
        let map = LocalIdMap::new();
        assert!(map.find(ID).is_none());
        let outcome = map.insert(ID, Arc::new(5u32));
        assert!(outcome.inserted());
        assert!(map.contains(ID));
        assert_eq!(map.get::<u32>(ID).as_deref(), Some(&5));
        assert!(map.get::<String>(ID).is_none());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn second_insert_keeps_first_value() {
        let map = LocalIdMap::new();
        map.insert_typed(ID, Arc::new(1u32)).unwrap();
        let outcome = map.insert_typed(ID, Arc::new(2u32)).unwrap();
        assert!(!outcome.inserted());
        assert_eq!(**outcome.value(), 1);
        assert_eq!(map.get::<u32>(ID).as_deref(), Some(&1));
    }

    #[test]
    fn typed_insert_rejects_foreign_winner() {
        let map = LocalIdMap::new();
        map.insert(ID, Arc::new("text"));
        assert!(matches!(
            map.insert_typed(ID, Arc::new(1u32)),
            Err(EbbError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn racing_inserts_agree_on_one_value() {
        let map = Arc::new(LocalIdMap::new());
        let barrier = Arc::new(Barrier::new(16));
        let handles: Vec<_> = (0..16u32)
            .map(|v| {
                let map = Arc::clone(&map);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let outcome = map.insert_typed(ID, Arc::new(v)).unwrap();
                    (outcome.inserted(), *outcome.into_value())
                })
            })
            .collect();
        let results: Vec<(bool, u32)> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|(won, _)| *won).count(), 1);
        let stored = *map.get::<u32>(ID).unwrap();
        assert!(results.iter().all(|(_, seen)| *seen == stored));
        let winner = results.iter().find(|(won, _)| *won).unwrap().1;
        assert_eq!(winner, stored);
    }
}
