// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The transactional object store. State records live in typed tables
//! addressed by stable numeric ids; every table maintains its secondary
//! indexes through the [`StateObject`] hooks so they never drift from the
//! rows. Mutations are journaled into nested undo frames that can be
//! rolled back (fork switches, failed transactions), squashed into their
//! parent (successful nested evaluation), or committed away once a block
//! becomes irreversible.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{type_name} object {id} not found")]
    NotFound { type_name: &'static str, id: u64 },
    #[error("no undo session is open")]
    NoSession,
    #[error("cannot squash the outermost undo session")]
    SquashOutermost,
    #[error("operation requires all undo sessions closed")]
    SessionsOpen,
}

/// Stable identity of one row in one table. The phantom keeps ids of
/// different object types from mixing.
pub struct ObjectId<T>(u64, PhantomData<fn() -> T>);

impl<T> ObjectId<T> {
    pub const fn new(raw: u64) -> ObjectId<T> {
        ObjectId(raw, PhantomData)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl<T> Clone for ObjectId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ObjectId<T> {}

impl<T> PartialEq for ObjectId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> Eq for ObjectId<T> {}

impl<T> PartialOrd for ObjectId<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for ObjectId<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl<T> std::hash::Hash for ObjectId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<T> fmt::Debug for ObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl<T> fmt::Display for ObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T> Serialize for ObjectId<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for ObjectId<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(ObjectId::new(u64::deserialize(deserializer)?))
    }
}

/// A record type stored in a [`Table`]. `Indexes` is the bundle of
/// secondary maps kept in lockstep with the rows.
pub trait StateObject: Clone {
    type Indexes: Default;

    const TYPE_NAME: &'static str;

    fn index_insert(indexes: &mut Self::Indexes, id: ObjectId<Self>, obj: &Self);
    fn index_remove(indexes: &mut Self::Indexes, id: ObjectId<Self>, obj: &Self);
}

/// One layer of journaled inverses. `modified` and `removed` hold the
/// value as it was when this layer first touched it.
struct UndoFrame<T: StateObject> {
    old_next_id: u64,
    created: BTreeSet<ObjectId<T>>,
    modified: BTreeMap<ObjectId<T>, T>,
    removed: BTreeMap<ObjectId<T>, T>,
}

impl<T: StateObject> UndoFrame<T> {
    fn new(next_id: u64) -> UndoFrame<T> {
        UndoFrame {
            old_next_id: next_id,
            created: BTreeSet::new(),
            modified: BTreeMap::new(),
            removed: BTreeMap::new(),
        }
    }
}

/// A typed table with journaling and derived secondary indexes.
pub struct Table<T: StateObject> {
    rows: BTreeMap<ObjectId<T>, T>,
    pub indexes: T::Indexes,
    next_id: u64,
    undo: Vec<UndoFrame<T>>,
}

impl<T: StateObject> Default for Table<T> {
    fn default() -> Self {
        Table {
            rows: BTreeMap::new(),
            indexes: T::Indexes::default(),
            next_id: 0,
            undo: Vec::new(),
        }
    }
}

impl<T: StateObject> Table<T> {
    /// Insert a new row built from its assigned id.
    pub fn insert(&mut self, build: impl FnOnce(ObjectId<T>) -> T) -> ObjectId<T> {
        let id = ObjectId::new(self.next_id);
        self.next_id += 1;
        let obj = build(id);
        T::index_insert(&mut self.indexes, id, &obj);
        self.rows.insert(id, obj);
        if let Some(frame) = self.undo.last_mut() {
            frame.created.insert(id);
        }
        id
    }

    pub fn get(&self, id: ObjectId<T>) -> Result<&T, Error> {
        self.rows.get(&id).ok_or(Error::NotFound {
            type_name: T::TYPE_NAME,
            id: id.raw(),
        })
    }

    pub fn contains(&self, id: ObjectId<T>) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId<T>, &T)> {
        self.rows.iter().map(|(id, obj)| (*id, obj))
    }

    /// Mutate a row in place; the journal keeps the pre-image, the
    /// secondary indexes follow the new value.
    pub fn modify(&mut self, id: ObjectId<T>, mutate: impl FnOnce(&mut T)) -> Result<(), Error> {
        let obj = self.rows.get_mut(&id).ok_or(Error::NotFound {
            type_name: T::TYPE_NAME,
            id: id.raw(),
        })?;
        if let Some(frame) = self.undo.last_mut() {
            if !frame.created.contains(&id) && !frame.modified.contains_key(&id) {
                frame.modified.insert(id, obj.clone());
            }
        }
        T::index_remove(&mut self.indexes, id, obj);
        mutate(obj);
        T::index_insert(&mut self.indexes, id, obj);
        Ok(())
    }

    pub fn remove(&mut self, id: ObjectId<T>) -> Result<T, Error> {
        let obj = self.rows.remove(&id).ok_or(Error::NotFound {
            type_name: T::TYPE_NAME,
            id: id.raw(),
        })?;
        T::index_remove(&mut self.indexes, id, &obj);
        if let Some(frame) = self.undo.last_mut() {
            if frame.created.remove(&id) {
                // Created and removed within one layer cancels out.
            } else if let Some(old) = frame.modified.remove(&id) {
                frame.removed.insert(id, old);
            } else {
                frame.removed.insert(id, obj.clone());
            }
        }
        Ok(obj)
    }

    pub(crate) fn begin(&mut self) {
        self.undo.push(UndoFrame::new(self.next_id));
    }

    /// Apply the inverses of the top frame and drop it.
    pub(crate) fn undo(&mut self) {
        let Some(frame) = self.undo.pop() else { return };
        for id in frame.created {
            if let Some(obj) = self.rows.remove(&id) {
                T::index_remove(&mut self.indexes, id, &obj);
            }
        }
        for (id, old) in frame.modified {
            if let Some(obj) = self.rows.get_mut(&id) {
                T::index_remove(&mut self.indexes, id, obj);
                *obj = old;
                T::index_insert(&mut self.indexes, id, obj);
            }
        }
        for (id, old) in frame.removed {
            T::index_insert(&mut self.indexes, id, &old);
            self.rows.insert(id, old);
        }
        self.next_id = frame.old_next_id;
    }

    /// Merge the top frame into its parent, keeping the parent's older
    /// pre-images where both layers touched a row.
    pub(crate) fn squash(&mut self) {
        let Some(top) = self.undo.pop() else { return };
        let Some(parent) = self.undo.last_mut() else {
            return;
        };
        for id in top.created {
            parent.created.insert(id);
        }
        for (id, old) in top.modified {
            if !parent.created.contains(&id) && !parent.modified.contains_key(&id) {
                parent.modified.insert(id, old);
            }
        }
        for (id, old) in top.removed {
            if parent.created.remove(&id) {
                // Net effect of the two layers: never existed.
            } else if let Some(parent_old) = parent.modified.remove(&id) {
                parent.removed.insert(id, parent_old);
            } else {
                parent.removed.insert(id, old);
            }
        }
    }

    /// Drop the oldest frame, making its changes permanent.
    pub(crate) fn commit_oldest(&mut self) {
        if !self.undo.is_empty() {
            self.undo.remove(0);
        }
    }

    #[cfg(test)]
    fn undo_depth(&self) -> usize {
        self.undo.len()
    }
}

/// A single undoable value, for the handful of chain-global records that
/// have exactly one instance.
pub struct Singleton<T: Clone> {
    value: T,
    undo: Vec<Option<T>>,
}

impl<T: Clone + Default> Default for Singleton<T> {
    fn default() -> Self {
        Singleton {
            value: T::default(),
            undo: Vec::new(),
        }
    }
}

impl<T: Clone> Singleton<T> {
    pub fn new(value: T) -> Singleton<T> {
        Singleton {
            value,
            undo: Vec::new(),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn modify(&mut self, mutate: impl FnOnce(&mut T)) {
        if let Some(slot) = self.undo.last_mut() {
            if slot.is_none() {
                *slot = Some(self.value.clone());
            }
        }
        mutate(&mut self.value);
    }

    /// Replace wholesale. Genesis seeding.
    pub fn set(&mut self, value: T) {
        self.modify(|v| *v = value);
    }

    pub(crate) fn begin(&mut self) {
        self.undo.push(None);
    }

    pub(crate) fn undo(&mut self) {
        if let Some(Some(old)) = self.undo.pop() {
            self.value = old;
        }
    }

    pub(crate) fn squash(&mut self) {
        let Some(top) = self.undo.pop() else { return };
        if let Some(parent) = self.undo.last_mut() {
            if parent.is_none() {
                *parent = top;
            }
        }
    }

    pub(crate) fn commit_oldest(&mut self) {
        if !self.undo.is_empty() {
            self.undo.remove(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Clone, Debug, PartialEq)]
    struct Pet {
        name: String,
        legs: u8,
    }

    #[derive(Default)]
    struct PetIndexes {
        by_name: BTreeMap<String, ObjectId<Pet>>,
        by_legs: BTreeMap<(u8, ObjectId<Pet>), ()>,
    }

    impl StateObject for Pet {
        type Indexes = PetIndexes;

        const TYPE_NAME: &'static str = "pet";

        fn index_insert(ix: &mut PetIndexes, id: ObjectId<Pet>, obj: &Pet) {
            ix.by_name.insert(obj.name.clone(), id);
            ix.by_legs.insert((obj.legs, id), ());
        }

        fn index_remove(ix: &mut PetIndexes, id: ObjectId<Pet>, obj: &Pet) {
            ix.by_name.remove(&obj.name);
            ix.by_legs.remove(&(obj.legs, id));
        }
    }

    fn pet(name: &str, legs: u8) -> impl FnOnce(ObjectId<Pet>) -> Pet + '_ {
        move |_| Pet {
            name: name.to_owned(),
            legs,
        }
    }

    #[test]
    fn indexes_follow_mutation() {
        let mut table: Table<Pet> = Table::default();
        let cat = table.insert(pet("cat", 4));
        assert_eq!(table.indexes.by_name.get("cat"), Some(&cat));
        table.modify(cat, |p| p.legs = 3).unwrap();
        assert!(table.indexes.by_legs.contains_key(&(3, cat)));
        assert!(!table.indexes.by_legs.contains_key(&(4, cat)));
        table.remove(cat).unwrap();
        assert!(table.indexes.by_name.is_empty());
        assert!(table.indexes.by_legs.is_empty());
    }

    #[test]
    fn undo_restores_all_three_change_kinds() {
        let mut table: Table<Pet> = Table::default();
        let cat = table.insert(pet("cat", 4));
        let dog = table.insert(pet("dog", 4));

        table.begin();
        let bird = table.insert(pet("bird", 2));
        table.modify(cat, |p| p.legs = 3).unwrap();
        table.remove(dog).unwrap();
        assert!(table.contains(bird));

        table.undo();
        assert!(!table.contains(bird));
        assert_eq!(table.get(cat).unwrap().legs, 4);
        assert_eq!(table.get(dog).unwrap().name, "dog");
        assert_eq!(table.indexes.by_name.len(), 2);
        // Ids released by the undo are reused.
        let bird2 = table.insert(pet("bird", 2));
        assert_eq!(bird2.raw(), bird.raw());
    }

    #[test]
    fn squash_keeps_oldest_preimage() {
        let mut table: Table<Pet> = Table::default();
        let cat = table.insert(pet("cat", 4));

        table.begin();
        table.modify(cat, |p| p.legs = 3).unwrap();
        table.begin();
        table.modify(cat, |p| p.legs = 2).unwrap();
        table.squash();
        assert_eq!(table.undo_depth(), 1);

        table.undo();
        assert_eq!(table.get(cat).unwrap().legs, 4);
    }

    #[test]
    fn squash_created_then_removed_cancels() {
        let mut table: Table<Pet> = Table::default();
        table.begin();
        let cat = table.insert(pet("cat", 4));
        table.begin();
        table.remove(cat).unwrap();
        table.squash();
        table.undo();
        assert!(table.is_empty());
        assert!(table.indexes.by_name.is_empty());
    }

    #[test]
    fn commit_discards_undo_data_only() {
        let mut table: Table<Pet> = Table::default();
        table.begin();
        let cat = table.insert(pet("cat", 4));
        table.begin();
        table.modify(cat, |p| p.legs = 3).unwrap();
        table.commit_oldest();
        assert_eq!(table.undo_depth(), 1);
        // The remaining frame still reverts the modify but the create is
        // permanent now.
        table.undo();
        assert_eq!(table.get(cat).unwrap().legs, 4);
    }

    #[test]
    fn singleton_undo_and_squash() {
        let mut s = Singleton::new(7u32);
        s.begin();
        s.modify(|v| *v = 8);
        s.begin();
        s.modify(|v| *v = 9);
        s.squash();
        assert_eq!(*s.get(), 9);
        s.undo();
        assert_eq!(*s.get(), 7);
    }

    #[test]
    fn remove_then_undo_within_modified_layer() {
        let mut table: Table<Pet> = Table::default();
        let cat = table.insert(pet("cat", 4));
        table.begin();
        table.modify(cat, |p| p.legs = 3).unwrap();
        table.remove(cat).unwrap();
        table.undo();
        // Restores the pre-session value, not the modified one.
        assert_eq!(table.get(cat).unwrap().legs, 4);
    }
}
