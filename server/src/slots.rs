//! Fixed-capacity arena handing out small integer ids.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("all {capacity} slots are in use")]
pub struct PoolExhausted {
    pub capacity: usize,
}

/// Dense slot storage indexed by id, with a free list of unused ids.
///
/// An id is owned by its value from `insert` until `remove`; after removal it
/// is immediately available again and is the next one handed out.
#[derive(Debug)]
pub struct SlotArena<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
}

impl<T> SlotArena<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        Self {
            slots,
            // Reversed so that id 0 is handed out first.
            free: (0..capacity as u32).rev().collect(),
        }
    }

    pub fn insert(&mut self, value: T) -> Result<u32, PoolExhausted> {
        let id = self.free.pop().ok_or(PoolExhausted {
            capacity: self.capacity(),
        })?;
        self.slots[id as usize] = Some(value);
        Ok(id)
    }

    pub fn remove(&mut self, id: u32) -> Option<T> {
        let value = self.slots.get_mut(id as usize)?.take()?;
        self.free.push(id);
        Some(value)
    }

    pub fn get(&self, id: u32) -> Option<&T> {
        self.slots.get(id as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        self.slots.get_mut(id as usize)?.as_mut()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.get(id).is_some()
    }

    /// Occupied slots in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|value| (id as u32, value)))
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_fill_to_capacity_gives_distinct_ids() {
        let mut arena = SlotArena::with_capacity(8);
        let ids: HashSet<u32> = (0..8).map(|n| arena.insert(n).unwrap()).collect();

        assert_eq!(ids, (0..8).collect::<HashSet<u32>>());
        assert_eq!(arena.len(), 8);
        assert_eq!(arena.insert(99), Err(PoolExhausted { capacity: 8 }));
    }

    #[test]
    fn test_freed_id_is_reused_first() {
        let mut arena = SlotArena::with_capacity(4);
        for n in 0..4 {
            arena.insert(n).unwrap();
        }

        assert_eq!(arena.remove(2), Some(2));
        assert!(!arena.contains(2));
        assert_eq!(arena.insert(42).unwrap(), 2);
        assert_eq!(arena.get(2), Some(&42));
    }

    #[test]
    fn test_remove_twice() {
        let mut arena = SlotArena::with_capacity(2);
        let id = arena.insert("a").unwrap();
        assert_eq!(arena.remove(id), Some("a"));
        assert_eq!(arena.remove(id), None);
        assert_eq!(arena.remove(57), None);
        assert!(arena.is_empty());
    }

    #[test]
    fn test_iter_in_id_order() {
        let mut arena = SlotArena::with_capacity(3);
        arena.insert('a').unwrap();
        arena.insert('b').unwrap();
        arena.insert('c').unwrap();
        arena.remove(1);

        let items: Vec<(u32, char)> = arena.iter().map(|(id, c)| (id, *c)).collect();
        assert_eq!(items, vec![(0, 'a'), (2, 'c')]);
    }

    #[test]
    fn test_get_mut() {
        let mut arena = SlotArena::with_capacity(1);
        let id = arena.insert(1).unwrap();
        *arena.get_mut(id).unwrap() += 1;
        assert_eq!(arena.get(id), Some(&2));
    }
}
