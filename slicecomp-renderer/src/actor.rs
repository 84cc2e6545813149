//! Draw actors and the pool that recycles them.
//!
//! Actors live in pool-owned storage and are referred to by [`ActorHandle`].
//! A slot is either spare (on the reuse stack), detached (acquired but not yet
//! keyed) or active (keyed in the active map). Storage only grows.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use slicecomp_core::{Color, Vec3};

use crate::resource::ResourceKey;

/// Number of actors allocated at once when the spare stack runs dry.
pub const DEFAULT_BATCH_SIZE: usize = 8;

/// Index of an actor in its pool's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorHandle(pub u32);

/// Visual state of one drawable: transform, appearance and bound resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub position: Vec3,
    pub scale: Vec3,
    pub color: Color,
    pub opacity: f64,
    pub visible: bool,
    pub texture: Option<ResourceKey>,
    pub geometry: Option<ResourceKey>,
}

impl Default for Actor {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            scale: [1.0, 1.0, 1.0],
            color: Color::WHITE,
            opacity: 1.0,
            visible: true,
            texture: None,
            geometry: None,
        }
    }
}

impl Actor {
    /// Draw-order depth, stored in the z component of the position.
    pub fn depth(&self) -> f64 {
        self.position[2]
    }

    pub fn set_depth(&mut self, z: f64) {
        self.position[2] = z;
    }

    /// Unit transform, default appearance, nothing bound.
    pub fn is_neutral(&self) -> bool {
        *self == Actor::default()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Actor handle {0:?} does not belong to this pool")]
    UnknownHandle(ActorHandle),

    #[error("Actor handle {0:?} is on the spare stack; acquire it first")]
    HandleIsSpare(ActorHandle),
}

#[derive(Debug)]
enum SlotStatus<K> {
    Spare,
    Detached,
    Active(K),
}

#[derive(Debug)]
struct Slot<K> {
    actor: Actor,
    status: SlotStatus<K>,
}

/// A grow-only pool of actors keyed by `K` while in use.
#[derive(Debug)]
pub struct ActorPool<K> {
    slots: Vec<Slot<K>>,
    active: HashMap<K, ActorHandle>,
    spare: Vec<ActorHandle>,
    batch_size: usize,
}

impl<K> ActorPool<K>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self::with_batch_size(DEFAULT_BATCH_SIZE)
    }

    /// Batches smaller than two are raised to two.
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            slots: Vec::new(),
            active: HashMap::new(),
            spare: Vec::new(),
            batch_size: batch_size.max(2),
        }
    }

    /// Take an actor off the spare stack, growing the pool by a batch if needed.
    ///
    /// The returned actor is neutral and not keyed; use [`ActorPool::register`]
    /// to make it findable.
    pub fn acquire(&mut self) -> ActorHandle {
        if self.spare.is_empty() {
            self.grow(self.batch_size);
        }
        // grow() always leaves at least one spare
        let handle = self.spare.pop().unwrap_or_else(|| self.push_slot());
        self.slots[handle.0 as usize].status = SlotStatus::Detached;
        handle
    }

    /// Key an acquired actor. An actor previously registered under `key` is
    /// recycled and returned; if `handle` was keyed differently, the old key is dropped.
    pub fn register(&mut self, key: K, handle: ActorHandle) -> Result<Option<ActorHandle>, PoolError> {
        let slot = self
            .slots
            .get(handle.0 as usize)
            .ok_or(PoolError::UnknownHandle(handle))?;
        match &slot.status {
            SlotStatus::Spare => return Err(PoolError::HandleIsSpare(handle)),
            SlotStatus::Active(old_key) if *old_key == key => return Ok(None),
            SlotStatus::Active(old_key) => {
                let old_key = old_key.clone();
                self.active.remove(&old_key);
            }
            SlotStatus::Detached => {}
        }

        let displaced = match self.active.insert(key.clone(), handle) {
            Some(previous) if previous != handle => {
                // The key moved to a new actor; the old one goes back to the pool.
                self.reset_to_spare(previous);
                Some(previous)
            }
            _ => None,
        };
        self.slots[handle.0 as usize].status = SlotStatus::Active(key);
        Ok(displaced)
    }

    /// Reset an actor to its neutral state and put it back on the spare stack.
    ///
    /// Returns false (and does nothing) for unknown or already spare handles.
    pub fn recycle(&mut self, handle: ActorHandle) -> bool {
        let Some(slot) = self.slots.get(handle.0 as usize) else {
            warn!("recycle of unknown actor {:?}", handle);
            return false;
        };
        match &slot.status {
            SlotStatus::Spare => {
                warn!("actor {:?} recycled twice", handle);
                return false;
            }
            SlotStatus::Active(key) => {
                let key = key.clone();
                self.active.remove(&key);
            }
            SlotStatus::Detached => {}
        }
        self.reset_to_spare(handle);
        true
    }

    /// Recycle the actor registered under `key`, if any.
    pub fn release(&mut self, key: &K) -> Option<ActorHandle> {
        let handle = *self.active.get(key)?;
        self.recycle(handle);
        Some(handle)
    }

    /// Look up an active actor. Never creates one.
    pub fn get_by_key(&self, key: &K) -> Option<ActorHandle> {
        self.active.get(key).copied()
    }

    pub fn actor(&self, handle: ActorHandle) -> Option<&Actor> {
        self.slots.get(handle.0 as usize).map(|s| &s.actor)
    }

    pub fn actor_mut(&mut self, handle: ActorHandle) -> Option<&mut Actor> {
        self.slots.get_mut(handle.0 as usize).map(|s| &mut s.actor)
    }

    pub fn is_spare(&self, handle: ActorHandle) -> bool {
        matches!(
            self.slots.get(handle.0 as usize).map(|s| &s.status),
            Some(SlotStatus::Spare)
        )
    }

    pub fn is_active(&self, handle: ActorHandle) -> bool {
        matches!(
            self.slots.get(handle.0 as usize).map(|s| &s.status),
            Some(SlotStatus::Active(_))
        )
    }

    /// Key of an active actor.
    pub fn key_of(&self, handle: ActorHandle) -> Option<&K> {
        match &self.slots.get(handle.0 as usize)?.status {
            SlotStatus::Active(key) => Some(key),
            _ => None,
        }
    }

    pub fn active(&self) -> impl Iterator<Item = (&K, ActorHandle)> {
        self.active.iter().map(|(k, h)| (k, *h))
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn spare_count(&self) -> usize {
        self.spare.len()
    }

    /// Total number of actors ever allocated.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn reset_to_spare(&mut self, handle: ActorHandle) {
        let slot = &mut self.slots[handle.0 as usize];
        slot.actor = Actor::default();
        slot.status = SlotStatus::Spare;
        self.spare.push(handle);
    }

    fn grow(&mut self, n: usize) {
        debug!(
            "actor pool growing by {} (capacity {} -> {})",
            n,
            self.slots.len(),
            self.slots.len() + n
        );
        // Push in reverse so the lowest new index is handed out first.
        let start = self.slots.len();
        for _ in 0..n {
            self.push_slot();
        }
        self.spare
            .extend((start..start + n).rev().map(|i| ActorHandle(i as u32)));
    }

    fn push_slot(&mut self) -> ActorHandle {
        let handle = ActorHandle(self.slots.len() as u32);
        self.slots.push(Slot {
            actor: Actor::default(),
            status: SlotStatus::Detached,
        });
        handle
    }
}

impl<K> Default for ActorPool<K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_disjoint(pool: &ActorPool<u32>) {
        for i in 0..pool.capacity() {
            let h = ActorHandle(i as u32);
            assert!(
                !(pool.is_spare(h) && pool.is_active(h)),
                "actor {:?} is both spare and active",
                h
            );
        }
        for (_, h) in pool.active() {
            assert!(!pool.spare.contains(&h));
        }
    }

    #[test]
    fn test_acquire_grows_in_batches() {
        let mut pool: ActorPool<u32> = ActorPool::with_batch_size(4);
        let first = pool.acquire();
        assert_eq!(first, ActorHandle(0));
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.spare_count(), 3);

        for _ in 0..3 {
            pool.acquire();
        }
        assert_eq!(pool.capacity(), 4);
        pool.acquire();
        assert_eq!(pool.capacity(), 8);
    }

    #[test]
    fn test_batch_size_is_at_least_two() {
        let pool: ActorPool<u32> = ActorPool::with_batch_size(0);
        assert_eq!(pool.batch_size(), 2);
    }

    #[test]
    fn test_get_by_key_never_fabricates() {
        let mut pool: ActorPool<u32> = ActorPool::new();
        assert!(pool.get_by_key(&7).is_none());
        assert_eq!(pool.capacity(), 0);

        let h = pool.acquire();
        assert!(pool.get_by_key(&7).is_none(), "acquire does not key the actor");
        pool.register(7, h).unwrap();
        assert_eq!(pool.get_by_key(&7), Some(h));
    }

    #[test]
    fn test_recycle_resets_actor() {
        let mut pool: ActorPool<u32> = ActorPool::new();
        let h = pool.acquire();
        pool.register(1, h).unwrap();
        {
            let actor = pool.actor_mut(h).unwrap();
            actor.set_depth(0.3);
            actor.opacity = 0.2;
            actor.color = Color::rgb(1.0, 0.0, 0.0);
            actor.texture = Some(ResourceKey(9));
        }
        assert!(pool.recycle(h));
        assert!(pool.actor(h).unwrap().is_neutral());
        assert!(pool.get_by_key(&1).is_none());
        assert!(pool.is_spare(h));
        assert!(!pool.recycle(h), "double recycle is rejected");

        // Recycled actors are reused before the pool grows.
        let capacity = pool.capacity();
        let again = pool.acquire();
        assert_eq!(again, h);
        assert_eq!(pool.capacity(), capacity);
    }

    #[test]
    fn test_register_errors_and_rekey() {
        let mut pool: ActorPool<u32> = ActorPool::with_batch_size(2);
        assert_eq!(
            pool.register(1, ActorHandle(42)),
            Err(PoolError::UnknownHandle(ActorHandle(42)))
        );
        let a = pool.acquire();
        let b = pool.acquire();
        pool.recycle(b);
        assert_eq!(pool.register(1, b), Err(PoolError::HandleIsSpare(b)));

        pool.register(1, a).unwrap();
        pool.register(2, a).unwrap();
        assert!(pool.get_by_key(&1).is_none());
        assert_eq!(pool.key_of(a), Some(&2));

        // Re-keying to a fresh actor sends the old one back.
        let c = pool.acquire();
        assert_eq!(pool.register(2, c).unwrap(), Some(a));
        assert!(pool.is_spare(a));
        assert_disjoint(&pool);
    }

    #[test]
    fn test_release() {
        let mut pool: ActorPool<u32> = ActorPool::new();
        let h = pool.acquire();
        pool.register(5, h).unwrap();
        assert_eq!(pool.release(&5), Some(h));
        assert_eq!(pool.release(&5), None);
        assert!(pool.is_spare(h));
    }

    #[test]
    fn test_pool_invariant_over_sequence() {
        let mut pool: ActorPool<u32> = ActorPool::with_batch_size(3);
        let mut live: Vec<(u32, ActorHandle)> = Vec::new();
        // Deterministic interleaving of acquire and recycle.
        for step in 0u32..200 {
            if step % 3 == 2 && !live.is_empty() {
                let idx = (step as usize * 7) % live.len();
                let (_, h) = live.swap_remove(idx);
                assert!(pool.recycle(h));
            } else {
                let h = pool.acquire();
                assert!(!pool.is_active(h), "acquire returned an active actor");
                assert!(pool.actor(h).unwrap().is_neutral());
                pool.register(step, h).unwrap();
                live.push((step, h));
            }
            assert_disjoint(&pool);
            assert_eq!(pool.active_count() + pool.spare_count(), pool.capacity());
        }
    }
}
