//! Generational slot storage for scheduled events.
//!
//! The arena owns every pending `Event`. An [`EventId`] names a slot plus
//! the generation that slot had when the event was stored; freeing a slot
//! bumps its generation, so stale handles stop matching without any
//! back-pointer from the event to its handles.

use crate::event::{Event, EventId};

#[derive(Debug)]
struct Slot {
    generation: u32,
    event: Option<Event>,
}

#[derive(Debug, Default)]
pub(crate) struct EventArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl EventArena {
    pub(crate) fn new() -> Self {
        EventArena {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Store an event and return its `(slot, generation)` coordinates.
    pub(crate) fn insert(&mut self, event: Event) -> (u32, u32) {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.event.is_none(), "free list points at an occupied slot");
            slot.event = Some(event);
            return (index, slot.generation);
        }

        let index = u32::try_from(self.slots.len())
            .ok()
            .filter(|&i| i != EventId::INVALID_SLOT)
            .unwrap_or_else(|| panic!("event arena exhausted"));
        self.slots.push(Slot {
            generation: 0,
            event: Some(event),
        });
        (index, 0)
    }

    /// The event a handle refers to, if the handle is still current.
    pub(crate) fn get(&self, id: &EventId) -> Option<&Event> {
        let slot = self.slots.get(id.slot as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.event.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: &EventId) -> Option<&mut Event> {
        let slot = self.slots.get_mut(id.slot as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.event.as_mut()
    }

    /// `true` if the slot holds an event that has not been cancelled.
    pub(crate) fn is_live(&self, index: u32) -> bool {
        self.slots
            .get(index as usize)
            .and_then(|slot| slot.event.as_ref())
            .is_some_and(|event| !event.is_cancelled())
    }

    /// Free a slot by index, returning the event it held.
    ///
    /// Used by the dispatch loop, which knows slots from queue entries
    /// rather than from caller handles.
    pub(crate) fn take(&mut self, index: u32) -> Option<Event> {
        let slot = self.slots.get_mut(index as usize)?;
        let event = slot.event.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.live -= 1;
        Some(event)
    }

    /// Free the slot a handle refers to, if the handle is still current.
    pub(crate) fn remove(&mut self, id: &EventId) -> Option<Event> {
        self.get(id)?;
        self.take(id.slot)
    }

    /// Number of occupied slots (including cancelled-but-queued events).
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Drop every stored event and release the slot storage.
    pub(crate) fn clear(&mut self) {
        self.slots = Vec::new();
        self.free = Vec::new();
        self.live = 0;
    }
}
