//! Single-subscriber notification slot.
//!
//! Handlers receive `&mut A`, which is usually the owner of the slot itself.
//! The owner takes the handler out, calls it with `&mut self`, then restores
//! it, so a handler can issue new commands on the owner from inside the
//! notification.

use std::fmt;

type Handler<A> = Box<dyn FnMut(&mut A) + Send>;

pub struct EventSlot<A> {
    handler: Option<Handler<A>>,
    generation: u64,
}

/// A handler temporarily removed from its slot for dispatch.
pub struct TakenHandler<A> {
    handler: Handler<A>,
    generation: u64,
}

impl<A> EventSlot<A> {
    pub fn new() -> Self {
        Self { handler: None, generation: 0 }
    }

    /// Install `handler`, replacing any previous subscriber.
    pub fn set<F>(&mut self, handler: F)
    where
        F: FnMut(&mut A) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
        self.generation += 1;
    }

    pub fn clear(&mut self) {
        self.handler = None;
        self.generation += 1;
    }

    pub fn is_set(&self) -> bool {
        self.handler.is_some()
    }

    pub fn take(&mut self) -> Option<TakenHandler<A>> {
        let generation = self.generation;
        self.handler.take().map(|handler| TakenHandler { handler, generation })
    }

    /// Put a taken handler back unless the slot was set or cleared while it
    /// was out.
    pub fn restore(&mut self, taken: TakenHandler<A>) {
        if self.generation == taken.generation && self.handler.is_none() {
            self.handler = Some(taken.handler);
        }
    }
}

impl<A> TakenHandler<A> {
    pub fn call(&mut self, arg: &mut A) {
        (self.handler)(arg);
    }
}

impl<A> Default for EventSlot<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for EventSlot<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSlot")
            .field("subscribed", &self.handler.is_some())
            .finish()
    }
}
