//! Named-event dispatch for tables and live views.
//!
//! An `EventBus` keeps an ordered list of listeners. Each listener is bound
//! to one event name, or to the wildcard `all` channel which receives every
//! event together with its name. Dispatch is synchronous and handlers of one
//! trigger fire in reverse registration order, newest first.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

/// Name of the wildcard channel.
pub const ALL_EVENTS: &str = "all";

/// Unique identifier for a listener.
pub type ListenerId = u64;

/// Opaque owner tag used to drop a group of listeners at once.
pub type ContextId = u64;

/// A payload that can be dispatched through an `EventBus`.
pub trait Event {
    /// Name of the channel this payload is delivered on.
    fn name(&self) -> &'static str;
}

type Handler<E> = Box<dyn FnMut(&str, &E)>;

struct Listener<E> {
    id: ListenerId,
    event: String,
    context: Option<ContextId>,
    once: bool,
    handler: Handler<E>,
}

impl<E> Listener<E> {
    fn matches(&self, name: &str) -> bool {
        self.event == name || self.event == ALL_EVENTS
    }
}

/// Listener registry for one table or view.
pub struct EventBus<E> {
    listeners: Vec<Listener<E>>,
    next_id: ListenerId,
}

impl<E: Event> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> core::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<E: Event> EventBus<E> {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 1,
        }
    }

    fn register(
        &mut self,
        event: &str,
        context: Option<ContextId>,
        once: bool,
        handler: Handler<E>,
    ) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push(Listener {
            id,
            event: event.into(),
            context,
            once,
            handler,
        });
        id
    }

    /// Registers a handler for `event`.
    ///
    /// Handlers registered on `all` also receive the event name through
    /// `on_all`; registered here they only see the payload.
    pub fn on<F>(&mut self, event: &str, mut handler: F) -> ListenerId
    where
        F: FnMut(&E) + 'static,
    {
        self.register(event, None, false, Box::new(move |_, e| handler(e)))
    }

    /// Registers a handler owned by `context`, see `off_context`.
    pub fn on_with_context<F>(&mut self, event: &str, context: ContextId, mut handler: F) -> ListenerId
    where
        F: FnMut(&E) + 'static,
    {
        self.register(event, Some(context), false, Box::new(move |_, e| handler(e)))
    }

    /// Registers a handler that is removed after its first invocation.
    pub fn once<F>(&mut self, event: &str, mut handler: F) -> ListenerId
    where
        F: FnMut(&E) + 'static,
    {
        self.register(event, None, true, Box::new(move |_, e| handler(e)))
    }

    /// Registers a handler on the wildcard channel.
    pub fn on_all<F>(&mut self, handler: F) -> ListenerId
    where
        F: FnMut(&str, &E) + 'static,
    {
        self.register(ALL_EVENTS, None, false, Box::new(handler))
    }

    /// Removes one listener. Returns true if it was registered.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    /// Removes every listener owned by `context`.
    pub fn off_context(&mut self, context: ContextId) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.context != Some(context));
        before - self.listeners.len()
    }

    /// Removes every listener bound to `event`.
    pub fn off_event(&mut self, event: &str) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.event != event);
        before - self.listeners.len()
    }

    /// Delivers `event` to its listeners and to the wildcard channel.
    ///
    /// Returns the number of handlers invoked.
    pub fn trigger(&mut self, event: &E) -> usize {
        let name = event.name();
        let mut fired = 0;
        let mut spent = Vec::new();

        for listener in self.listeners.iter_mut().rev() {
            if listener.matches(name) {
                (listener.handler)(name, event);
                fired += 1;
                if listener.once {
                    spent.push(listener.id);
                }
            }
        }

        if !spent.is_empty() {
            self.listeners.retain(|l| !spent.contains(&l.id));
        }
        fired
    }

    /// Returns the number of registered listeners.
    #[inline]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Returns true if a trigger of `event` would reach any handler.
    pub fn has_listeners(&self, event: &str) -> bool {
        self.listeners.iter().any(|l| l.matches(event))
    }

    /// Removes every listener.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}
