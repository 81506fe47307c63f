use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::event::types::{EventKind, StageAction, StageEvent, ValidationEvent};
use crate::event::EventId;

/// Handler type stored by the dispatcher
pub type EventHandler = Arc<dyn Fn(&ValidationEvent) + Send + Sync>;

//--------------------------------------------------
// Dispatcher (Internal, wrapped by EventBus)
//--------------------------------------------------

struct Dispatcher {
    handlers: Vec<(EventId, Option<EventKind>, EventHandler)>,
    next_handler_id: EventId,
}

impl Dispatcher {
    fn new() -> Self {
        Self {
            handlers: Vec::new(),
            next_handler_id: 1,
        }
    }

    fn register(&mut self, kind: Option<EventKind>, handler: EventHandler) -> EventId {
        let id = self.next_handler_id;
        self.next_handler_id += 1;
        self.handlers.push((id, kind, handler));
        id
    }

    fn unregister(&mut self, id: EventId) -> bool {
        let len_before = self.handlers.len();
        self.handlers.retain(|(h_id, _, _)| *h_id != id);
        self.handlers.len() < len_before
    }

    fn matching(&self, kind: EventKind) -> Vec<EventHandler> {
        self.handlers
            .iter()
            .filter(|(_, filter, _)| filter.is_none_or(|k| k == kind))
            .map(|(_, _, handler)| Arc::clone(handler))
            .collect()
    }
}

//--------------------------------------------------
// EventBus (Public API)
//--------------------------------------------------

/// Shared, synchronous event bus.
///
/// Handlers run on the emitting task, in subscription order, outside of the
/// internal lock, so a handler may subscribe or unsubscribe while it runs.
#[derive(Clone)]
pub struct EventBus {
    dispatcher: Arc<Mutex<Dispatcher>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            dispatcher: Arc::new(Mutex::new(Dispatcher::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Dispatcher> {
        self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, kind: Option<EventKind>, handler: EventHandler) -> Subscription {
        let id = self.lock().register(kind, handler);
        Subscription {
            id,
            dispatcher: Arc::downgrade(&self.dispatcher),
        }
    }

    /// Subscribe to every event
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ValidationEvent) + Send + Sync + 'static,
    {
        self.register(None, Arc::new(handler))
    }

    /// Subscribe to one kind of event
    pub fn subscribe_kind<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&ValidationEvent) + Send + Sync + 'static,
    {
        self.register(Some(kind), Arc::new(handler))
    }

    pub fn subscribe_run_started<F>(&self, handler: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe_kind(EventKind::RunStarted, move |_| handler())
    }

    pub fn subscribe_run_finished<F>(&self, handler: F) -> Subscription
    where
        F: Fn(bool, Option<&str>) + Send + Sync + 'static,
    {
        self.subscribe_kind(EventKind::RunFinished, move |event| {
            if let ValidationEvent::RunFinished { success, message } = event {
                handler(*success, message.as_deref());
            }
        })
    }

    pub fn subscribe_run_paused<F>(&self, handler: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.subscribe_kind(EventKind::RunPaused, move |event| {
            if let ValidationEvent::RunPaused(paused) = event {
                handler(*paused);
            }
        })
    }

    pub fn subscribe_run_stopped<F>(&self, handler: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe_kind(EventKind::RunStopped, move |_| handler())
    }

    pub fn subscribe_progress<F>(&self, handler: F) -> Subscription
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.subscribe_kind(EventKind::Progress, move |event| {
            if let ValidationEvent::Progress(value) = event {
                handler(*value);
            }
        })
    }

    /// Subscribe to stage outcomes of one action
    pub fn subscribe_stage<F>(&self, action: StageAction, handler: F) -> Subscription
    where
        F: Fn(&StageEvent) + Send + Sync + 'static,
    {
        self.subscribe_kind(EventKind::Stage, move |event| {
            if let ValidationEvent::Stage(stage) = event {
                if stage.action == action {
                    handler(stage);
                }
            }
        })
    }

    pub fn subscribe_check<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&StageEvent) + Send + Sync + 'static,
    {
        self.subscribe_stage(StageAction::Check, handler)
    }

    pub fn subscribe_fix<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&StageEvent) + Send + Sync + 'static,
    {
        self.subscribe_stage(StageAction::Fix, handler)
    }

    pub fn subscribe_select<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&StageEvent) + Send + Sync + 'static,
    {
        self.subscribe_stage(StageAction::Select, handler)
    }

    pub fn subscribe_result<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&StageEvent) + Send + Sync + 'static,
    {
        self.subscribe_stage(StageAction::Result, handler)
    }

    /// Unregister a handler by its ID
    pub fn unsubscribe(&self, id: EventId) -> bool {
        self.lock().unregister(id)
    }

    /// Dispatch an event to every matching handler
    pub fn emit(&self, event: &ValidationEvent) {
        let handlers = self.lock().matching(event.kind());
        log::trace!("Dispatching '{}' to {} handler(s)", event.name(), handlers.len());
        for handler in handlers {
            handler(event);
        }
    }

    /// Drop every registered handler
    pub fn clear(&self) {
        self.lock().handlers.clear();
    }

    pub fn handler_count(&self) -> usize {
        self.lock().handlers.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for a registered handler; the handler is removed when it drops.
#[must_use = "dropping a Subscription unsubscribes its handler immediately"]
pub struct Subscription {
    id: EventId,
    dispatcher: Weak<Mutex<Dispatcher>>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Subscription {
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Remove the handler now
    pub fn unsubscribe(self) {
        // Drop does the work
    }

    /// Keep the handler registered for the lifetime of the bus
    pub fn detach(mut self) {
        self.dispatcher = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.dispatcher.upgrade() {
            dispatcher
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .unregister(self.id);
        }
    }
}
