//! Tracks the text the reader currently has highlighted.
//!
//! The observer is fed mouse-up / key-up events, reads the platform's active
//! selection through a [`SelectionSource`], and broadcasts changes to its
//! listeners. Consumers that only need a point-in-time value (the chat
//! composer at send time) call [`SelectionObserver::selected_text`] instead
//! of subscribing.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::debug;

/// Where the raw selection comes from.
pub trait SelectionSource: Send + Sync {
    /// The active selection's text, or `None` when the platform offers no
    /// selection API or nothing is selected.
    fn selected_text(&self) -> Option<String>;
}

/// A source with no selection API. The observer degrades to `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSelection;

impl SelectionSource for NoSelection {
    fn selected_text(&self) -> Option<String> {
        None
    }
}

/// A source whose selection is set by the embedding program.
#[derive(Debug, Default)]
pub struct ManualSelection {
    text: Mutex<Option<String>>,
}

impl ManualSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&self, text: impl Into<String>) {
        *self.text.lock().expect("selection mutex poisoned") = Some(text.into());
    }

    pub fn clear(&self) {
        *self.text.lock().expect("selection mutex poisoned") = None;
    }
}

impl SelectionSource for ManualSelection {
    fn selected_text(&self) -> Option<String> {
        self.text.lock().expect("selection mutex poisoned").clone()
    }
}

impl<S: SelectionSource + ?Sized> SelectionSource for Arc<S> {
    fn selected_text(&self) -> Option<String> {
        (**self).selected_text()
    }
}

/// Input events after which the selection may have changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    MouseUp,
    KeyUp,
}

type Listener = Arc<dyn Fn(Option<&str>) + Send + Sync>;

struct Inner {
    current: Option<String>,
    listeners: Vec<(u64, Listener)>,
    next_id: u64,
    attached: bool,
}

/// Trims the raw selection; whitespace-only counts as no selection.
fn normalize(raw: Option<String>) -> Option<String> {
    let raw = raw?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().expect("selection observer mutex poisoned")
}

pub struct SelectionObserver {
    source: Box<dyn SelectionSource>,
    inner: Arc<Mutex<Inner>>,
}

impl SelectionObserver {
    /// Create an observer that is already attached to input events.
    pub fn new(source: impl SelectionSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            inner: Arc::new(Mutex::new(Inner {
                current: None,
                listeners: Vec::new(),
                next_id: 0,
                attached: true,
            })),
        }
    }

    /// Re-register for input events after a [`destroy`](Self::destroy).
    pub fn attach(&self) {
        lock(&self.inner).attached = true;
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.inner).attached
    }

    /// Handle one input event. Listeners run synchronously, before this
    /// returns, and only if the trimmed selection changed.
    pub fn handle_event(&self, event: InputEvent) {
        // Listeners are called after the lock is released so they may call
        // back into the observer.
        let (current, listeners): (Option<String>, Vec<Listener>) = {
            let mut inner = lock(&self.inner);
            if !inner.attached {
                return;
            }
            let next = normalize(self.source.selected_text());
            if next == inner.current {
                return;
            }
            debug!(?event, selected = next.is_some(), "selection changed");
            inner.current = next.clone();
            let listeners = inner.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
            (next, listeners)
        };

        for listener in listeners {
            listener(current.as_deref());
        }
    }

    /// The last observed selection (already trimmed).
    pub fn selected_text(&self) -> Option<String> {
        lock(&self.inner).current.clone()
    }

    /// Register `listener` and return the handle that removes it.
    pub fn add_listener<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(Option<&str>) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, listener));
        Unsubscribe {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    /// Detach from input events and drop every listener. Safe to call more
    /// than once.
    pub fn destroy(&self) {
        let mut inner = lock(&self.inner);
        inner.attached = false;
        inner.listeners.clear();
    }
}

/// Removes exactly one listener. Calling it again is a no-op.
#[must_use = "dropping the handle keeps the listener registered"]
pub struct Unsubscribe {
    id: u64,
    inner: Weak<Mutex<Inner>>,
}

impl Unsubscribe {
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.inner.upgrade() {
            lock(&inner).listeners.retain(|(id, _)| *id != self.id);
        }
    }
}
