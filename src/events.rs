use std::path::PathBuf;

/// State changes a canvas reports to its listeners.
#[derive(Clone, Debug, PartialEq)]
pub enum CanvasEvent {
    /// Carries `true` when the canvas now has unsaved changes.
    DirtyChanged(bool),
    PathChanged(PathBuf),
}

/// Handle returned by [`EventHub::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&CanvasEvent)>;

/// Synchronous listener list.  `emit` calls every listener immediately, in
/// subscription order, before returning.
#[derive(Default)]
pub struct EventHub {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&CanvasEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: CanvasEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn listeners_run_in_subscription_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut hub = EventHub::new();
        let a = log.clone();
        hub.subscribe(move |e| a.borrow_mut().push(format!("a:{:?}", e)));
        let b = log.clone();
        hub.subscribe(move |e| b.borrow_mut().push(format!("b:{:?}", e)));

        hub.emit(CanvasEvent::DirtyChanged(true));
        assert_eq!(
            *log.borrow(),
            vec!["a:DirtyChanged(true)".to_string(), "b:DirtyChanged(true)".to_string()]
        );
    }

    #[test]
    fn unsubscribed_listener_is_silent() {
        let hits = Rc::new(RefCell::new(0));
        let mut hub = EventHub::new();
        let h = hits.clone();
        let id = hub.subscribe(move |_| *h.borrow_mut() += 1);
        hub.emit(CanvasEvent::DirtyChanged(false));
        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        hub.emit(CanvasEvent::DirtyChanged(false));
        assert_eq!(*hits.borrow(), 1);
        assert!(hub.is_empty());
    }
}
