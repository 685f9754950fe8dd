use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Reducer<S, A> = Box<dyn Fn(&S, &A) -> S + Send + Sync>;
type Observer<S> = Arc<dyn Fn(&S) + Send + Sync>;

/// Subscribable state container: a current snapshot evolved by a reducer.
///
/// `dispatch` folds an action into the state under the lock, then notifies
/// every subscriber with the post-reduce snapshot outside the lock, in
/// subscription order. A new subscriber is invoked immediately with the
/// current snapshot, so observers never start blind.
pub struct StateStore<S, A> {
    inner: Arc<StoreInner<S, A>>,
}

struct StoreInner<S, A> {
    shared: Mutex<Shared<S>>,
    reducer: Reducer<S, A>,
    next_observer_id: AtomicU64,
}

struct Shared<S> {
    state: S,
    observers: Vec<(u64, Observer<S>)>,
}

impl<S, A> StateStore<S, A>
where
    S: Clone + Send + 'static,
{
    pub fn new<R>(initial: S, reducer: R) -> Self
    where
        R: Fn(&S, &A) -> S + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(StoreInner {
                shared: Mutex::new(Shared {
                    state: initial,
                    observers: Vec::new(),
                }),
                reducer: Box::new(reducer),
                next_observer_id: AtomicU64::new(1),
            }),
        }
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> S {
        self.inner
            .shared
            .lock()
            .expect("state lock poisoned")
            .state
            .clone()
    }

    /// Apply `action` through the reducer and notify all subscribers.
    ///
    /// The reducer runs under the lock; observer callbacks run after it is
    /// released, so an observer may call back into the store.
    pub fn dispatch(&self, action: A) {
        let (snapshot, observers) = {
            let mut shared = self.inner.shared.lock().expect("state lock poisoned");
            shared.state = (self.inner.reducer)(&shared.state, &action);

            let snapshot = shared.state.clone();
            let observers: Vec<Observer<S>> = shared
                .observers
                .iter()
                .map(|(_, observer)| Arc::clone(observer))
                .collect();
            (snapshot, observers)
        };

        for observer in observers {
            observer(&snapshot);
        }
    }

    /// Register `observer` and invoke it once with the current snapshot.
    ///
    /// The returned guard unregisters the observer when dropped.
    pub fn subscribe<F>(&self, observer: F) -> Subscription<S, A>
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        let id = self.inner.next_observer_id.fetch_add(1, Ordering::Relaxed);
        let observer: Observer<S> = Arc::new(observer);

        let snapshot = {
            let mut shared = self.inner.shared.lock().expect("state lock poisoned");
            shared.observers.push((id, Arc::clone(&observer)));
            shared.state.clone()
        };
        observer(&snapshot);

        Subscription {
            store: Arc::downgrade(&self.inner),
            id,
        }
    }

    #[cfg(test)]
    fn observer_count(&self) -> usize {
        self.inner
            .shared
            .lock()
            .expect("state lock poisoned")
            .observers
            .len()
    }
}

impl<S, A> Clone for StateStore<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Guard tying an observer's lifetime to a value on the caller's side.
#[must_use = "dropping the subscription immediately unsubscribes"]
pub struct Subscription<S, A> {
    store: Weak<StoreInner<S, A>>,
    id: u64,
}

impl<S, A> Drop for Subscription<S, A> {
    fn drop(&mut self) {
        let Some(inner) = self.store.upgrade() else {
            return;
        };
        // Never panic in drop, even on a poisoned lock.
        if let Ok(mut shared) = inner.shared.lock() {
            shared.observers.retain(|(id, _)| *id != self.id);
        }
    }
}
