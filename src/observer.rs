use std::{
    fmt, mem,
    sync::{Mutex, MutexGuard, PoisonError, Weak},
};

pub(crate) type Observer<T> = Box<dyn FnMut(Option<&T>) + Send>;

/// Identifies one observer registration on a [`ReactiveState`](crate::ReactiveState).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

/// Observer registrations in notification order.
///
/// While a notification pass runs, the entries being called live in a
/// [`Pass`] and only their ids stay here in `in_flight`.
pub(crate) struct Observers<T> {
    next_id: u64,
    entries: Vec<(ObserverId, Observer<T>)>,
    in_flight: Vec<ObserverId>,
}

impl<T> Observers<T> {
    pub(crate) const fn new() -> Self {
        Self {
            next_id: 0,
            entries: vec![],
            in_flight: vec![],
        }
    }

    pub(crate) fn push(&mut self, observer: Observer<T>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, observer));
        id
    }

    pub(crate) fn remove(&mut self, id: ObserverId) -> bool {
        if let Some(idx) = self.entries.iter().position(|(entry, _)| *entry == id) {
            self.entries.remove(idx);
            return true;
        }
        match self.in_flight.iter().position(|entry| *entry == id) {
            Some(idx) => {
                self.in_flight.remove(idx);
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.in_flight.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len() + self.in_flight.len()
    }

    fn take(&mut self) -> Vec<(ObserverId, Observer<T>)> {
        let taken = mem::take(&mut self.entries);
        self.in_flight = taken.iter().map(|(id, _)| *id).collect();
        taken
    }

    /// Puts the entries of a finished pass back in front of anything
    /// registered meanwhile, minus the ones removed meanwhile.
    fn restore(&mut self, mut taken: Vec<(ObserverId, Observer<T>)>) {
        let in_flight = mem::take(&mut self.in_flight);
        taken.retain(|(id, _)| in_flight.contains(id));
        taken.append(&mut self.entries);
        self.entries = taken;
    }
}

/// One notification pass over every registered observer.
///
/// The observer list is unlocked while callbacks run, so a callback may
/// subscribe or unsubscribe on the same state. Such changes take effect from
/// the next pass. The entries go back into the list when the pass is dropped,
/// also when a callback panics.
pub(crate) struct Pass<'a, T> {
    observers: &'a Mutex<Observers<T>>,
    taken: Vec<(ObserverId, Observer<T>)>,
}

impl<'a, T> Pass<'a, T> {
    pub(crate) fn begin(observers: &'a Mutex<Observers<T>>) -> Self {
        let taken = lock(observers).take();
        Self { observers, taken }
    }

    pub(crate) fn call(mut self, state: Option<&T>) {
        for (_, obs) in &mut self.taken {
            obs(state);
        }
    }
}

impl<T> Drop for Pass<'_, T> {
    fn drop(&mut self) {
        lock(self.observers).restore(mem::take(&mut self.taken));
    }
}

/// Locks `mutex`, taking over the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle returned by [`ReactiveState::observe`](crate::ReactiveState::observe)
/// and [`ReactiveState::observe_slice`](crate::ReactiveState::observe_slice).
///
/// Dropping the handle keeps the observer registered; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove it. The handle does not
/// keep the state alive.
#[must_use = "dropping a Subscription leaves the observer registered with no way to remove it"]
pub struct Subscription {
    id: ObserverId,
    remove: Box<dyn Fn(ObserverId) -> bool + Send + Sync>,
}

impl Subscription {
    pub(crate) fn new<T: 'static>(id: ObserverId, observers: Weak<Mutex<Observers<T>>>) -> Self {
        Self {
            id,
            remove: Box::new(move |id| match observers.upgrade() {
                Some(observers) => lock(&observers).remove(id),
                None => false,
            }),
        }
    }

    /// The id of the registration this handle removes.
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Removes exactly the registration this handle was returned for.
    ///
    /// Returns `true` if the observer was still registered. Calling it again,
    /// or after the state has been dropped, does nothing and returns `false`.
    ///
    /// # Examples
    /// ```
    /// use reactive_slice::{Passthrough, ReactiveState};
    /// use std::sync::{Arc, Mutex};
    ///
    /// let r = ReactiveState::new("clicks", Passthrough::<u32, ()>::new());
    /// let seen: Arc<Mutex<Vec<Option<u32>>>> = Default::default();
    ///
    /// let sub = r.observe({
    ///     let seen = seen.clone();
    ///     move |val| seen.lock().unwrap().push(val.copied())
    /// });
    ///
    /// r.replace(1);
    /// assert!(sub.unsubscribe());
    /// assert!(!sub.unsubscribe());
    /// r.replace(2);
    ///
    /// assert_eq!(vec![Some(1)], seen.lock().unwrap().clone());
    /// ```
    pub fn unsubscribe(&self) -> bool {
        (self.remove)(self.id)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Subscription").field(&self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recording(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Observer<i32> {
        let log = log.clone();
        Box::new(move |val: Option<&i32>| log.lock().unwrap().push(format!("{tag}:{val:?}")))
    }

    #[test]
    fn calls_in_registration_order() {
        let log: Arc<Mutex<Vec<String>>> = Default::default();
        let mut observers = Observers::new();
        observers.push(recording(&log, "a"));
        observers.push(recording(&log, "b"));

        let observers = Mutex::new(observers);
        Pass::begin(&observers).call(Some(&7));

        assert_eq!(vec!["a:Some(7)", "b:Some(7)"], log.lock().unwrap().clone());
    }

    #[test]
    fn remove_drops_only_the_matching_registration() {
        let log: Arc<Mutex<Vec<String>>> = Default::default();
        let mut observers = Observers::new();
        let first = observers.push(recording(&log, "x"));
        observers.push(recording(&log, "x"));

        assert!(observers.remove(first));
        assert!(!observers.remove(first));
        assert_eq!(1, observers.len());

        let observers = Mutex::new(observers);
        Pass::begin(&observers).call(None);
        assert_eq!(vec!["x:None"], log.lock().unwrap().clone());
    }

    #[test]
    fn changes_during_a_pass_apply_once_it_ends() {
        let log: Arc<Mutex<Vec<String>>> = Default::default();
        let observers = Mutex::new(Observers::new());
        let a = lock(&observers).push(recording(&log, "a"));
        lock(&observers).push(recording(&log, "b"));

        let pass = Pass::begin(&observers);
        assert_eq!(2, lock(&observers).len());
        assert!(lock(&observers).remove(a));
        lock(&observers).push(recording(&log, "c"));
        assert_eq!(2, lock(&observers).len());
        pass.call(Some(&1));

        // the pass still calls what it started with
        assert_eq!(vec!["a:Some(1)", "b:Some(1)"], log.lock().unwrap().clone());

        log.lock().unwrap().clear();
        Pass::begin(&observers).call(Some(&2));
        assert_eq!(vec!["b:Some(2)", "c:Some(2)"], log.lock().unwrap().clone());
    }

    #[test]
    fn clear_during_a_pass_drops_everything() {
        let log: Arc<Mutex<Vec<String>>> = Default::default();
        let observers = Mutex::new(Observers::new());
        lock(&observers).push(recording(&log, "a"));

        let pass = Pass::begin(&observers);
        lock(&observers).clear();
        drop(pass);

        assert_eq!(0, lock(&observers).len());
    }

    #[test]
    fn subscription_outliving_observers_is_noop() {
        let observers = Arc::new(Mutex::new(Observers::<i32>::new()));
        let id = lock(&observers).push(Box::new(|_: Option<&i32>| {}));
        let sub = Subscription::new(id, Arc::downgrade(&observers));

        drop(observers);

        assert!(!sub.unsubscribe());
    }
}
