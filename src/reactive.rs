use crate::{
    observer::{lock, Observers, Pass, Subscription},
    Reducer,
};
use parking_lot::ReentrantMutex;
use std::{
    cell::RefCell,
    collections::VecDeque,
    fmt::Debug,
    ops::DerefMut,
    sync::{Arc, Mutex, MutexGuard},
};

/// Thread Safe reducer-driven reactive state.
///
/// Holds a single value of type `R::State` (or nothing), changes it only through
/// the reducer `R` or an explicit [`replace`](ReactiveState::replace), and calls
/// every observer after each change. Clones share the same state.
///
/// # Examples
/// ```
/// use reactive_slice::{reducer_fn, ReactiveState};
///
/// # #[tokio::main]
/// # async fn main() {
/// let r = ReactiveState::new(
///     "greeting",
///     reducer_fn(|_: Option<String>, name: &'static str| async move {
///         Ok::<_, std::convert::Infallible>(Some(format!("hello {name}")))
///     }),
/// );
///
/// assert_eq!(None, r.value());
/// r.update("🦀").await.unwrap();
/// assert_eq!(Some(String::from("hello 🦀")), r.value());
/// # }
/// ```
pub struct ReactiveState<R: Reducer> {
    inner: Arc<Inner<R>>,
}

struct Inner<R: Reducer> {
    id: String,
    reducer: R,
    value: Mutex<Option<Arc<R::State>>>,
    observers: Arc<Mutex<Observers<R::State>>>,
    // held across the reducer await so updates never interleave
    gate: tokio::sync::Mutex<()>,
    // held from a commit until its notifications are out; reentrant so
    // observers can commit too
    dispatch: ReentrantMutex<RefCell<Dispatch<R::State>>>,
}

struct Dispatch<T> {
    running: bool,
    queued: VecDeque<Option<Arc<T>>>,
}

struct Running<'a, T>(&'a RefCell<Dispatch<T>>);

impl<T> Drop for Running<'_, T> {
    fn drop(&mut self) {
        let mut dispatch = self.0.borrow_mut();
        dispatch.running = false;
        dispatch.queued.clear();
    }
}

impl<R: Reducer> ReactiveState<R> {
    /// Constructs a new ReactiveState with no value.
    ///
    /// `id` names the state in log output only.
    pub fn new(id: impl Into<String>, reducer: R) -> Self {
        Self::from_parts(id.into(), reducer, None)
    }

    /// Constructs a new ReactiveState holding `value`.
    ///
    /// # Examples
    /// ```
    /// use reactive_slice::{Passthrough, ReactiveState};
    ///
    /// let r = ReactiveState::with_initial("theme", Passthrough::<&str, ()>::new(), "dark");
    /// assert_eq!(Some("dark"), r.value());
    /// ```
    pub fn with_initial(id: impl Into<String>, reducer: R, value: R::State) -> Self {
        Self::from_parts(id.into(), reducer, Some(Arc::new(value)))
    }

    fn from_parts(id: String, reducer: R, value: Option<Arc<R::State>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                reducer,
                value: Mutex::new(value),
                observers: Arc::new(Mutex::new(Observers::new())),
                gate: tokio::sync::Mutex::new(()),
                dispatch: ReentrantMutex::new(RefCell::new(Dispatch {
                    running: false,
                    queued: VecDeque::new(),
                })),
            }),
        }
    }

    /// The id given at construction.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Returns a clone/copy of the value inside, or `None` if there is none yet.
    ///
    /// # Examples
    /// ```
    /// use reactive_slice::{Passthrough, ReactiveState};
    ///
    /// let r = ReactiveState::new("count", Passthrough::<i32, ()>::new());
    /// assert_eq!(None, r.value());
    ///
    /// r.replace(3);
    /// assert_eq!(Some(3), r.value());
    /// ```
    pub fn value(&self) -> Option<R::State>
    where
        R::State: Clone,
    {
        self.snapshot().as_deref().cloned()
    }

    /// Returns a shared handle to the current value without cloning it.
    pub fn snapshot(&self) -> Option<Arc<R::State>> {
        self.acq_val_lock().clone()
    }

    /// Reads a slice of the current value.
    ///
    /// The slicer is also called when there is no value, so it has to
    /// handle `None` itself.
    ///
    /// # Examples
    /// ```
    /// use reactive_slice::{Passthrough, ReactiveState};
    ///
    /// let r = ReactiveState::with_initial(
    ///     "point",
    ///     Passthrough::<(i32, i32), ()>::new(),
    ///     (3, 4),
    /// );
    ///
    /// assert_eq!(4, r.get(|p| p.map_or(0, |(_, y)| *y)));
    /// ```
    pub fn get<U>(&self, slicer: impl FnOnce(Option<&R::State>) -> U) -> U {
        let value = self.snapshot();
        slicer(value.as_deref())
    }

    /// Adds a new observer.
    /// Observers are called with the new value, in the sequence they were added,
    /// after every [`update`](ReactiveState::update), [`replace`](ReactiveState::replace)
    /// and [`notify`](ReactiveState::notify).
    ///
    /// Observers may use this state from inside the callback. Observers added
    /// or removed there are picked up from the next notification on. A
    /// `replace` or `notify` made there is delivered to everyone once the
    /// current round of calls is done.
    ///
    /// # Examples
    /// ```
    /// use reactive_slice::{Passthrough, ReactiveState};
    /// use std::sync::{Arc, Mutex};
    ///
    /// let r = ReactiveState::new("word", Passthrough::<String, ()>::new());
    /// let change_log: Arc<Mutex<Vec<Option<String>>>> = Default::default();
    ///
    /// let _sub = r.observe({
    ///     let change_log = change_log.clone();
    ///     move |val| change_log.lock().unwrap().push(val.cloned())
    /// });
    ///
    /// r.replace(String::from("🦀"));
    /// r.replace(String::from("🦞"));
    ///
    /// assert_eq!(
    ///     vec![Some(String::from("🦀")), Some(String::from("🦞"))],
    ///     change_log.lock().unwrap().clone()
    /// );
    /// ```
    pub fn observe(&self, f: impl FnMut(Option<&R::State>) + Send + 'static) -> Subscription {
        let id = self.acq_obs_lock().push(Box::new(f));
        Subscription::new(id, Arc::downgrade(&self.inner.observers))
    }

    /// Adds a new observer that only sees a slice of the value.
    ///
    /// The slicer runs at notification time, once per notification.
    ///
    /// # Examples
    /// ```
    /// use reactive_slice::{Passthrough, ReactiveState};
    /// use std::sync::{Arc, Mutex};
    ///
    /// let r = ReactiveState::new("word", Passthrough::<String, ()>::new());
    /// let lengths: Arc<Mutex<Vec<usize>>> = Default::default();
    ///
    /// let _sub = r.observe_slice(
    ///     |val| val.map_or(0, String::len),
    ///     {
    ///         let lengths = lengths.clone();
    ///         move |len| lengths.lock().unwrap().push(len)
    ///     },
    /// );
    ///
    /// r.replace(String::from("zahash"));
    /// r.notify();
    ///
    /// assert_eq!(vec![6, 6], lengths.lock().unwrap().clone());
    /// ```
    pub fn observe_slice<U>(
        &self,
        slicer: impl Fn(Option<&R::State>) -> U + Send + 'static,
        mut f: impl FnMut(U) + Send + 'static,
    ) -> Subscription {
        self.observe(move |value| f(slicer(value)))
    }

    /// Clears all observers.
    /// Outstanding [`Subscription`]s become no-ops.
    pub fn clear_observers(&self) {
        self.acq_obs_lock().clear();
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.acq_obs_lock().len()
    }

    /// Runs the reducer on the current value and `action`, stores the result
    /// and notifies all the observers by calling them in the sequence they were
    /// added, whether or not the value changed.
    ///
    /// Concurrent calls run one after another; each reducer sees the value
    /// committed by the previous one.
    ///
    /// # Errors
    /// Returns the reducer's error. The value is left as it was and no observer
    /// is called.
    ///
    /// # Cancel safety
    /// Dropping the future before the reducer resolves leaves the value as it
    /// was and calls no observer.
    pub async fn update(&self, action: R::Action) -> Result<(), R::Error>
    where
        R::State: Clone,
    {
        let _gate = self.inner.gate.lock().await;

        let current = self.value();
        match self.inner.reducer.reduce(current, action).await {
            Ok(next) => {
                self.commit(next.map(Arc::new), "update");
                Ok(())
            }
            Err(err) => {
                tracing::debug!(state = %self.inner.id, "reducer failed, value unchanged");
                Err(err)
            }
        }
    }

    /// Sets the value to `value` without going through the reducer and
    /// notifies all the observers (even if the value is the same as before).
    ///
    /// # Examples
    /// ```
    /// use reactive_slice::{reducer_fn, ReactiveState};
    ///
    /// let r = ReactiveState::new(
    ///     "ignored",
    ///     reducer_fn(|_: Option<i32>, _: ()| async { Ok::<_, ()>(None) }),
    /// );
    ///
    /// r.replace(20);
    /// assert_eq!(Some(20), r.value());
    /// ```
    pub fn replace(&self, value: R::State) {
        self.commit(Some(Arc::new(value)), "replace");
    }

    /// Notify all the observers of the current value by calling the
    /// added observer functions in the sequence they were added.
    ///
    /// # Examples
    /// ```
    /// use reactive_slice::{Passthrough, ReactiveState};
    /// use std::sync::{Arc, Mutex};
    ///
    /// let r = ReactiveState::with_initial("crab", Passthrough::<String, ()>::new(), String::from("🦀"));
    /// let change_log: Arc<Mutex<Vec<String>>> = Default::default();
    ///
    /// let _sub = r.observe({
    ///     let change_log = change_log.clone();
    ///     move |val| change_log.lock().unwrap().extend(val.cloned())
    /// });
    ///
    /// r.notify();
    /// r.notify();
    ///
    /// assert_eq!(
    ///     vec![String::from("🦀"), String::from("🦀")],
    ///     change_log.lock().unwrap().clone()
    /// );
    /// ```
    pub fn notify(&self) {
        let dispatch = self.inner.dispatch.lock();
        let value = self.snapshot();
        self.broadcast(&dispatch, value);
    }

    fn commit(&self, next: Option<Arc<R::State>>, source: &'static str) {
        let dispatch = self.inner.dispatch.lock();
        {
            let mut value = self.acq_val_lock();
            *value.deref_mut() = next.clone();
        }

        tracing::debug!(
            state = %self.inner.id,
            source,
            observers = self.observer_count(),
            "committed"
        );
        self.broadcast(&dispatch, next);
    }

    fn broadcast(&self, dispatch: &RefCell<Dispatch<R::State>>, value: Option<Arc<R::State>>) {
        {
            let mut dispatch = dispatch.borrow_mut();
            if dispatch.running {
                // committed from inside an observer, goes out after this round
                dispatch.queued.push_back(value);
                return;
            }
            dispatch.running = true;
        }

        let _running = Running(dispatch);
        let mut next = Some(value);
        while let Some(value) = next {
            Pass::begin(&self.inner.observers).call(value.as_deref());
            next = dispatch.borrow_mut().queued.pop_front();
        }
    }

    fn acq_val_lock(&self) -> MutexGuard<'_, Option<Arc<R::State>>> {
        lock(&self.inner.value)
    }

    fn acq_obs_lock(&self) -> MutexGuard<'_, Observers<R::State>> {
        lock(&self.inner.observers)
    }
}

impl<R: Reducer> Clone for ReactiveState<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Reducer> Debug for ReactiveState<R>
where
    R::State: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveState")
            .field("id", &self.inner.id)
            .field("value", &self.snapshot())
            .finish()
    }
}
