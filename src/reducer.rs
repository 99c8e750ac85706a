use std::{convert::Infallible, fmt, future::Future, marker::PhantomData};

/// Computes the next state of a [`ReactiveState`](crate::ReactiveState) from
/// the current state and an action.
///
/// The reducer is the only authority for reducer-driven updates. It receives
/// the current state by value (`None` when the state is absent) and resolves
/// to the next state. Returning an error leaves the state untouched.
///
/// # Examples
/// ```
/// use reactive_slice::Reducer;
/// use std::convert::Infallible;
///
/// enum CounterAction {
///     Add(i64),
///     Reset,
/// }
///
/// struct Counter;
///
/// impl Reducer for Counter {
///     type State = i64;
///     type Action = CounterAction;
///     type Error = Infallible;
///
///     async fn reduce(
///         &self,
///         state: Option<i64>,
///         action: CounterAction,
///     ) -> Result<Option<i64>, Infallible> {
///         Ok(match action {
///             CounterAction::Add(n) => Some(state.unwrap_or_default() + n),
///             CounterAction::Reset => None,
///         })
///     }
/// }
/// ```
pub trait Reducer: Send + Sync + 'static {
    type State: Send + Sync + 'static;
    type Action: Send + 'static;
    type Error;

    fn reduce(
        &self,
        state: Option<Self::State>,
        action: Self::Action,
    ) -> impl Future<Output = Result<Option<Self::State>, Self::Error>> + Send;
}

/// A [`Reducer`] backed by an async closure. See [`reducer_fn`].
pub struct FnReducer<F, S, A, E> {
    f: F,
    _marker: PhantomData<fn(Option<S>, A) -> E>,
}

/// Wraps an async closure into a [`Reducer`].
///
/// # Examples
/// ```
/// use reactive_slice::{reducer_fn, ReactiveState};
///
/// # #[tokio::main]
/// # async fn main() {
/// let r = ReactiveState::with_initial(
///     "counter",
///     reducer_fn(|state: Option<i32>, by: i32| async move {
///         Ok::<_, std::convert::Infallible>(state.map(|n| n + by))
///     }),
///     1,
/// );
///
/// r.update(41).await.unwrap();
/// assert_eq!(Some(42), r.value());
/// # }
/// ```
pub fn reducer_fn<F, Fut, S, A, E>(f: F) -> FnReducer<F, S, A, E>
where
    F: Fn(Option<S>, A) -> Fut,
    Fut: Future<Output = Result<Option<S>, E>>,
{
    FnReducer {
        f,
        _marker: PhantomData,
    }
}

impl<F, Fut, S, A, E> Reducer for FnReducer<F, S, A, E>
where
    F: Fn(Option<S>, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<S>, E>> + Send,
    S: Send + Sync + 'static,
    A: Send + 'static,
    E: 'static,
{
    type State = S;
    type Action = A;
    type Error = E;

    fn reduce(&self, state: Option<S>, action: A) -> impl Future<Output = Result<Option<S>, E>> + Send {
        (self.f)(state, action)
    }
}

impl<F, S, A, E> fmt::Debug for FnReducer<F, S, A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnReducer").finish_non_exhaustive()
    }
}

/// Hands the state back unchanged for every action.
///
/// Useful for slices that are only ever written through
/// [`ReactiveState::replace`](crate::ReactiveState::replace).
pub struct Passthrough<S, A> {
    _marker: PhantomData<fn(Option<S>, A) -> Option<S>>,
}

impl<S, A> Passthrough<S, A> {
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<S, A> Default for Passthrough<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, A> fmt::Debug for Passthrough<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passthrough")
    }
}

impl<S, A> Reducer for Passthrough<S, A>
where
    S: Send + Sync + 'static,
    A: Send + 'static,
{
    type State = S;
    type Action = A;
    type Error = Infallible;

    async fn reduce(&self, state: Option<S>, _action: A) -> Result<Option<S>, Infallible> {
        Ok(state)
    }
}
