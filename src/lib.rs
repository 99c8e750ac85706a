//! Thread Safe reducer-driven reactive state slices
//!
//! A [`ReactiveState`] holds one value (or none), changes it only through an
//! async [`Reducer`] or an explicit replace, and calls its observers after
//! every change. Observers can subscribe to a slice of the value instead of
//! the whole thing.
//!
//! ```
//! use reactive_slice::{reducer_fn, ReactiveState};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Debug)]
//! enum Todo {
//!     Add(&'static str),
//!     Clear,
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let todos = ReactiveState::new(
//!     "todos",
//!     reducer_fn(|state: Option<Vec<&'static str>>, action: Todo| async move {
//!         Ok::<_, std::convert::Infallible>(match action {
//!             Todo::Add(item) => {
//!                 let mut items = state.unwrap_or_default();
//!                 items.push(item);
//!                 Some(items)
//!             }
//!             Todo::Clear => None,
//!         })
//!     }),
//! );
//!
//! let counts: Arc<Mutex<Vec<usize>>> = Default::default();
//! let sub = todos.observe_slice(|items| items.map_or(0, Vec::len), {
//!     let counts = counts.clone();
//!     move |n| counts.lock().unwrap().push(n)
//! });
//!
//! todos.update(Todo::Add("🦀")).await.unwrap();
//! todos.update(Todo::Add("🦞")).await.unwrap();
//! todos.update(Todo::Clear).await.unwrap();
//! sub.unsubscribe();
//! todos.update(Todo::Add("🐙")).await.unwrap();
//!
//! assert_eq!(vec![1, 2, 0], counts.lock().unwrap().clone());
//! assert_eq!(Some(vec!["🐙"]), todos.value());
//! # }
//! ```

pub mod auth;
mod observer;
mod reactive;
mod reducer;

pub use observer::{ObserverId, Subscription};
pub use reactive::ReactiveState;
pub use reducer::{reducer_fn, FnReducer, Passthrough, Reducer};
