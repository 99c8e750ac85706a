//! Authentication / user profile state.
//!
//! [`AuthStore`] owns one [`ReactiveState`] driven by [`AuthReducer`]. Build one
//! per application and hand clones to whatever needs to read, observe or
//! dispatch.
//!
//! ```
//! use reactive_slice::auth::{AuthAction, AuthPatch, AuthStore, MemoryDirectory, User, UserId};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), reactive_slice::auth::AuthError> {
//! let directory = MemoryDirectory::from_iter([User::new(UserId(1), "ada")]);
//! let store = AuthStore::new(directory);
//!
//! store.dispatch(AuthAction::LoadUser(UserId(1))).await?;
//! assert_eq!(Some(String::from("ada")), store.state().get(|s| s.and_then(|s| s.user.clone()).map(|u| u.name)));
//!
//! store.dispatch(AuthAction::SetUser(AuthPatch::logged_in(false))).await?;
//! assert!(!store.state().get(|s| s.is_some_and(|s| s.logged_in)));
//! # Ok(())
//! # }
//! ```

use crate::{ReactiveState, Reducer};
use std::{collections::HashMap, fmt, future::Future};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Signed out, no user, by default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub logged_in: bool,
    pub user: Option<User>,
}

/// Shallow update of an [`AuthState`]: fields that are `Some` overwrite,
/// fields that are `None` keep what is there.
///
/// `user: Some(None)` clears the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthPatch {
    pub logged_in: Option<bool>,
    pub user: Option<Option<User>>,
}

impl AuthPatch {
    pub fn logged_in(logged_in: bool) -> Self {
        Self {
            logged_in: Some(logged_in),
            ..Self::default()
        }
    }

    pub fn user(user: Option<User>) -> Self {
        Self {
            user: Some(user),
            ..Self::default()
        }
    }

    /// Applies the patch on top of `state`, starting from
    /// [`AuthState::default`] when there is no state yet.
    pub fn merge_into(self, state: Option<AuthState>) -> AuthState {
        let mut state = state.unwrap_or_default();
        if let Some(logged_in) = self.logged_in {
            state.logged_in = logged_in;
        }
        if let Some(user) = self.user {
            state.user = user;
        }
        state
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthAction {
    /// Merge the patch into the current state.
    SetUser(AuthPatch),
    /// Look the user up and mark them as logged in.
    LoadUser(UserId),
    /// Back to [`AuthState::default`].
    SignOut,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("unknown user: {0}")]
    UnknownUser(UserId),

    #[error("user directory unavailable: {0}")]
    DirectoryUnavailable(String),
}

/// Where [`AuthAction::LoadUser`] finds users.
pub trait UserDirectory: Send + Sync + 'static {
    fn find(&self, id: UserId) -> impl Future<Output = Result<Option<User>, AuthError>> + Send;
}

/// [`UserDirectory`] over a fixed in-memory set of users.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    users: HashMap<UserId, User>,
}

impl MemoryDirectory {
    pub fn insert(&mut self, user: User) -> Option<User> {
        self.users.insert(user.id, user)
    }
}

impl FromIterator<User> for MemoryDirectory {
    fn from_iter<I: IntoIterator<Item = User>>(iter: I) -> Self {
        Self {
            users: iter.into_iter().map(|user| (user.id, user)).collect(),
        }
    }
}

impl UserDirectory for MemoryDirectory {
    async fn find(&self, id: UserId) -> Result<Option<User>, AuthError> {
        Ok(self.users.get(&id).cloned())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthReducer<D> {
    directory: D,
}

impl<D: UserDirectory> AuthReducer<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }
}

impl<D: UserDirectory> Reducer for AuthReducer<D> {
    type State = AuthState;
    type Action = AuthAction;
    type Error = AuthError;

    async fn reduce(
        &self,
        state: Option<AuthState>,
        action: AuthAction,
    ) -> Result<Option<AuthState>, AuthError> {
        match action {
            AuthAction::SetUser(patch) => Ok(Some(patch.merge_into(state))),
            AuthAction::LoadUser(id) => {
                let user = self
                    .directory
                    .find(id)
                    .await?
                    .ok_or(AuthError::UnknownUser(id))?;
                let patch = AuthPatch {
                    logged_in: Some(true),
                    user: Some(Some(user)),
                };
                Ok(Some(patch.merge_into(state)))
            }
            AuthAction::SignOut => Ok(Some(AuthState::default())),
        }
    }
}

/// The user profile state of one application, passed around by value.
pub struct AuthStore<D: UserDirectory> {
    state: ReactiveState<AuthReducer<D>>,
}

impl<D: UserDirectory> AuthStore<D> {
    pub const ID: &'static str = "user_profile";

    /// Starts with no state; observers see `None` until the first dispatch.
    pub fn new(directory: D) -> Self {
        Self {
            state: ReactiveState::new(Self::ID, AuthReducer::new(directory)),
        }
    }

    pub fn with_initial(directory: D, initial: AuthState) -> Self {
        Self {
            state: ReactiveState::with_initial(Self::ID, AuthReducer::new(directory), initial),
        }
    }

    pub fn state(&self) -> &ReactiveState<AuthReducer<D>> {
        &self.state
    }

    pub async fn dispatch(&self, action: AuthAction) -> Result<(), AuthError> {
        tracing::info!(state = self.state.id(), ?action, "dispatch");
        self.state.update(action).await
    }
}

impl<D: UserDirectory> Clone for AuthStore<D> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<D: UserDirectory> fmt::Debug for AuthStore<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AuthStore").field(&self.state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn ada() -> User {
        User::new(UserId(1), "ada")
    }

    #[test]
    fn patch_overwrites_only_present_fields() {
        let state = AuthState {
            logged_in: true,
            user: Some(ada()),
        };

        let merged = AuthPatch::logged_in(false).merge_into(Some(state));

        assert_eq!(
            AuthState {
                logged_in: false,
                user: Some(ada())
            },
            merged
        );
    }

    #[test]
    fn patch_can_clear_the_user() {
        let state = AuthState {
            logged_in: true,
            user: Some(ada()),
        };

        assert_eq!(None, AuthPatch::user(None).merge_into(Some(state)).user);
    }

    #[test]
    fn patch_onto_nothing_starts_from_default() {
        assert_eq!(
            AuthState {
                logged_in: false,
                user: Some(ada())
            },
            AuthPatch::user(Some(ada())).merge_into(None)
        );
    }

    #[tokio::test]
    async fn load_user_marks_logged_in() {
        let reducer = AuthReducer::new(MemoryDirectory::from_iter([ada()]));

        let next = reducer.reduce(None, AuthAction::LoadUser(UserId(1))).await;

        assert_eq!(
            Ok(Some(AuthState {
                logged_in: true,
                user: Some(ada())
            })),
            next
        );
    }

    #[tokio::test]
    async fn load_unknown_user_fails() {
        let reducer = AuthReducer::new(MemoryDirectory::default());

        let next = reducer.reduce(None, AuthAction::LoadUser(UserId(7))).await;

        assert_eq!(Err(AuthError::UnknownUser(UserId(7))), next);
        assert_eq!("unknown user: 7", AuthError::UnknownUser(UserId(7)).to_string());
    }

    #[tokio::test]
    async fn sign_out_resets() {
        let reducer = AuthReducer::new(MemoryDirectory::default());
        let state = AuthState {
            logged_in: true,
            user: Some(ada()),
        };

        let next = reducer.reduce(Some(state), AuthAction::SignOut).await;

        assert_eq!(Ok(Some(AuthState::default())), next);
    }

    #[tokio::test]
    #[traced_test]
    async fn dispatch_logs_the_action() {
        let store = AuthStore::new(MemoryDirectory::default());

        store.dispatch(AuthAction::SignOut).await.unwrap();

        assert!(logs_contain("dispatch"));
        assert!(logs_contain("SignOut"));
        assert!(logs_contain("user_profile"));
    }
}
