use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::models::{Session, Theme};

/// What the dashboard shell shows one operator: the shared theme plus their
/// own session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppSnapshot {
    pub theme: Theme,
    pub session: Option<Session>,
}

#[derive(Debug, Default)]
struct AppState {
    theme: Theme,
    sessions: HashMap<String, Session>,
}

impl AppState {
    fn view(&self, user_id: &str) -> AppSnapshot {
        AppSnapshot {
            theme: self.theme,
            session: self.sessions.get(user_id).cloned(),
        }
    }
}

/// The theme is shared by every operator; sessions are keyed by user id.
/// Cloning shares the same store.
#[derive(Clone)]
pub struct AppStore {
    state: Arc<watch::Sender<AppState>>,
}

impl AppStore {
    pub fn new(theme: Theme) -> Self {
        let (state, _) = watch::channel(AppState {
            theme,
            sessions: HashMap::new(),
        });
        Self { state: Arc::new(state) }
    }

    pub fn snapshot(&self, user_id: &str) -> AppSnapshot {
        self.state.borrow().view(user_id)
    }

    pub fn theme(&self) -> Theme {
        self.state.borrow().theme
    }

    pub fn session(&self, user_id: &str) -> Option<Session> {
        self.state.borrow().sessions.get(user_id).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.state.borrow().sessions.len()
    }

    /// Follows one operator's view of the store. Dropping the subscription
    /// unsubscribes.
    pub fn subscribe(&self, user_id: &str) -> AppSubscription {
        let receiver = self.state.subscribe();
        let last = receiver.borrow().view(user_id);
        AppSubscription {
            receiver,
            user_id: user_id.to_string(),
            last,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.receiver_count()
    }

    /// Returns whether anything changed; subscribers are only woken if so.
    pub fn set_theme(&self, theme: Theme) -> bool {
        self.state.send_if_modified(|state| {
            if state.theme == theme {
                return false;
            }
            debug!("Theme changed to {}", theme);
            state.theme = theme;
            true
        })
    }

    pub fn toggle_theme(&self) -> Theme {
        let mut toggled = Theme::default();
        self.state.send_modify(|state| {
            state.theme = state.theme.toggled();
            toggled = state.theme;
        });
        toggled
    }

    /// Sign-in stores the operator's session, sign-out clears it. Other
    /// operators' sessions are left alone.
    pub fn set_session(&self, user_id: &str, session: Option<Session>) -> bool {
        self.state.send_if_modified(|state| {
            let changed = match session {
                Some(session) => {
                    if state.sessions.get(user_id) == Some(&session) {
                        false
                    } else {
                        state.sessions.insert(user_id.to_string(), session);
                        true
                    }
                }
                None => state.sessions.remove(user_id).is_some(),
            };
            if changed {
                debug!("Session changed for {}", user_id);
            }
            changed
        })
    }
}

/// One operator's subscription to the [`AppStore`].
pub struct AppSubscription {
    receiver: watch::Receiver<AppState>,
    user_id: String,
    last: AppSnapshot,
}

impl AppSubscription {
    pub fn current(&self) -> &AppSnapshot {
        &self.last
    }

    /// Resolves once this operator's view differs from the last one seen.
    /// Changes to other operators' sessions are skipped. `None` once the
    /// store is gone.
    pub async fn changed(&mut self) -> Option<AppSnapshot> {
        loop {
            self.receiver.changed().await.ok()?;
            let view = self.receiver.borrow_and_update().view(&self.user_id);
            if view != self.last {
                self.last = view.clone();
                return Some(view);
            }
        }
    }
}
