//! Contains helper functions to reduce boilerplate code in other `app` modules.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::events::UserEvent;
use super::proxy::EventProxy;
use super::state::AppState;
use super::view_model::generate_view_state;

/// Locks the state, recovering the guard if a previous holder panicked.
pub fn lock_state(state: &Mutex<AppState>) -> MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sends a `StateUpdate` built from the already locked state.
pub fn notify_state<P: EventProxy>(state: &AppState, proxy: &P) {
    proxy.send_event(UserEvent::StateUpdate(Box::new(generate_view_state(state))));
}

/// A helper function that locks the `AppState`, performs a mutation,
/// and then automatically sends a `StateUpdate` event to the front end.
pub fn with_state_and_notify<F, P: EventProxy>(state: &Arc<Mutex<AppState>>, proxy: &P, update_fn: F)
where
    F: FnOnce(&mut AppState),
{
    let mut state_guard = lock_state(state);
    update_fn(&mut state_guard);
    notify_state(&state_guard, proxy);
}
