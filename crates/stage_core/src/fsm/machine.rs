use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

use super::state::{StateRef, Transition};
use crate::entity::EntityId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateMachineError {
    #[error("entity {owner}: cannot revert from state `{current}`, no previous state recorded")]
    NoPreviousState {
        owner: EntityId,
        current: &'static str,
    },
}

/// Enter/execute/exit state machine bound to a single owner.
///
/// The machine lives inside (or next to) the owner's data, so every operation
/// that runs a hook takes the owner explicitly. `owner` is kept for
/// diagnostics only.
pub struct StateMachine<E> {
    owner: EntityId,
    current_state: Option<StateRef<E>>,
    previous_state: Option<StateRef<E>>,
    global_state: Option<StateRef<E>>,
}

impl<E> StateMachine<E> {
    pub fn new(owner: EntityId) -> Self {
        Self {
            owner,
            current_state: None,
            previous_state: None,
            global_state: None,
        }
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    /// Sets the initial current state without running any hooks.
    pub fn set_current_state(&mut self, state: StateRef<E>) {
        self.current_state = Some(state);
    }

    /// Seeds the state a revert returns to, without running any hooks.
    pub fn set_previous_state(&mut self, state: StateRef<E>) {
        self.previous_state = Some(state);
    }

    pub fn set_global_state(&mut self, state: Option<StateRef<E>>) {
        self.global_state = state;
    }

    pub fn current_state(&self) -> Option<&StateRef<E>> {
        self.current_state.as_ref()
    }

    pub fn previous_state(&self) -> Option<&StateRef<E>> {
        self.previous_state.as_ref()
    }

    pub fn global_state(&self) -> Option<&StateRef<E>> {
        self.global_state.as_ref()
    }

    pub fn current_state_name(&self) -> Option<&'static str> {
        self.current_state.as_ref().map(|state| state.name())
    }

    /// Runs the global state, then the current state. A transition returned by
    /// either hook is applied before the next hook runs.
    pub fn update(&mut self, owner: &mut E) -> Result<(), StateMachineError> {
        if let Some(global) = self.global_state.clone() {
            let transition = global.execute(owner);
            self.apply(owner, transition)?;
        }

        if let Some(current) = self.current_state.clone() {
            let transition = current.execute(owner);
            self.apply(owner, transition)?;
        }

        Ok(())
    }

    /// Exit hook of the old state runs before the swap, enter hook of the new
    /// state after it.
    pub fn change_state(&mut self, owner: &mut E, new_state: StateRef<E>) {
        self.previous_state = self.current_state.take();

        if let Some(previous) = &self.previous_state {
            previous.exit(owner);
        }

        debug!(
            owner = %self.owner,
            from = self.previous_state.as_ref().map(|state| state.name()).unwrap_or("none"),
            to = new_state.name(),
            "state_changed"
        );

        self.current_state = Some(Rc::clone(&new_state));
        new_state.enter(owner);
    }

    pub fn revert_to_previous_state(&mut self, owner: &mut E) -> Result<(), StateMachineError> {
        let previous = self
            .previous_state
            .clone()
            .ok_or_else(|| StateMachineError::NoPreviousState {
                owner: self.owner,
                current: self.current_state_name().unwrap_or("none"),
            })?;
        self.change_state(owner, previous);
        Ok(())
    }

    pub fn is_in_state(&self, state: &StateRef<E>) -> bool {
        self.current_state
            .as_ref()
            .is_some_and(|current| Rc::ptr_eq(current, state))
    }

    fn apply(&mut self, owner: &mut E, transition: Transition<E>) -> Result<(), StateMachineError> {
        match transition {
            Transition::Stay => Ok(()),
            Transition::Change(next) => {
                self.change_state(owner, next);
                Ok(())
            }
            Transition::Revert => self.revert_to_previous_state(owner),
        }
    }
}
