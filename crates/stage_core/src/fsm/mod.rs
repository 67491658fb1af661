mod machine;
mod state;

pub use machine::{StateMachine, StateMachineError};
pub use state::{State, StateRef, Transition};
