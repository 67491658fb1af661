use std::fmt;
use std::rc::Rc;

/// Shared, stateless behavior. One instance may drive any number of owners;
/// per-owner data belongs on the owner.
pub type StateRef<E> = Rc<dyn State<E>>;

/// What a state wants the machine to do after its `execute` hook returns.
pub enum Transition<E> {
    Stay,
    Change(StateRef<E>),
    Revert,
}

impl<E> Transition<E> {
    pub fn change_to(state: &StateRef<E>) -> Self {
        Self::Change(Rc::clone(state))
    }
}

impl<E> fmt::Debug for Transition<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stay => f.write_str("Stay"),
            Self::Change(state) => f.debug_tuple("Change").field(&state.name()).finish(),
            Self::Revert => f.write_str("Revert"),
        }
    }
}

pub trait State<E> {
    fn name(&self) -> &'static str;

    fn enter(&self, _owner: &mut E) {}

    fn execute(&self, owner: &mut E) -> Transition<E>;

    fn exit(&self, _owner: &mut E) {}
}
