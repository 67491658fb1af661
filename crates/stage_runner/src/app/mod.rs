pub(crate) mod bootstrap;
pub(crate) mod loop_runner;

mod behaviors;
mod description;
mod director;
mod proximity;
mod stage;
mod stages;
