//! Conversation layer: the search wizard and the loop feeding it.

mod dispatcher;
mod runner;

pub use dispatcher::Dispatcher;
pub use runner::run_bot;
