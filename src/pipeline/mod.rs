//! Pipeline entry points.
//!
//! - `diff`: pick the ads a search has not seen yet
//! - `Poller`: periodic fetch, parse, diff, store and notify over all searches

mod diff;
pub mod poll;

pub use diff::diff;
pub use poll::Poller;
