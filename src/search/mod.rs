//! Streamed catalog search with live per-site progress.

mod controller;
mod event;

pub use controller::{
    SearchController, SearchError, SearchPhase, SearchProgress, STARTING_MESSAGE,
};
pub use event::ProgressEvent;
