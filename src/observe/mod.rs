//! Non-intrusive observation of filter execution.

mod observer;

pub use observer::{FilterObserver, ObserverSet};
