//! Weak Reference Map Module
//!
//! Reachability-bounded key-value storage.

mod map;

pub use map::WeakRefMap;
