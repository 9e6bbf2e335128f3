//! Graph storage.

pub mod graph;

pub use graph::{AtomGraph, EdgePolicy, InsertOutcome, RemovedAtom, UpdateOutcome};
