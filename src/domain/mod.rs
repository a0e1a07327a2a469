//! Domain model: aggregates, value objects and the events they produce.
pub mod aggregates;
pub mod events;
pub mod stats;
pub mod value_objects;
