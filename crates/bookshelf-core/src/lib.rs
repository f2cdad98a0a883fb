// Library root for the client core: configuration, wire types, persisted
// state, and selection tracking.

pub mod config;
pub mod protocol;
pub mod selection;
pub mod store;
