//! Mutation-safe handler registries with handle-based disconnect.

mod connectable;

pub use connectable::{Connectable, ConnectHandle};
