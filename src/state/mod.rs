//! State layer: the [`StateStore`] and its [`StateSnapshot`]s.

pub mod snapshot;
pub mod store;

pub use snapshot::StateSnapshot;
pub use store::StateStore;
