pub mod snapshot;

pub use snapshot::{SnapshotStore, StoreError, StoreResult, STORE_NAMESPACE};
