use ebb_future::Future;
use ebb_types::EbbId;

use crate::error::Result;
use crate::watch::WatchStream;

/// Cluster-wide key/value directory keyed by identifier and relative path.
///
/// Values are strings, typically serialized configuration. A `set` followed
/// by a `get` from the same client observes the new value; concurrent writers
/// from different clients resolve as last write wins.
///
/// Failures travel inside the returned futures as
/// [`DirectoryError`](crate::DirectoryError)s; a `get` or `list` of a missing
/// entry fails with `NotFound`.
pub trait GlobalIdMap: Send + Sync {
    fn get(&self, id: EbbId, path: &str) -> Future<String>;

    fn set(&self, id: EbbId, value: String, path: &str) -> Future<()>;

    /// Names directly below `(id, path)`, sorted.
    fn list(&self, id: EbbId, path: &str) -> Future<Vec<String>>;

    fn exists(&self, id: EbbId, path: &str) -> Future<bool>;

    /// Subscribe to changes at and below `(id, path)`.
    fn watch(&self, id: EbbId, path: &str) -> Result<WatchStream>;
}
