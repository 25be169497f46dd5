/// Offline asset cache.
///
/// Keeps the tracker page usable without a network by serving its static
/// assets from a single versioned bucket. Submodules:
/// - `types`: request/response values and cache keys
/// - `store`: the bucket storage trait and its in-memory backend
/// - `fetch`: the network trait and its `reqwest` backend
/// - `controller`: install/activate/fetch state machine for one version
/// - `registration`: rolls out new versions and retires old ones

pub mod controller;
pub mod fetch;
pub mod registration;
pub mod store;
pub mod types;

pub use controller::{CacheController, ControllerState};
pub use fetch::{Fetcher, HttpFetcher};
pub use registration::CacheRegistration;
pub use store::{CacheStorage, MemoryCacheStorage};
pub use types::{Request, Response};
