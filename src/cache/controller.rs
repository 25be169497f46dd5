//! Lifecycle state machine for one cache version.
//!
//! ```text
//! Uninstalled → Installing → Installed → Activating → Active → Redundant
//!                   │                                   ▲
//!                   └── asset fetch failure ──► Redundant
//! ```
//!
//! Each lifecycle handler is an `async fn`; the event is finished when its
//! future resolves. Write-backs spawned while serving requests keep running
//! after `handle_fetch` returns, and `settle()` waits for all of them.

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use url::Url;

use super::fetch::Fetcher;
use super::store::CacheStorage;
use super::types::{Request, Response};
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult, ConfigError};
use crate::logging::{self, Component};

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninstalled,
    Installing,
    Installed,
    Activating,
    Active,
    /// Failed to install, or superseded by a newer version.
    Redundant,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerState::Uninstalled => "uninstalled",
            ControllerState::Installing => "installing",
            ControllerState::Installed => "installed",
            ControllerState::Activating => "activating",
            ControllerState::Active => "active",
            ControllerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// One asset from the install manifest, as configured and as resolved.
#[derive(Debug, Clone)]
struct Asset {
    path: String,
    url: Url,
}

pub struct CacheController {
    prefix: String,
    version: String,
    bucket: String,
    origin: Url,
    assets: Vec<Asset>,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    state: Arc<Mutex<ControllerState>>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for CacheController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheController")
            .field("bucket", &self.bucket)
            .field("origin", &self.origin.as_str())
            .field("state", &self.state())
            .finish()
    }
}

impl CacheController {
    /// Resolves the origin and asset manifest up front, so a bad URL is a
    /// configuration error rather than an install failure.
    pub fn new(
        config: &CacheConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, ConfigError> {
        let origin = Url::parse(&config.origin).map_err(|e| ConfigError::InvalidUrl {
            url: config.origin.clone(),
            reason: e.to_string(),
        })?;

        let assets = config
            .assets
            .iter()
            .map(|path| {
                let url = origin.join(path).map_err(|e| ConfigError::InvalidUrl {
                    url: path.clone(),
                    reason: e.to_string(),
                })?;
                if url.origin() != origin.origin() {
                    return Err(ConfigError::InvalidUrl {
                        url: path.clone(),
                        reason: "install assets must be same-origin".to_string(),
                    });
                }
                Ok(Asset {
                    path: path.clone(),
                    url,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            prefix: config.prefix.clone(),
            version: config.version.clone(),
            bucket: config.bucket_name(),
            origin,
            assets,
            storage,
            fetcher,
            state: Arc::new(Mutex::new(ControllerState::Uninstalled)),
            pending: Mutex::new(Vec::new()),
        })
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn state(&self) -> ControllerState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(ControllerState::Redundant)
    }

    fn set_state(&self, to: ControllerState) {
        if let Ok(mut state) = self.state.lock() {
            *state = to;
        }
    }

    /// Moves to `to` if the current state is `from`, atomically.
    fn transition(&self, from: ControllerState, to: ControllerState) -> CacheResult<()> {
        let mut state = self.state.lock().map_err(|_| CacheError::Storage {
            message: "controller state lock poisoned".to_string(),
        })?;
        if *state != from {
            return Err(CacheError::InvalidTransition {
                from: state.to_string(),
                to: to.to_string(),
            });
        }
        *state = to;
        logging::debug(
            Component::Cache,
            Some(&self.bucket),
            &format!("{} -> {}", from, to),
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Install
    // -----------------------------------------------------------------------

    /// Fetches every manifest asset, then stores them in one batch.
    ///
    /// Nothing is written unless every asset came back with a 2xx status.
    /// On failure the controller becomes `Redundant` and never activates.
    pub async fn install(&self) -> CacheResult<()> {
        self.transition(ControllerState::Uninstalled, ControllerState::Installing)?;

        match self.populate().await {
            Ok(stored) => {
                logging::log_install_summary(&self.bucket, stored);
                self.transition(ControllerState::Installing, ControllerState::Installed)
            }
            Err(err) => {
                self.set_state(ControllerState::Redundant);
                logging::log_cache_failure(&self.bucket, "install", &err);
                Err(err)
            }
        }
    }

    async fn populate(&self) -> CacheResult<usize> {
        let mut entries = Vec::with_capacity(self.assets.len());
        for asset in &self.assets {
            let request = Request::get(asset.url.clone());
            let response = self.fetcher.fetch(&request).await.map_err(|e| {
                CacheError::AssetFetchFailure {
                    path: asset.path.clone(),
                    reason: e.to_string(),
                }
            })?;
            if !response.is_ok() {
                return Err(CacheError::AssetFetchFailure {
                    path: asset.path.clone(),
                    reason: format!("HTTP {}", response.status),
                });
            }
            entries.push((request, response));
        }

        let stored = entries.len();
        self.storage.open(&self.bucket).await?;
        self.storage.put_all(&self.bucket, entries).await?;
        Ok(stored)
    }

    // -----------------------------------------------------------------------
    // Activate
    // -----------------------------------------------------------------------

    /// Deletes every other bucket of this system and becomes active.
    ///
    /// Buckets not carrying this system's prefix are left alone. Returns the
    /// names of the deleted buckets. Pruning is best-effort: a bucket that
    /// cannot be listed or deleted is logged and left for the next
    /// activation, and the controller still becomes active.
    pub async fn activate(&self) -> CacheResult<Vec<String>> {
        self.transition(ControllerState::Installed, ControllerState::Activating)?;

        let deleted = self.prune_stale_buckets().await;
        self.transition(ControllerState::Activating, ControllerState::Active)?;
        logging::info(
            Component::Cache,
            Some(&self.bucket),
            &format!("active; removed {} stale bucket(s)", deleted.len()),
        );
        Ok(deleted)
    }

    async fn prune_stale_buckets(&self) -> Vec<String> {
        let names = match self.storage.keys().await {
            Ok(names) => names,
            Err(err) => {
                logging::log_cache_failure(&self.bucket, "list buckets", &err);
                return Vec::new();
            }
        };

        let owned_prefix = format!("{}-", self.prefix);
        let mut deleted = Vec::new();
        for name in names {
            if name == self.bucket || !name.starts_with(&owned_prefix) {
                continue;
            }
            match self.storage.delete(&name).await {
                Ok(true) => deleted.push(name),
                Ok(false) => {}
                Err(err) => logging::log_cache_failure(&name, "delete bucket", &err),
            }
        }
        deleted
    }

    /// Marks this version superseded. It will refuse further requests.
    pub fn mark_redundant(&self) {
        self.set_state(ControllerState::Redundant);
        logging::debug(Component::Cache, Some(&self.bucket), "superseded");
    }

    // -----------------------------------------------------------------------
    // Fetch
    // -----------------------------------------------------------------------

    /// Serves an intercepted request.
    ///
    /// - same-origin: cache first, then network (no write-back)
    /// - cross-origin: network first with background write-back of 2xx
    ///   responses, then cache on network failure
    pub async fn handle_fetch(&self, request: Request) -> CacheResult<Response> {
        let state = self.state();
        if state != ControllerState::Active {
            return Err(CacheError::NotActive {
                state: state.to_string(),
            });
        }

        if request.is_same_origin(&self.origin) {
            self.cache_first(&request).await
        } else {
            self.network_first(request).await
        }
    }

    async fn cache_first(&self, request: &Request) -> CacheResult<Response> {
        if let Some(hit) = self.storage.match_request(&self.bucket, request).await? {
            return Ok(hit);
        }
        self.fetcher.fetch(request).await.inspect_err(|err| {
            logging::log_cache_failure(request.url.as_str(), "fetch", err);
        })
    }

    async fn network_first(&self, request: Request) -> CacheResult<Response> {
        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                if response.is_ok() && request.is_http() && request.cache_key().is_some() {
                    self.spawn_write_back(request, response.clone());
                }
                Ok(response)
            }
            Err(err) => {
                logging::log_cache_failure(request.url.as_str(), "fetch", &err);
                match self.storage.match_request(&self.bucket, &request).await? {
                    Some(cached) => Ok(cached),
                    None => {
                        let err = CacheError::NoResponse {
                            url: request.url.to_string(),
                        };
                        logging::log_cache_failure(request.url.as_str(), "fallback", &err);
                        Err(err)
                    }
                }
            }
        }
    }

    fn spawn_write_back(&self, request: Request, response: Response) {
        let storage = Arc::clone(&self.storage);
        let state = Arc::clone(&self.state);
        let bucket = self.bucket.clone();
        let handle = tokio::spawn(async move {
            // A superseded version must not resurrect its pruned bucket.
            let live = state
                .lock()
                .map(|s| *s == ControllerState::Active)
                .unwrap_or(false);
            if !live {
                return;
            }
            if let Err(err) = storage.put(&bucket, &request, response).await {
                logging::log_cache_failure(request.url.as_str(), "write-back", &err);
            }
        });
        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|h| !h.is_finished());
            pending.push(handle);
        }
    }

    /// Waits for every outstanding write-back. Returns how many were awaited.
    pub async fn settle(&self) -> usize {
        let handles = match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => return 0,
        };
        let count = handles.len();
        for handle in handles {
            if let Err(err) = handle.await {
                logging::warn(
                    Component::Cache,
                    Some(&self.bucket),
                    &format!("write-back task ended abnormally: {}", err),
                );
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryCacheStorage;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Fetcher answering from a fixed table; unknown URLs are network failures.
    #[derive(Default)]
    struct ScriptedFetcher {
        responses: HashMap<String, Response>,
    }

    impl ScriptedFetcher {
        fn with(mut self, url: &str, response: Response) -> Self {
            self.responses.insert(url.to_string(), response);
            self
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, request: &Request) -> CacheResult<Response> {
            self.responses
                .get(request.url.as_str())
                .cloned()
                .ok_or_else(|| CacheError::NetworkFailure {
                    url: request.url.to_string(),
                    reason: "offline".to_string(),
                })
        }
    }

    fn config() -> CacheConfig {
        CacheConfig {
            origin: "https://tank.example/".to_string(),
            ..CacheConfig::default()
        }
    }

    fn full_site() -> ScriptedFetcher {
        ScriptedFetcher::default()
            .with("https://tank.example/index.html", Response::new(200, "<html>"))
            .with("https://tank.example/data/optimal.js", Response::new(200, "js"))
            .with("https://tank.example/manifest.webmanifest", Response::new(200, "{}"))
    }

    #[test]
    fn test_assets_resolve_against_origin() {
        let controller = CacheController::new(
            &config(),
            Arc::new(MemoryCacheStorage::new()),
            Arc::new(full_site()),
        )
        .unwrap();
        let urls: Vec<_> = controller.assets.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://tank.example/index.html",
                "https://tank.example/data/optimal.js",
                "https://tank.example/manifest.webmanifest",
            ]
        );
        assert_eq!(controller.state(), ControllerState::Uninstalled);
    }

    #[test]
    fn test_cross_origin_asset_rejected_at_construction() {
        let mut cfg = config();
        cfg.assets.push("https://cdn.example/lib.js".to_string());
        let result = CacheController::new(
            &cfg,
            Arc::new(MemoryCacheStorage::new()),
            Arc::new(full_site()),
        );
        assert!(matches!(result, Err(ConfigError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_install_then_activate_reaches_active() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let controller =
            CacheController::new(&config(), storage.clone(), Arc::new(full_site())).unwrap();

        controller.install().await.unwrap();
        assert_eq!(controller.state(), ControllerState::Installed);
        assert_eq!(storage.entry_count("aquarium-tracker-v1.0"), 3);

        controller.activate().await.unwrap();
        assert_eq!(controller.state(), ControllerState::Active);
    }

    #[tokio::test]
    async fn test_non_ok_asset_fails_install() {
        let fetcher = full_site().with(
            "https://tank.example/manifest.webmanifest",
            Response::new(404, "not found"),
        );
        let storage = Arc::new(MemoryCacheStorage::new());
        let controller = CacheController::new(&config(), storage.clone(), Arc::new(fetcher)).unwrap();

        let err = controller.install().await.unwrap_err();
        assert!(
            matches!(err, CacheError::AssetFetchFailure { ref path, .. } if path == "./manifest.webmanifest"),
            "got {:?}",
            err
        );
        assert_eq!(controller.state(), ControllerState::Redundant);
        assert!(!storage.has("aquarium-tracker-v1.0").await.unwrap());
    }

    #[tokio::test]
    async fn test_lifecycle_events_out_of_order_are_rejected() {
        let controller = CacheController::new(
            &config(),
            Arc::new(MemoryCacheStorage::new()),
            Arc::new(full_site()),
        )
        .unwrap();

        assert!(matches!(
            controller.activate().await,
            Err(CacheError::InvalidTransition { .. })
        ));
        let req = Request::parse_get("https://tank.example/index.html").unwrap();
        assert!(matches!(
            controller.handle_fetch(req).await,
            Err(CacheError::NotActive { .. })
        ));

        controller.install().await.unwrap();
        assert!(matches!(
            controller.install().await,
            Err(CacheError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_activate_leaves_foreign_buckets_alone() {
        let storage = Arc::new(MemoryCacheStorage::new());
        storage.open("aquarium-tracker-v0.9").await.unwrap();
        storage.open("some-other-app-v3").await.unwrap();

        let controller =
            CacheController::new(&config(), storage.clone(), Arc::new(full_site())).unwrap();
        controller.install().await.unwrap();
        let deleted = controller.activate().await.unwrap();

        assert_eq!(deleted, vec!["aquarium-tracker-v0.9"]);
        assert_eq!(
            storage.keys().await.unwrap(),
            vec!["some-other-app-v3", "aquarium-tracker-v1.0"]
        );
    }

    #[tokio::test]
    async fn test_redundant_controller_refuses_requests() {
        let controller = CacheController::new(
            &config(),
            Arc::new(MemoryCacheStorage::new()),
            Arc::new(full_site()),
        )
        .unwrap();
        controller.install().await.unwrap();
        controller.activate().await.unwrap();
        controller.mark_redundant();

        let req = Request::parse_get("https://tank.example/index.html").unwrap();
        let err = controller.handle_fetch(req).await.unwrap_err();
        assert!(matches!(err, CacheError::NotActive { ref state } if state == "redundant"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_superseded_write_back_does_not_recreate_bucket() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let fetcher = full_site().with("https://cdn.example/chart.js", Response::new(200, "chart"));
        let controller = CacheController::new(&config(), storage.clone(), Arc::new(fetcher)).unwrap();
        controller.install().await.unwrap();
        controller.activate().await.unwrap();

        // The write-back task cannot run before this test yields.
        let req = Request::parse_get("https://cdn.example/chart.js").unwrap();
        let resp = controller.handle_fetch(req).await.unwrap();
        assert_eq!(resp.status, 200);

        controller.mark_redundant();
        assert!(storage.delete("aquarium-tracker-v1.0").await.unwrap());

        assert_eq!(controller.settle().await, 1);
        assert!(!storage.has("aquarium-tracker-v1.0").await.unwrap());
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settle_with_nothing_pending() {
        let controller = CacheController::new(
            &config(),
            Arc::new(MemoryCacheStorage::new()),
            Arc::new(full_site()),
        )
        .unwrap();
        assert_eq!(controller.settle().await, 0);
    }
}
