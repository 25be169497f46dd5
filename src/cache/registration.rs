//! Owns the active cache controller and rolls out new versions.
//!
//! A rollout installs the new version, lets the old version's pending
//! write-backs finish, activates the new version (which prunes the old
//! bucket) and only then retires the old controller. If the install fails
//! the old controller keeps serving.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::controller::CacheController;
use super::fetch::Fetcher;
use super::store::CacheStorage;
use super::types::{Request, Response};
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::logging::{self, Component};

pub struct CacheRegistration {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    active: RwLock<Option<Arc<CacheController>>>,
    /// Serialises rollouts without blocking request routing during install.
    rollout: Mutex<()>,
}

impl CacheRegistration {
    pub fn new(storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            storage,
            fetcher,
            active: RwLock::new(None),
            rollout: Mutex::new(()),
        }
    }

    /// The controller currently serving requests, if any.
    pub async fn active(&self) -> Option<Arc<CacheController>> {
        self.active.read().await.clone()
    }

    /// Brings `config`'s version live.
    ///
    /// Re-registering the version that is already active is a no-op.
    pub async fn update(&self, config: &CacheConfig) -> CacheResult<Arc<CacheController>> {
        let _rollout = self.rollout.lock().await;

        if let Some(current) = self.active().await {
            if current.bucket_name() == config.bucket_name() {
                return Ok(current);
            }
        }

        let next = Arc::new(CacheController::new(
            config,
            Arc::clone(&self.storage),
            Arc::clone(&self.fetcher),
        )?);

        logging::info(
            Component::Cache,
            Some(next.bucket_name()),
            &format!("installing version {}", next.version()),
        );
        // The old version keeps serving while the new one downloads.
        next.install().await?;

        // Requests wait from here until the swap is done.
        let mut active = self.active.write().await;
        if let Some(previous) = active.as_ref() {
            previous.settle().await;
        }
        next.activate().await?;

        let previous = active.replace(Arc::clone(&next));
        drop(active);

        if let Some(previous) = previous {
            previous.mark_redundant();
            previous.settle().await;
        }
        Ok(next)
    }

    /// Routes a request to the active controller.
    pub async fn handle_fetch(&self, request: Request) -> CacheResult<Response> {
        let Some(controller) = self.active().await else {
            return Err(CacheError::NotActive {
                state: "unregistered".to_string(),
            });
        };
        controller.handle_fetch(request).await
    }

    /// Waits for the active controller's outstanding write-backs.
    pub async fn settle(&self) -> usize {
        match self.active().await {
            Some(controller) => controller.settle().await,
            None => 0,
        }
    }
}
