//! One-time setup: register extra package indexes and drain installs.

use crate::barrier::QuiescenceBarrier;
use boardcheck_core::ports::TargetRegistry;
use boardcheck_core::{Error, Result};
use std::sync::Arc;
use tracing::info;
use url::Url;

/// What to install before any case runs.
#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    pub package_urls: Vec<Url>,
    pub refresh: bool,
    pub install_latest: bool,
}

/// Makes sure asynchronous installation work has fully drained.
pub struct SetupCoordinator {
    registry: Arc<dyn TargetRegistry>,
    barrier: QuiescenceBarrier,
}

impl SetupCoordinator {
    pub fn new(registry: Arc<dyn TargetRegistry>, barrier: QuiescenceBarrier) -> Self {
        Self { registry, barrier }
    }

    /// Submit the install work and block until the scheduler is idle.
    ///
    /// Every failure here is a setup failure.
    pub async fn ensure_ready(&self, request: &InstallRequest) -> Result<()> {
        if !request.package_urls.is_empty() {
            info!(urls = request.package_urls.len(), refresh = request.refresh, "Registering package indexes");
            self.registry
                .register_additional_sources(&request.package_urls, request.refresh)
                .await
                .map_err(|e| as_setup("registering package indexes", e))?;
        }

        if request.install_latest {
            info!("Installing latest platforms");
            self.registry
                .install_latest_of_all()
                .await
                .map_err(|e| as_setup("installing platforms", e))?;
        }

        self.barrier.drain().await?;
        info!("Setup complete");
        Ok(())
    }
}

fn as_setup(stage: &str, err: Error) -> Error {
    if err.is_setup_failure() {
        err
    } else {
        Error::Setup(format!("{} failed: {}", stage, err))
    }
}
