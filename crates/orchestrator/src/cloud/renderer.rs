//! Source rendering via `service-codegen`

use crate::ports::{ArtifactBuilder, ArtifactHandle};
use architect_common::{Error, Result, ServiceSpec};
use async_trait::async_trait;

/// Renders and packs sources on the blocking thread pool
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceRenderer;

#[async_trait]
impl ArtifactBuilder for SourceRenderer {
    async fn render(&self, spec: &ServiceSpec) -> Result<ArtifactHandle> {
        let spec = spec.clone();
        tokio::task::spawn_blocking(move || service_codegen::package_service(&spec))
            .await
            .map_err(|e| Error::Render(format!("render task aborted: {}", e)))?
            .map_err(|e| Error::Render(format!("{:#}", e)))
    }
}
