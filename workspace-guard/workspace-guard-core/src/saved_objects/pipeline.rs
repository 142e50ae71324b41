//! Ordered stack of client wrappers over a base saved-object client.
//!
//! Wrappers are applied from the lowest priority outward, so the wrapper with
//! the highest priority sees a call first. A client can be built with one
//! named stage left out, which lets a stage fetch objects through the rest of
//! the stack without re-entering itself.

use super::SavedObjectsClient;
use crate::request::Request;
use anyhow::{anyhow, Result};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WrapperId(&'static str);

impl WrapperId {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for WrapperId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// What a wrapper factory is handed when building a scoped client.
pub struct WrapperOptions {
    pub client: Arc<dyn SavedObjectsClient>,
    pub request: Request,
}

pub trait ClientWrapperFactory: Send + Sync {
    fn wrap(&self, options: WrapperOptions) -> Arc<dyn SavedObjectsClient>;
}

struct Stage {
    priority: i32,
    id: WrapperId,
    factory: Arc<dyn ClientWrapperFactory>,
}

#[derive(Default)]
pub struct ClientProviderBuilder {
    stages: Vec<Stage>,
}

impl ClientProviderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_client_wrapper(
        &mut self,
        priority: i32,
        id: WrapperId,
        factory: Arc<dyn ClientWrapperFactory>,
    ) -> Result<()> {
        if self.stages.iter().any(|s| s.id == id) {
            return Err(anyhow!("client wrapper '{}' is already registered", id));
        }
        self.stages.push(Stage {
            priority,
            id,
            factory,
        });
        Ok(())
    }

    pub fn build(mut self, base: Arc<dyn SavedObjectsClient>) -> Arc<ScopedClientProvider> {
        // stable: equal priorities keep registration order
        self.stages.sort_by_key(|s| s.priority);
        Arc::new(ScopedClientProvider {
            base,
            stages: self.stages,
        })
    }
}

pub struct ScopedClientProvider {
    base: Arc<dyn SavedObjectsClient>,
    stages: Vec<Stage>,
}

impl ScopedClientProvider {
    /// Fully wrapped client for `request`.
    pub fn client(&self, request: &Request) -> Arc<dyn SavedObjectsClient> {
        self.build_client(request, None)
    }

    /// Client for `request` with every stage except `skipped`.
    pub fn client_bypassing(
        &self,
        request: &Request,
        skipped: WrapperId,
    ) -> Arc<dyn SavedObjectsClient> {
        self.build_client(request, Some(skipped))
    }

    /// Stage ids from innermost to outermost.
    pub fn wrapper_ids(&self) -> Vec<WrapperId> {
        self.stages.iter().map(|s| s.id).collect()
    }

    fn build_client(
        &self,
        request: &Request,
        skipped: Option<WrapperId>,
    ) -> Arc<dyn SavedObjectsClient> {
        self.stages
            .iter()
            .filter(|s| Some(s.id) != skipped)
            .fold(self.base.clone(), |client, stage| {
                stage.factory.wrap(WrapperOptions {
                    client,
                    request: request.clone(),
                })
            })
    }
}
