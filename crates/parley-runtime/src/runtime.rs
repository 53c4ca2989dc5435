//! Runtime assembly.
//!
//! [`ParleyRuntime`] turns a [`ParleyConfig`] into a ready [`Orchestrator`]:
//! cache lifetimes and transport options come from configuration, the cache
//! backend can be swapped, and logging is installed on request.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use parley_runtime::ParleyRuntime;
//!
//! // Loads parley.toml and PARLEY_* variables, installs logging
//! let runtime = ParleyRuntime::new()?;
//!
//! runtime.drivers().register_fn("slack", |req| Box::new(SlackDriver::new(req)));
//! runtime.hears("hello", greet)?;
//!
//! // Hand every inbound request to the orchestrator
//! let report = runtime.handle(request).await?;
//! ```

use std::ops::Deref;

use tracing::info;

use parley_core::{RawRequest, SharedCache};
use parley_framework::{CommandHandler, DispatchReport, DispatchResult, Orchestrator};

use crate::config::{ConfigLoader, ParleyConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;

/// A configured orchestrator plus the configuration it was built from.
///
/// Dereferences to [`Orchestrator`], so registration methods are available
/// directly.
#[derive(Debug, Clone)]
pub struct ParleyRuntime {
    config: ParleyConfig,
    orchestrator: Orchestrator,
}

impl ParleyRuntime {
    /// Loads configuration from the default locations, installs logging and
    /// builds the runtime with an in-memory cache.
    pub fn new() -> RuntimeResult<Self> {
        Self::builder().init_logging(true).build()
    }

    /// Returns a builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    /// Builds a runtime from an already loaded configuration.
    pub fn from_config(config: ParleyConfig) -> RuntimeResult<Self> {
        Self::builder().config(config).build()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ParleyConfig {
        &self.config
    }

    /// Returns the orchestrator.
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Registers an unrestricted command.
    pub fn hears<H: CommandHandler>(
        &self,
        pattern: impl Into<String>,
        handler: H,
    ) -> RuntimeResult<&Self> {
        self.orchestrator.hears(pattern, handler)?;
        Ok(self)
    }

    /// Processes one inbound request.
    pub async fn handle(&self, request: RawRequest) -> DispatchResult<DispatchReport> {
        self.orchestrator.handle(request).await
    }

    /// Returns a clone of the orchestrator for use as a `tower::Service`.
    pub fn service(&self) -> Orchestrator {
        self.orchestrator.clone()
    }
}

impl Deref for ParleyRuntime {
    type Target = Orchestrator;

    fn deref(&self) -> &Self::Target {
        &self.orchestrator
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`ParleyRuntime`].
#[derive(Default)]
pub struct RuntimeBuilder {
    config: Option<ParleyConfig>,
    loader: Option<ConfigLoader>,
    cache: Option<SharedCache>,
    init_logging: bool,
}

impl RuntimeBuilder {
    /// Uses an already loaded configuration instead of loading one.
    pub fn config(mut self, config: ParleyConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Loads configuration with a customized loader.
    pub fn loader(mut self, loader: ConfigLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Uses `cache` for conversation and user state.
    pub fn cache(mut self, cache: SharedCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Installs the global logging subscriber while building.
    pub fn init_logging(mut self, enabled: bool) -> Self {
        self.init_logging = enabled;
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> RuntimeResult<ParleyRuntime> {
        let config = match self.config {
            Some(config) => {
                validate_config(&config)?;
                config
            }
            None => self.loader.unwrap_or_default().load()?,
        };

        if self.init_logging {
            logging::init_from_config(&config.logging)?;
        }

        let mut builder = Orchestrator::builder()
            .conversation_ttl(config.cache.conversation_ttl())
            .user_ttl(config.cache.user_ttl())
            .transport(config.transport.clone());
        if let Some(cache) = self.cache {
            builder = builder.cache(cache);
        }

        info!(
            conversation_ttl_minutes = config.cache.conversation_ttl_minutes,
            user_ttl_minutes = config.cache.user_ttl_minutes,
            transport_options = config.transport.len(),
            "Parley runtime ready"
        );

        Ok(ParleyRuntime {
            config,
            orchestrator: builder.build(),
        })
    }
}

impl std::fmt::Debug for RuntimeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeBuilder")
            .field("config", &self.config)
            .field("init_logging", &self.init_logging)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use parley_core::{InMemoryCache, TtlCache, UserInfo, UserSnapshot};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_from_config_applies_ttls() {
        let mut config = ParleyConfig::default();
        config.cache.conversation_ttl_minutes = 5;
        config.cache.user_ttl_minutes = 2;

        let runtime = ParleyRuntime::from_config(config).unwrap();
        assert_eq!(
            runtime.conversations().ttl(),
            Duration::from_secs(5 * 60)
        );
        assert_eq!(runtime.users().ttl(), Duration::from_secs(2 * 60));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ParleyConfig::default();
        config.cache.user_ttl_minutes = 0;
        let err = ParleyRuntime::from_config(config).unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[test]
    fn test_oversized_ttl_rejected() {
        let mut config = ParleyConfig::default();
        config.cache.conversation_ttl_minutes = u64::MAX;
        let err = ParleyRuntime::from_config(config).unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }

    #[test]
    fn test_invalid_command_pattern() {
        async fn noop(
            _ctx: Arc<parley_framework::ExecutionContext>,
            _captures: Vec<String>,
        ) -> parley_framework::HandlerResult {
            Ok(())
        }

        let runtime = ParleyRuntime::from_config(ParleyConfig::default()).unwrap();
        assert!(runtime.hears("hello", noop).is_ok());
        assert!(matches!(
            runtime.hears("(unclosed", noop),
            Err(RuntimeError::Command(_))
        ));
        assert_eq!(runtime.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_custom_cache_is_shared() {
        let cache = Arc::new(InMemoryCache::new());
        let mut config = ParleyConfig::default();
        config.transport.insert("token".into(), json!("secret"));

        let runtime = ParleyRuntime::builder()
            .config(config)
            .cache(cache.clone())
            .build()
            .unwrap();
        assert_eq!(runtime.config().transport["token"], "secret");

        let user = UserInfo::from_snapshot(UserSnapshot::new("U1"));
        runtime.users().put("slack", &user).await.unwrap();
        assert!(cache.has("user:slack:U1").await.unwrap());
    }
}
