//! Upload orchestration over a primary and an optional fallback
//! provider.
//!
//! Providers are resolved lazily through the factory registry on the
//! first operation. Retry and failover are layered: each provider
//! retries its own transport internally, and the service fails over to
//! the fallback provider afterwards.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::domain::{
    DeleteResult, ErrorCode, FileMetadata, ProviderType, UploadError, UploadFile, UploadedFile,
};
use crate::infrastructure::config::{ConfigPatch, UploadPolicy, UploadServiceConfig};
use crate::infrastructure::storage::{factory, StorageProvider};

struct ServiceState {
    config: UploadServiceConfig,
    primary: Option<Arc<dyn StorageProvider>>,
    fallback: Option<Arc<dyn StorageProvider>>,
}

/// Orchestrating facade the rest of the application talks to.
pub struct UploadService {
    state: RwLock<ServiceState>,
}

impl UploadService {
    /// Create a service over the given configuration. Providers are not
    /// constructed until the first operation needs them.
    #[must_use]
    pub fn new(config: UploadServiceConfig) -> Self {
        Self { state: RwLock::new(ServiceState { config, primary: None, fallback: None }) }
    }

    /// Create a service with pre-built providers, bypassing the factory
    /// registry. Composition seam for embedding and tests.
    #[must_use]
    pub fn with_providers(
        config: UploadServiceConfig,
        primary: Arc<dyn StorageProvider>,
        fallback: Option<Arc<dyn StorageProvider>>,
    ) -> Self {
        Self {
            state: RwLock::new(ServiceState { config, primary: Some(primary), fallback }),
        }
    }

    /// Current configuration snapshot.
    pub async fn config(&self) -> UploadServiceConfig {
        self.state.read().await.config.clone()
    }

    /// Resolve (and memoize) the primary and fallback providers.
    ///
    /// If the default provider fails to construct, a distinct configured
    /// fallback is promoted into the primary slot. If that fails too the
    /// operation (and every subsequent one until the configuration
    /// changes) fails with `PROVIDER_INITIALIZATION_FAILED`.
    async fn ensure_providers(
        &self,
    ) -> Result<(Arc<dyn StorageProvider>, Option<Arc<dyn StorageProvider>>), UploadError> {
        {
            let state = self.state.read().await;
            if let Some(primary) = &state.primary {
                return Ok((primary.clone(), state.fallback.clone()));
            }
        }

        let mut state = self.state.write().await;
        // Another caller may have initialized while we waited.
        if let Some(primary) = &state.primary {
            return Ok((primary.clone(), state.fallback.clone()));
        }

        let config = state.config.clone();
        let fallback_type =
            config.fallback_provider.filter(|f| *f != config.default_provider);

        match factory::create_provider(config.default_provider, &config).await {
            Ok(primary) => {
                // Fallback construction failure is non-fatal here; the
                // service just runs without per-operation failover.
                let fallback = match fallback_type {
                    Some(fallback_type) => {
                        match factory::create_provider(fallback_type, &config).await {
                            Ok(fallback) => Some(fallback),
                            Err(e) => {
                                warn!(
                                    fallback = %fallback_type,
                                    "fallback provider unavailable: {e}"
                                );
                                None
                            }
                        }
                    }
                    None => None,
                };

                state.primary = Some(primary.clone());
                state.fallback = fallback.clone();
                Ok((primary, fallback))
            }
            Err(primary_err) => {
                if let Some(fallback_type) = fallback_type {
                    match factory::create_provider(fallback_type, &config).await {
                        Ok(promoted) => {
                            warn!(
                                default = %config.default_provider,
                                promoted = %fallback_type,
                                "default provider failed to initialize, promoting fallback to primary: {primary_err}"
                            );
                            state.primary = Some(promoted.clone());
                            state.fallback = None;
                            return Ok((promoted, None));
                        }
                        Err(fallback_err) => {
                            error!(
                                default = %config.default_provider,
                                fallback = %fallback_type,
                                "fallback provider also failed to initialize: {fallback_err}"
                            );
                        }
                    }
                }

                error!(
                    default = %config.default_provider,
                    "no storage provider could be initialized: {primary_err}"
                );
                Err(UploadError::new(
                    config.default_provider,
                    ErrorCode::ProviderInitializationFailed,
                    format!("failed to initialize storage providers: {primary_err}"),
                ))
            }
        }
    }

    async fn policy(&self) -> UploadPolicy {
        self.state.read().await.config.upload.clone()
    }

    async fn resolve_explicit(
        &self,
        provider: ProviderType,
    ) -> Result<Arc<dyn StorageProvider>, UploadError> {
        let config = self.config().await;
        factory::create_provider(provider, &config)
            .await
            .map_err(factory::FactoryError::into_upload_error)
    }

    /// Upload through the primary provider, retrying the whole upload on
    /// the fallback when the primary reports failure.
    ///
    /// When both fail, the primary's error is returned; the fallback's is
    /// only logged.
    pub async fn upload(&self, file: &UploadFile) -> Result<UploadedFile, UploadError> {
        let (primary, fallback) = self.ensure_providers().await?;
        let policy = self.policy().await;
        run_upload(&primary, fallback.as_ref(), &policy, file).await
    }

    /// Delete a key. With an explicit `provider`, only that provider is
    /// consulted; otherwise the primary is tried first and the fallback
    /// second, and on double failure the primary's result is returned.
    pub async fn delete(&self, key: &str, provider: Option<ProviderType>) -> DeleteResult {
        if let Some(provider) = provider {
            return match self.resolve_explicit(provider).await {
                Ok(instance) => instance.delete(key).await,
                Err(e) => DeleteResult::failed(provider, key, e.to_string()),
            };
        }

        let (primary, fallback) = match self.ensure_providers().await {
            Ok(slots) => slots,
            Err(e) => return DeleteResult::failed(e.provider, key, e.to_string()),
        };

        run_delete(&primary, fallback.as_ref(), key).await
    }

    /// URL for a key on the explicit or primary provider. Never falls
    /// back: a file living only on the fallback provider has a different
    /// URL, and guessing would silently hand out the wrong one.
    pub async fn url(&self, key: &str, provider: Option<ProviderType>) -> Result<String, UploadError> {
        let instance = match provider {
            Some(provider) => self.resolve_explicit(provider).await?,
            None => self.ensure_providers().await?.0,
        };

        instance
            .url(key)
            .await
            .map_err(|e| e.into_upload_error(instance.provider_type()))
    }

    /// Best-effort existence across primary then fallback. Never fails;
    /// probe errors degrade to `false`.
    pub async fn exists(&self, key: &str, provider: Option<ProviderType>) -> bool {
        if let Some(provider) = provider {
            return match self.resolve_explicit(provider).await {
                Ok(instance) => instance.exists(key).await.unwrap_or(false),
                Err(_) => false,
            };
        }

        let Ok((primary, fallback)) = self.ensure_providers().await else { return false };

        if primary.exists(key).await.unwrap_or(false) {
            return true;
        }
        match fallback {
            Some(fallback) => fallback.exists(key).await.unwrap_or(false),
            None => false,
        }
    }

    /// Best-effort metadata across primary then fallback; `None` on any
    /// failure.
    pub async fn metadata(
        &self,
        key: &str,
        provider: Option<ProviderType>,
    ) -> Option<FileMetadata> {
        if let Some(provider) = provider {
            return self.resolve_explicit(provider).await.ok()?.metadata(key).await;
        }

        let (primary, fallback) = self.ensure_providers().await.ok()?;

        if let Some(metadata) = primary.metadata(key).await {
            return Some(metadata);
        }
        fallback?.metadata(key).await
    }

    /// Upload many files concurrently. Never fails as a whole: each
    /// member settles independently, and a member whose task dies is
    /// reported as `BATCH_UPLOAD_FAILED`.
    pub async fn upload_multiple(
        &self,
        files: Vec<UploadFile>,
    ) -> Vec<Result<UploadedFile, UploadError>> {
        let (primary, fallback) = match self.ensure_providers().await {
            Ok(slots) => slots,
            // Total initialization failure: every member reports it.
            Err(e) => return files.iter().map(|_| Err(e.clone())).collect(),
        };
        let policy = self.policy().await;
        let provider = primary.provider_type();

        let handles: Vec<_> = files
            .into_iter()
            .map(|file| {
                let primary = primary.clone();
                let fallback = fallback.clone();
                let policy = policy.clone();
                tokio::spawn(async move {
                    run_upload(&primary, fallback.as_ref(), &policy, &file).await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(join_err) => results.push(Err(UploadError::new(
                    provider,
                    ErrorCode::BatchUploadFailed,
                    format!("upload task failed: {join_err}"),
                ))),
            }
        }
        results
    }

    /// Delete many keys concurrently; one result per key, in order.
    pub async fn delete_multiple(&self, keys: Vec<String>) -> Vec<DeleteResult> {
        let (primary, fallback) = match self.ensure_providers().await {
            Ok(slots) => slots,
            Err(e) => {
                return keys
                    .into_iter()
                    .map(|key| DeleteResult::failed(e.provider, key, e.to_string()))
                    .collect();
            }
        };
        let provider = primary.provider_type();

        let handles: Vec<_> = keys
            .into_iter()
            .map(|key| {
                let primary = primary.clone();
                let fallback = fallback.clone();
                let task_key = key.clone();
                (
                    key,
                    tokio::spawn(async move {
                        run_delete(&primary, fallback.as_ref(), &task_key).await
                    }),
                )
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (key, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(join_err) => results.push(DeleteResult::failed(
                    provider,
                    key,
                    format!("delete task failed: {join_err}"),
                )),
            }
        }
        results
    }

    /// Switch the default provider. The new provider must construct
    /// successfully before the change is committed; cached handles are
    /// then reset so the next operation re-resolves.
    pub async fn switch_provider(&self, provider: ProviderType) -> Result<(), UploadError> {
        let config = self.config().await;
        factory::create_provider(provider, &config)
            .await
            .map_err(factory::FactoryError::into_upload_error)?;

        let mut state = self.state.write().await;
        state.config.default_provider = provider;
        state.primary = None;
        state.fallback = None;
        info!(provider = %provider, "default provider switched");
        Ok(())
    }

    /// Merge a partial configuration update. Provider identity or
    /// section changes invalidate both the service's handles and the
    /// factory registry so the next operation re-resolves from the new
    /// configuration.
    pub async fn update_config(&self, patch: ConfigPatch) {
        let mut state = self.state.write().await;
        let providers_changed = patch.apply(&mut state.config);
        if providers_changed {
            state.primary = None;
            state.fallback = None;
            factory::clear_cache();
            info!("provider configuration changed, cached providers invalidated");
        }
    }
}

/// One upload with failover: primary first, fallback on reported
/// failure, the primary's error surfaced when both fail.
async fn run_upload(
    primary: &Arc<dyn StorageProvider>,
    fallback: Option<&Arc<dyn StorageProvider>>,
    policy: &UploadPolicy,
    file: &UploadFile,
) -> Result<UploadedFile, UploadError> {
    info!(
        provider = %primary.provider_type(),
        name = %file.original_name,
        size = file.size,
        "upload started"
    );

    match primary.upload(file, policy).await {
        Ok(uploaded) => Ok(uploaded),
        Err(primary_err) => {
            let Some(fallback) = fallback else { return Err(primary_err) };

            warn!(
                primary = %primary.provider_type(),
                fallback = %fallback.provider_type(),
                "primary upload failed, retrying on fallback: {primary_err}"
            );

            match fallback.upload(file, policy).await {
                Ok(uploaded) => Ok(uploaded),
                Err(fallback_err) => {
                    // Surfaced error stays the primary's; the fallback's
                    // diagnostic lives only in the log.
                    error!(
                        fallback = %fallback.provider_type(),
                        "fallback upload also failed: {fallback_err}"
                    );
                    Err(primary_err)
                }
            }
        }
    }
}

/// One delete with failover; on double failure the primary's result is
/// returned.
async fn run_delete(
    primary: &Arc<dyn StorageProvider>,
    fallback: Option<&Arc<dyn StorageProvider>>,
    key: &str,
) -> DeleteResult {
    let primary_result = primary.delete(key).await;
    if primary_result.success {
        return primary_result;
    }

    if let Some(fallback) = fallback {
        let fallback_result = fallback.delete(key).await;
        if fallback_result.success {
            return fallback_result;
        }
    }

    primary_result
}
