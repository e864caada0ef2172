use serde::{Deserialize, Serialize};

use crate::domain::ProviderType;

/// Runtime mode for the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Local,
    Production,
}

impl std::fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl std::str::FromStr for RuntimeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(format!("Invalid runtime mode: {s}. Valid values: local, production")),
        }
    }
}

/// Upload policy applied before any transport I/O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPolicy {
    /// Maximum accepted payload in bytes.
    pub max_file_size: u64,
    pub allowed_mime_types: Vec<String>,
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        // Menu item imagery: photos and the odd animated banner.
        Self {
            max_file_size: 10 * 1024 * 1024,
            allowed_mime_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
                "image/gif".to_string(),
                "image/avif".to_string(),
            ],
            allowed_extensions: vec![
                "jpg".to_string(),
                "jpeg".to_string(),
                "png".to_string(),
                "webp".to_string(),
                "gif".to_string(),
                "avif".to_string(),
            ],
        }
    }
}

/// Local filesystem provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    pub upload_dir: String,
    /// Public URL root the stored key is appended to.
    pub base_url: String,
}

/// S3 provider configuration (both the SDK and the hand-signed tier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Custom endpoint for S3-compatible services.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Serve objects through a CDN instead of the bucket URL.
    #[serde(default)]
    pub cdn_url: Option<String>,
    /// Upload objects with a public-read ACL.
    #[serde(default)]
    pub public_read: bool,
    #[serde(default)]
    pub storage_class: Option<String>,
}

/// Appwrite storage bucket configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppwriteConfig {
    /// API root, e.g. `https://cloud.appwrite.io/v1`.
    pub endpoint: String,
    pub project_id: String,
    pub api_key: String,
    pub bucket_id: String,
    #[serde(default)]
    pub cdn_url: Option<String>,
}

/// Per-provider configuration sections. A missing section is a fatal
/// `INVALID_CONFIG` at construction time, not a deferred runtime error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub local: Option<LocalConfig>,
    #[serde(default)]
    pub aws_s3: Option<S3Config>,
    #[serde(default)]
    pub appwrite: Option<AppwriteConfig>,
}

/// Top-level configuration for the upload service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadServiceConfig {
    pub default_provider: ProviderType,
    #[serde(default)]
    pub fallback_provider: Option<ProviderType>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub upload: UploadPolicy,
}

impl Default for UploadServiceConfig {
    fn default() -> Self {
        Self {
            default_provider: ProviderType::Local,
            fallback_provider: None,
            providers: ProvidersConfig {
                local: Some(LocalConfig {
                    upload_dir: "./uploads/menu-items".to_string(),
                    base_url: "/uploads/menu-items".to_string(),
                }),
                aws_s3: None,
                appwrite: None,
            },
            upload: UploadPolicy::default(),
        }
    }
}

impl UploadServiceConfig {
    /// Load configuration based on runtime mode.
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or invalid
    pub fn load() -> Result<Self, config::ConfigError> {
        let mode = std::env::var("RUN_MODE")
            .unwrap_or_else(|_| "local".to_string())
            .parse::<RuntimeMode>()
            .map_err(config::ConfigError::Message)?;

        Self::load_for_mode(mode)
    }

    /// Load configuration for a specific runtime mode.
    ///
    /// Environment variables use the `UPLOAD_SERVICE` prefix with `__` as
    /// the nesting separator, e.g.
    /// `UPLOAD_SERVICE_PROVIDERS__AWS_S3__BUCKET=menus`.
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or invalid
    pub fn load_for_mode(mode: RuntimeMode) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // For local mode only, load .env.local file (if it exists)
        if mode == RuntimeMode::Local {
            builder = builder.add_source(config::File::with_name(".env.local").required(false));
        }
        // Production mode relies solely on environment variables (no .env file)

        builder = builder
            .add_source(config::Environment::with_prefix("UPLOAD_SERVICE").separator("__"));

        let upload_dir = match mode {
            RuntimeMode::Local => "./uploads/menu-items",
            RuntimeMode::Production => "/app/uploads/menu-items",
        };

        let defaults = UploadPolicy::default();
        let settings = builder
            .set_default("default_provider", "local")?
            .set_default("providers.local.upload_dir", upload_dir)?
            .set_default("providers.local.base_url", "/uploads/menu-items")?
            .set_default("upload.max_file_size", defaults.max_file_size)?
            .set_default("upload.allowed_mime_types", defaults.allowed_mime_types)?
            .set_default("upload.allowed_extensions", defaults.allowed_extensions)?
            .build()?;

        settings.try_deserialize()
    }

    /// Merge caller overrides into defaults, the shape used by
    /// `get_upload_service(Some(..))`.
    #[must_use]
    pub fn merged_with(patch: ConfigPatch) -> Self {
        let mut config = Self::default();
        patch.apply(&mut config);
        config
    }
}

/// Partial configuration update. `None` fields leave the current value
/// untouched; `fallback_provider` uses a nested `Option` so the fallback
/// can be explicitly cleared.
#[derive(Debug, Clone, Default)]
pub struct ConfigPatch {
    pub default_provider: Option<ProviderType>,
    pub fallback_provider: Option<Option<ProviderType>>,
    pub providers: Option<ProvidersConfig>,
    pub upload: Option<UploadPolicy>,
}

impl ConfigPatch {
    /// Apply the patch in place. Returns `true` when provider identity or
    /// provider sections changed, which invalidates cached provider
    /// handles.
    pub fn apply(self, config: &mut UploadServiceConfig) -> bool {
        let mut providers_changed = false;

        if let Some(default_provider) = self.default_provider {
            providers_changed |= config.default_provider != default_provider;
            config.default_provider = default_provider;
        }
        if let Some(fallback_provider) = self.fallback_provider {
            providers_changed |= config.fallback_provider != fallback_provider;
            config.fallback_provider = fallback_provider;
        }
        if let Some(providers) = self.providers {
            providers_changed |= config.providers != providers;
            config.providers = providers;
        }
        if let Some(upload) = self.upload {
            config.upload = upload;
        }

        providers_changed
    }
}
