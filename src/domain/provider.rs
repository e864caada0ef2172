use serde::{Deserialize, Serialize};

/// Tag identifying a registered storage provider.
///
/// Acts as the key into the provider registry: at most one live instance
/// per type per process. `Gcs`, `Cloudinary` and `AzureBlob` are declared
/// but have no implementation yet; constructing them fails with
/// `UNKNOWN_PROVIDER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderType {
    Local,
    AwsS3,
    Appwrite,
    Gcs,
    Cloudinary,
    AzureBlob,
}

impl ProviderType {
    /// All provider types the factory knows about.
    #[must_use]
    pub fn all() -> &'static [ProviderType] {
        &[
            Self::Local,
            Self::AwsS3,
            Self::Appwrite,
            Self::Gcs,
            Self::Cloudinary,
            Self::AzureBlob,
        ]
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::AwsS3 => "aws-s3",
            Self::Appwrite => "appwrite",
            Self::Gcs => "gcs",
            Self::Cloudinary => "cloudinary",
            Self::AzureBlob => "azure-blob",
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "aws-s3" | "s3" => Ok(Self::AwsS3),
            "appwrite" => Ok(Self::Appwrite),
            "gcs" => Ok(Self::Gcs),
            "cloudinary" => Ok(Self::Cloudinary),
            "azure-blob" | "azure" => Ok(Self::AzureBlob),
            _ => Err(format!(
                "Invalid provider type: {s}. Valid values: local, aws-s3, appwrite, gcs, cloudinary, azure-blob"
            )),
        }
    }
}
