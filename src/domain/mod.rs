pub mod error;
pub mod provider;
pub mod upload;

pub use error::{ErrorCode, UploadError};
pub use provider::ProviderType;
pub use upload::{DeleteResult, FileMetadata, UploadFile, UploadedFile};
