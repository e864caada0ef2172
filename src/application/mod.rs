pub mod singleton;
pub mod upload_service;

pub use singleton::{get_upload_service, reset_upload_service};
pub use upload_service::UploadService;
