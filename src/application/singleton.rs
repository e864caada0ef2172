//! Process-wide `UploadService` accessor.
//!
//! The rest of the application resolves the service through
//! [`get_upload_service`]; embedding code that prefers explicit
//! composition can construct [`UploadService`] directly instead.

use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;

use super::upload_service::UploadService;
use crate::infrastructure::config::UploadServiceConfig;
use crate::infrastructure::storage::factory;

static UPLOAD_SERVICE: Lazy<Mutex<Option<Arc<UploadService>>>> = Lazy::new(|| Mutex::new(None));

/// Return the process-wide service, creating it on first use.
///
/// `config` only applies to that first call; later calls return the
/// existing instance unchanged (use
/// [`UploadService::update_config`] to mutate it).
pub fn get_upload_service(config: Option<UploadServiceConfig>) -> Arc<UploadService> {
    let mut slot = UPLOAD_SERVICE.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(service) = slot.as_ref() {
        return service.clone();
    }

    let service = Arc::new(UploadService::new(config.unwrap_or_default()));
    *slot = Some(service.clone());
    service
}

/// Drop the singleton and empty the provider registry. Test and ops
/// hook; the next [`get_upload_service`] call starts from scratch.
pub fn reset_upload_service() {
    *UPLOAD_SERVICE.lock().unwrap_or_else(PoisonError::into_inner) = None;
    factory::clear_cache();
}
