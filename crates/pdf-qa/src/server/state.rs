//! Application state for the QA server

use std::sync::Arc;

use crate::hardware::HardwareProbe;
use crate::service::QaService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Retrieval and answering
    service: Arc<QaService>,
    /// Hardware summary source for `/checkup`
    hardware: Arc<dyn HardwareProbe>,
}

impl AppState {
    /// Create new application state
    pub fn new(service: Arc<QaService>, hardware: Arc<dyn HardwareProbe>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { service, hardware }),
        }
    }

    /// QA service
    pub fn service(&self) -> &QaService {
        &self.inner.service
    }

    /// Hardware probe
    pub fn hardware(&self) -> &dyn HardwareProbe {
        self.inner.hardware.as_ref()
    }
}
