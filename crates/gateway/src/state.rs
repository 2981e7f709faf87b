//! Shared state for the HTTP handlers.

use std::{sync::Arc, time::Instant};

use wamux_sessions::SessionRegistry;

use crate::auth::AuthConfig;

pub struct ApiState {
    pub registry: Arc<SessionRegistry>,
    pub auth: AuthConfig,
    pub started: Instant,
}

impl ApiState {
    pub fn new(registry: Arc<SessionRegistry>, auth: AuthConfig) -> Arc<Self> {
        Arc::new(Self {
            registry,
            auth,
            started: Instant::now(),
        })
    }
}
