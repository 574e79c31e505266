//! Common test utilities.

#![allow(dead_code)]

use std::sync::Arc;

use wiremock::MockServer;

use zapgate::client::{Gateway, HttpGateway};
use zapgate::credential::{CredentialPolicy, Role};
use zapgate::notify::MemoryNotifier;
use zapgate::session::SessionManager;

pub const GLOBAL_KEY: &str = "GK";
pub const CLIENT_KEY: &str = "client-key";

/// Gateway client pointed at the mock server.
pub fn gateway(server: &MockServer) -> Arc<dyn Gateway> {
    Arc::new(HttpGateway::new(&server.uri()))
}

/// Session manager for `role` with the test keys.
pub fn session_manager(server: &MockServer, role: Role) -> (SessionManager, MemoryNotifier) {
    let notifier = MemoryNotifier::new();
    let manager = SessionManager::builder(gateway(server))
        .policy(CredentialPolicy::new(GLOBAL_KEY))
        .role(role)
        .instance_key(CLIENT_KEY)
        .notifier(Arc::new(notifier.clone()))
        .build();
    (manager, notifier)
}
