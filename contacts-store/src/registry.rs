//! Process-wide engine registry (spec.md §5 Design Notes "Process-wide
//! registry"): a statically-initialized, mutex-guarded map from manager uri
//! to the engines currently open against it, used only to route out-of-band
//! extension calls to a specific engine. Never relies on destruction
//! ordering — each engine removes itself explicitly on `teardown`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::engine::ContactsEngine;

type Registry = Mutex<HashMap<String, Vec<Arc<ContactsEngine>>>>;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Registers `engine` under `manager_uri`. Called once from
/// `ContactsEngine::open`.
pub fn init(manager_uri: &str, engine: Arc<ContactsEngine>) {
    registry().lock().entry(manager_uri.to_string()).or_default().push(engine);
}

/// Removes `engine` from `manager_uri`'s list. Called once from
/// `ContactsEngine::close` (or `Drop`), never from a destructor ordering
/// assumption.
pub fn teardown(manager_uri: &str, engine: &Arc<ContactsEngine>) {
    let mut guard = registry().lock();
    if let Some(list) = guard.get_mut(manager_uri) {
        list.retain(|e| !Arc::ptr_eq(e, engine));
        if list.is_empty() {
            guard.remove(manager_uri);
        }
    }
}

/// Read-only lookup of every engine currently open against `manager_uri`,
/// used to route an out-of-band extension call (spec.md §4.A `fetchOob` /
/// `storeOob`) to the right instance(s).
pub fn lookup(manager_uri: &str) -> Vec<Arc<ContactsEngine>> {
    registry().lock().get(manager_uri).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_on_unknown_uri_is_empty() {
        assert!(lookup("org.example.nonexistent").is_empty());
    }
}
