use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::backend::{DetectionCapability, DetectorBackend};

pub type SharedBackend = Arc<Mutex<dyn DetectorBackend>>;

/// Named detector backends with a default selection.
///
/// Backends are wrapped in `Mutex` because `DetectorBackend::detect` takes `&mut self`.
pub struct BackendRegistry {
    backends: BTreeMap<String, SharedBackend>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: BTreeMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        log::debug!("registered detector backend '{}'", name);
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<SharedBackend> {
        self.backends.get(name).cloned()
    }

    pub fn default_backend(&self) -> Option<SharedBackend> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// Registered backend names, sorted.
    pub fn list(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }

    /// Select a backend that supports the requested capability.
    ///
    /// Prefers the default backend when it supports the capability.
    pub fn backend_for_capability(&self, capability: DetectionCapability) -> Result<SharedBackend> {
        if let Some(default_backend) = self.default_backend() {
            if supports(&default_backend, capability)? {
                return Ok(default_backend);
            }
        }

        for backend in self.backends.values() {
            if supports(backend, capability)? {
                return Ok(backend.clone());
            }
        }

        Err(anyhow!(
            "no registered backend supports capability {:?}",
            capability
        ))
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn supports(backend: &SharedBackend, capability: DetectionCapability) -> Result<bool> {
    let guard = backend
        .lock()
        .map_err(|_| anyhow!("backend lock poisoned"))?;
    Ok(guard.supports(capability))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Detection, DetectionResult, StubBackend};

    struct ClassifierOnly;

    impl DetectorBackend for ClassifierOnly {
        fn name(&self) -> &'static str {
            "classifier"
        }

        fn supports(&self, capability: DetectionCapability) -> bool {
            matches!(capability, DetectionCapability::Classification)
        }

        fn detect(&mut self, _pixels: &[u8], _w: u32, _h: u32) -> Result<DetectionResult> {
            Ok(DetectionResult::default())
        }
    }

    struct NamedPersonBackend;

    impl DetectorBackend for NamedPersonBackend {
        fn name(&self) -> &'static str {
            "people"
        }

        fn supports(&self, capability: DetectionCapability) -> bool {
            matches!(capability, DetectionCapability::PersonDetection)
        }

        fn detect(&mut self, _pixels: &[u8], _w: u32, _h: u32) -> Result<DetectionResult> {
            Ok(DetectionResult::default())
        }
    }

    #[test]
    fn first_registered_backend_is_default() {
        let mut registry = BackendRegistry::new();
        registry.register(ClassifierOnly);
        registry.register(StubBackend::new());

        assert_eq!(registry.list(), vec!["classifier", "stub"]);
        let default = registry.default_backend().unwrap();
        assert_eq!(default.lock().unwrap().name(), "classifier");
    }

    #[test]
    fn person_detection_falls_back_to_capable_backend() {
        let mut registry = BackendRegistry::new();
        registry.register(ClassifierOnly);
        registry.register(StubBackend::scripted(vec![vec![Detection::person(
            0, 0, 10, 30, 0.9,
        )]]));

        let backend = registry
            .backend_for_capability(DetectionCapability::PersonDetection)
            .unwrap();
        let mut guard = backend.lock().unwrap();
        assert_eq!(guard.name(), "stub");
        assert_eq!(guard.detect(&[0u8; 12], 2, 2).unwrap().detections.len(), 1);
    }

    #[test]
    fn capable_default_wins_over_registration_order() {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::new());
        registry.register(NamedPersonBackend);
        registry.set_default("people").unwrap();

        let backend = registry
            .backend_for_capability(DetectionCapability::PersonDetection)
            .unwrap();
        assert_eq!(backend.lock().unwrap().name(), "people");
    }

    #[test]
    fn unknown_default_is_rejected() {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::new());
        assert!(registry.set_default("tract").is_err());
        assert!(registry.set_default("stub").is_ok());
    }

    #[test]
    fn empty_registry_has_no_person_backend() {
        let registry = BackendRegistry::new();
        assert!(registry
            .backend_for_capability(DetectionCapability::PersonDetection)
            .is_err());
    }
}
