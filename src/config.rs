//! Service configuration passed into the aggregator.
//!
//! The engine is hosted by a service framework that knows which service is
//! running and which heuristic IDs it registered. That knowledge is handed in
//! here explicitly instead of living in process-wide mutable state.

use crate::constants::DEFAULT_INJECTION_HEUR_ID;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Name of the service producing the ontology; stamped on every ObjectID
    /// that does not carry its own.
    pub service_name: String,
    /// Heuristic ID registered by the hosting service for code injection.
    pub injection_heur_id: i32,
}

impl ServiceConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            injection_heur_id: DEFAULT_INJECTION_HEUR_ID,
        }
    }

    pub fn with_injection_heur_id(mut self, heur_id: i32) -> Self {
        self.injection_heur_id = heur_id;
        self
    }
}
