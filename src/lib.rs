//! Sandbox ontology engine.
//!
//! Reconstructs a coherent picture of a sandbox detonation from the loose
//! observations a sandbox reports: processes are deduplicated and linked
//! into trees, network flows are attributed to the processes that made them,
//! signatures are tied to the entities they fired on, and the whole result
//! is rendered into report sections with stable, safelist-able tree hashes.

pub mod artifacts;
pub mod attack;
pub mod config;
pub mod constants;
pub mod error;
pub mod ioc;
pub mod ontology;
pub mod section;
pub mod time;

pub use config::ServiceConfig;
pub use error::{OntologyError, Result};
pub use ontology::OntologyResults;
