//! Core ontology entities and the aggregator that links them together.

pub mod network;
pub mod objectid;
pub mod process;
pub mod results;
pub mod sandbox;
pub mod signature;
pub mod tree;

#[cfg(test)]
mod tests;

pub use network::{
    ConnectionDirection, ConnectionType, NetworkConnection, NetworkDns, NetworkHttp,
    NetworkHttpUpdate, TransportLayerProtocol,
};
pub use objectid::{generate_guid, normalize_guid, ObjectId, ObjectIdUpdate};
pub use process::{determine_arch, normalize_path, Process, ProcessUpdate};
pub use results::{ObjectIdParams, OntologyResults, ProcessParams};
pub use sandbox::{AnalysisMetadata, MachineMetadata, Sandbox};
pub use signature::{Attribute, Signature, SignatureType};
pub use tree::{filter_event_tree_against_safe_treeids, Event, TreeNode};
