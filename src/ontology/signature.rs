//! Detection signatures and the attributes that tie them to other entities.

use serde::{Deserialize, Serialize};

use crate::attack::{attack_item, AttackPattern};
use crate::error::{OntologyError, Result};

use super::objectid::ObjectId;

/// Event actions an attribute may describe. Mirrors the Sysmon event
/// vocabulary used by the sandboxes feeding this engine.
const ATTRIBUTE_ACTIONS: &[&str] = &[
    "clipboard_capture",
    "create_remote_thread",
    "create_stream_hash",
    "dns_query",
    "driver_loaded",
    "file_change",
    "file_creation",
    "file_delete",
    "image_loaded",
    "network_connection",
    "network_connection_linux",
    "pipe_created",
    "process_access",
    "process_creation",
    "process_creation_linux",
    "process_tampering",
    "process_terminated",
    "raw_access_thread",
    "registry_add",
    "registry_delete",
    "registry_event",
    "registry_rename",
    "registry_set",
    "sysmon_error",
    "sysmon_status",
    "wmi_event",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignatureType {
    Cuckoo,
    Yara,
    Sigma,
    Suricata,
}

impl SignatureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureType::Cuckoo => "CUCKOO",
            SignatureType::Yara => "YARA",
            SignatureType::Sigma => "SIGMA",
            SignatureType::Suricata => "SURICATA",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "CUCKOO" => Ok(SignatureType::Cuckoo),
            "YARA" => Ok(SignatureType::Yara),
            "SIGMA" => Ok(SignatureType::Sigma),
            "SURICATA" => Ok(SignatureType::Suricata),
            other => Err(OntologyError::InvalidValue {
                field: "signature type",
                value: other.to_string(),
            }),
        }
    }
}

/// Links a signature hit to the entity it fired on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub source: ObjectId,
    pub target: Option<ObjectId>,
    pub action: Option<String>,
    pub meta: Option<String>,
    pub event_record_id: Option<String>,
    pub domain: Option<String>,
    pub uri: Option<String>,
    pub file_hash: Option<String>,
}

impl Attribute {
    pub fn new(source: ObjectId) -> Self {
        Self {
            source,
            target: None,
            action: None,
            meta: None,
            event_record_id: None,
            domain: None,
            uri: None,
            file_hash: None,
        }
    }

    pub fn with_action(mut self, action: &str) -> Result<Self> {
        if !ATTRIBUTE_ACTIONS.contains(&action) {
            return Err(OntologyError::InvalidValue {
                field: "action",
                value: action.to_string(),
            });
        }
        self.action = Some(action.to_string());
        Ok(self)
    }

    pub fn with_target(mut self, target: ObjectId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_meta(mut self, meta: &str) -> Self {
        self.meta = Some(meta.to_string());
        self
    }

    pub fn with_event_record_id(mut self, event_record_id: &str) -> Self {
        self.event_record_id = Some(event_record_id.to_string());
        self
    }

    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_string());
        self
    }

    pub fn with_uri(mut self, uri: &str) -> Self {
        self.uri = Some(uri.to_string());
        self
    }

    pub fn with_file_hash(mut self, file_hash: &str) -> Self {
        self.file_hash = Some(file_hash.to_string());
        self
    }

    pub fn as_primitives(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// A named detection that matched during analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub objectid: ObjectId,
    pub name: String,
    #[serde(rename = "type")]
    pub signature_type: SignatureType,
    pub classification: Option<String>,
    pub score: Option<i32>,
    pub attacks: Vec<AttackPattern>,
    pub actors: Vec<String>,
    pub malware_families: Vec<String>,
    pub attributes: Vec<Attribute>,
}

impl Signature {
    pub fn new(objectid: ObjectId, name: &str, signature_type: SignatureType) -> Result<Self> {
        if name.is_empty() {
            return Err(OntologyError::MissingField("name"));
        }
        Ok(Self {
            objectid,
            name: name.to_string(),
            signature_type,
            classification: None,
            score: None,
            attacks: Vec::new(),
            actors: Vec::new(),
            malware_families: Vec::new(),
            attributes: Vec::new(),
        })
    }

    /// Resolves an ATT&CK ID against the static catalogues and records the
    /// resulting pattern once. Unknown IDs are logged and dropped.
    pub fn add_attack_id(&mut self, attack_id: &str) {
        match attack_item(attack_id) {
            Some(attack) => {
                if !self.attacks.iter().any(|a| a.attack_id == attack.attack_id) {
                    self.attacks.push(attack);
                }
            }
            None => log::warn!("Unknown ATT&CK ID {}", attack_id),
        }
    }

    /// Content-based dedup: identical attributes are recorded once.
    pub fn add_attribute(&mut self, attribute: Attribute) {
        if !self.attributes.contains(&attribute) {
            self.attributes.push(attribute);
        }
    }

    pub fn get_attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn set_score(&mut self, score: i32) {
        self.score = Some(score);
    }

    pub fn as_primitives(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
