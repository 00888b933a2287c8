//! Static MITRE ATT&CK lookup tables.
//!
//! Signatures reference techniques by ID; this module resolves IDs into
//! display records, following MITRE's revocation aliases and falling back to
//! the software and group catalogues.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// A resolved ATT&CK entry attached to a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackPattern {
    pub attack_id: String,
    pub pattern: String,
    pub categories: Vec<String>,
}

struct Technique {
    name: &'static str,
    categories: &'static [&'static str],
}

static ATTACK_MAP: Lazy<HashMap<&'static str, Technique>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("T1005", Technique { name: "Data from Local System", categories: &["collection"] });
    m.insert("T1012", Technique { name: "Query Registry", categories: &["discovery"] });
    m.insert("T1027", Technique { name: "Obfuscated Files or Information", categories: &["defense-evasion"] });
    m.insert("T1033", Technique { name: "System Owner/User Discovery", categories: &["discovery"] });
    m.insert("T1036", Technique { name: "Masquerading", categories: &["defense-evasion"] });
    m.insert("T1047", Technique { name: "Windows Management Instrumentation", categories: &["execution"] });
    m.insert("T1053", Technique { name: "Scheduled Task/Job", categories: &["execution", "persistence", "privilege-escalation"] });
    m.insert("T1055", Technique { name: "Process Injection", categories: &["defense-evasion", "privilege-escalation"] });
    m.insert("T1056", Technique { name: "Input Capture", categories: &["collection", "credential-access"] });
    m.insert("T1057", Technique { name: "Process Discovery", categories: &["discovery"] });
    m.insert("T1059", Technique { name: "Command and Scripting Interpreter", categories: &["execution"] });
    m.insert("T1059.001", Technique { name: "PowerShell", categories: &["execution"] });
    m.insert("T1059.003", Technique { name: "Windows Command Shell", categories: &["execution"] });
    m.insert("T1059.005", Technique { name: "Visual Basic", categories: &["execution"] });
    m.insert("T1068", Technique { name: "Exploitation for Privilege Escalation", categories: &["privilege-escalation"] });
    m.insert("T1070", Technique { name: "Indicator Removal", categories: &["defense-evasion"] });
    m.insert("T1071", Technique { name: "Application Layer Protocol", categories: &["command-and-control"] });
    m.insert("T1082", Technique { name: "System Information Discovery", categories: &["discovery"] });
    m.insert("T1083", Technique { name: "File and Directory Discovery", categories: &["discovery"] });
    m.insert("T1095", Technique { name: "Non-Application Layer Protocol", categories: &["command-and-control"] });
    m.insert("T1105", Technique { name: "Ingress Tool Transfer", categories: &["command-and-control"] });
    m.insert("T1112", Technique { name: "Modify Registry", categories: &["defense-evasion"] });
    m.insert("T1113", Technique { name: "Screen Capture", categories: &["collection"] });
    m.insert("T1129", Technique { name: "Shared Modules", categories: &["execution"] });
    m.insert("T1140", Technique { name: "Deobfuscate/Decode Files or Information", categories: &["defense-evasion"] });
    m.insert("T1204", Technique { name: "User Execution", categories: &["execution"] });
    m.insert("T1218.005", Technique { name: "Mshta", categories: &["defense-evasion"] });
    m.insert("T1218.010", Technique { name: "Regsvr32", categories: &["defense-evasion"] });
    m.insert("T1218.011", Technique { name: "Rundll32", categories: &["defense-evasion"] });
    m.insert("T1486", Technique { name: "Data Encrypted for Impact", categories: &["impact"] });
    m.insert("T1497", Technique { name: "Virtualization/Sandbox Evasion", categories: &["defense-evasion", "discovery"] });
    m.insert("T1547.001", Technique { name: "Registry Run Keys / Startup Folder", categories: &["persistence", "privilege-escalation"] });
    m.insert("T1552", Technique { name: "Unsecured Credentials", categories: &["credential-access"] });
    m.insert("T1564", Technique { name: "Hide Artifacts", categories: &["defense-evasion"] });
    m.insert("T1566", Technique { name: "Phishing", categories: &["initial-access"] });
    m.insert("T1573", Technique { name: "Encrypted Channel", categories: &["command-and-control"] });
    m
});

static SOFTWARE_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("S0002", "Mimikatz");
    m.insert("S0029", "PsExec");
    m.insert("S0154", "Cobalt Strike");
    m.insert("S0363", "Empire");
    m.insert("S0650", "QakBot");
    m
});

static GROUP_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("G0007", "APT28");
    m.insert("G0016", "APT29");
    m.insert("G0032", "Lazarus Group");
    m.insert("G0092", "TA505");
    m
});

/// Technique IDs MITRE has revoked, mapped to their replacements.
static REVOKE_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("T1064", "T1059");
    m.insert("T1086", "T1059.001");
    m.insert("T1170", "T1218.005");
    m.insert("T1117", "T1218.010");
    m.insert("T1085", "T1218.011");
    m.insert("T1060", "T1547.001");
    m
});

/// Resolves an ATT&CK ID (following revocation aliases) into a display record.
/// Returns `None` for IDs that are not in any of the static tables.
pub fn attack_item(attack_id: &str) -> Option<AttackPattern> {
    let attack_id = REVOKE_MAP
        .get(attack_id)
        .copied()
        .unwrap_or(attack_id)
        .to_string();

    if let Some(technique) = ATTACK_MAP.get(attack_id.as_str()) {
        return Some(AttackPattern {
            attack_id,
            pattern: technique.name.to_string(),
            categories: technique.categories.iter().map(|c| c.to_string()).collect(),
        });
    }
    if let Some(name) = SOFTWARE_MAP.get(attack_id.as_str()) {
        return Some(AttackPattern {
            attack_id,
            pattern: name.to_string(),
            categories: vec!["software".to_string()],
        });
    }
    if let Some(name) = GROUP_MAP.get(attack_id.as_str()) {
        return Some(AttackPattern {
            attack_id,
            pattern: name.to_string(),
            categories: vec!["group".to_string()],
        });
    }
    None
}
