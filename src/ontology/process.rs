//! Process entity and image-path normalization.
//!
//! Path normalization maps concrete installation paths to portable
//! placeholder tokens so that equivalent processes from different machine
//! snapshots compare equal. The normalized path becomes the ObjectID tag,
//! which is the leaf input to the treeid/processtree hash chain.

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};

use crate::constants::{
    SAMPLEPATH_ENV_VARIABLE, SYSTEM_DRIVE, SYSTEM_ROOT, WINDIR_ENV_VARIABLE, X86, X86_64,
};
use crate::error::{OntologyError, Result};
use crate::time::OntTime;

use super::objectid::{normalize_guid, ObjectId, ObjectIdUpdate};

static USR_TMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"c:\\users\\[^\\]+\\appdata\\local\\temp\\").expect("static regex")
});
static USR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"c:\\users\\[^\\]+\\").expect("static regex"));

/// Inspects a path for markers of a 64-bit operating system. Used only to
/// disambiguate `System32` vs `SysWOW64` normalization.
pub fn determine_arch(path: &str) -> &'static str {
    let path = path.to_lowercase();
    if path.contains("program files (x86)") || path.contains("syswow64") {
        X86_64
    } else {
        X86
    }
}

/// Maps a concrete filesystem path to its placeholder-token form.
///
/// When `arch` is `None` it is inferred from the path itself. The explicit
/// parameter exists for the one ambiguous case: `SysWOW64` under an `x86`
/// interpretation keeps its literal directory (`?win\syswow64`), while under
/// `x86_64` it is the 32-bit system directory (`?sys32`).
pub fn normalize_path(path: &str, arch: Option<&str>) -> String {
    let mut path = path.to_lowercase();
    let arch = match arch {
        Some(a) => a,
        None => determine_arch(&path),
    };

    // Order matters: more specific prefixes first.
    let mut prefix_rules: Vec<(String, &str)> = Vec::new();
    if arch == X86_64 {
        prefix_rules.push((format!("{}syswow64", SYSTEM_ROOT), "?sys32"));
        prefix_rules.push((format!("{}system32", SYSTEM_ROOT), "?sys64"));
        prefix_rules.push((format!("{}program files (x86)", SYSTEM_DRIVE), "?pf86"));
        prefix_rules.push((format!("{}program files", SYSTEM_DRIVE), "?pf64"));
    } else {
        prefix_rules.push((format!("{}system32", SYSTEM_ROOT), "?sys32"));
        prefix_rules.push((format!("{}program files", SYSTEM_DRIVE), "?pf86"));
    }

    for (pattern, replacement) in &prefix_rules {
        if let Some(rest) = path.strip_prefix(pattern.as_str()) {
            path = format!("{}{}", replacement, rest);
        }
    }

    path = USR_TMP_RE.replace_all(&path, NoExpand("?usrtmp\\")).into_owned();
    path = USR_RE.replace_all(&path, NoExpand("?usr\\")).into_owned();

    for (pattern, replacement) in [
        (SYSTEM_ROOT, "?win\\"),
        (SYSTEM_DRIVE, "?c\\"),
        (WINDIR_ENV_VARIABLE, "?win"),
        (SAMPLEPATH_ENV_VARIABLE, "?usrtmp"),
    ] {
        if let Some(rest) = path.strip_prefix(pattern) {
            path = format!("{}{}", replacement, rest);
        }
    }

    path
}

/// One observed process lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub objectid: ObjectId,
    pub image: String,
    pub start_time: Option<OntTime>,
    pub end_time: Option<OntTime>,
    pub pid: Option<u32>,
    pub command_line: Option<String>,
    /// Parent process details, backfilled when not provided by the sandbox.
    pub pobjectid: Option<ObjectId>,
    pub pimage: Option<String>,
    pub pcommand_line: Option<String>,
    pub ppid: Option<u32>,
    pub integrity_level: Option<String>,
    pub image_hash: Option<String>,
    pub original_file_name: Option<String>,
}

/// Enrichment applied with the fill-only-empty merge policy.
#[derive(Debug, Clone, Default)]
pub struct ProcessUpdate {
    pub objectid: Option<ObjectIdUpdate>,
    pub pobjectid: Option<ObjectIdUpdate>,
    pub image: Option<String>,
    pub start_time: Option<OntTime>,
    pub end_time: Option<OntTime>,
    pub pid: Option<u32>,
    pub ppid: Option<u32>,
    pub command_line: Option<String>,
    pub pimage: Option<String>,
    pub pcommand_line: Option<String>,
    pub integrity_level: Option<String>,
    pub image_hash: Option<String>,
    pub original_file_name: Option<String>,
}

impl Process {
    pub fn new(objectid: ObjectId, image: &str) -> Result<Self> {
        if image.is_empty() {
            return Err(OntologyError::MissingField("image"));
        }
        Ok(Self {
            objectid,
            image: image.to_string(),
            start_time: None,
            end_time: None,
            pid: None,
            command_line: None,
            pobjectid: None,
            pimage: None,
            pcommand_line: None,
            ppid: None,
            integrity_level: None,
            image_hash: None,
            original_file_name: None,
        })
    }

    /// Construction-time validation: a process cannot be its own parent and
    /// cannot terminate before it starts.
    pub fn validate(&self) -> Result<()> {
        if let (Some(pid), Some(ppid)) = (self.pid, self.ppid) {
            if pid == ppid {
                return Err(OntologyError::SelfParent(pid));
            }
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if start > end {
                return Err(OntologyError::StartAfterEnd {
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }
        }
        Ok(())
    }

    /// General enrichment: a field is only written when the existing value is
    /// empty (or a time sentinel); nested ObjectIDs are merged field by field.
    pub fn update(&mut self, update: ProcessUpdate) {
        if let Some(oid_update) = &update.objectid {
            self.objectid.merge(oid_update);
        }
        if let Some(poid_update) = &update.pobjectid {
            self.update_pobjectid(poid_update);
        }

        if let Some(start_time) = update.start_time {
            if self.objectid.time_observed().is_none() {
                self.objectid.set_time_observed_time(start_time);
            }
        }

        merge_time(&mut self.start_time, update.start_time);
        merge_time(&mut self.end_time, update.end_time);
        merge_opt_u32(&mut self.pid, update.pid);
        merge_opt_u32(&mut self.ppid, update.ppid);
        merge_string(&mut self.image, update.image.as_deref());
        merge_opt_string(&mut self.command_line, update.command_line.as_deref());
        merge_opt_string(&mut self.pimage, update.pimage.as_deref());
        merge_opt_string(&mut self.pcommand_line, update.pcommand_line.as_deref());
        merge_opt_string(
            &mut self.integrity_level,
            update.integrity_level.as_deref().map(to_lower).as_deref(),
        );
        merge_opt_string(&mut self.image_hash, update.image_hash.as_deref());
        merge_opt_string(&mut self.original_file_name, update.original_file_name.as_deref());
    }

    /// Merges into the parent ObjectID, creating it first when the update
    /// carries the required identity fields.
    pub fn update_pobjectid(&mut self, update: &ObjectIdUpdate) {
        if self.pobjectid.is_none() {
            match (
                update.tag.as_deref(),
                update.ontology_id.as_deref(),
                update.service_name.as_deref(),
            ) {
                (Some(tag), Some(ontology_id), Some(service_name)) => {
                    match ObjectId::new(tag, ontology_id, service_name) {
                        Ok(objectid) => self.pobjectid = Some(objectid),
                        Err(e) => {
                            log::warn!("Could not build parent ObjectID: {}", e);
                            return;
                        }
                    }
                }
                _ => {
                    log::debug!("You need to set pobjectid or pass its required fields");
                    return;
                }
            }
        }
        if let Some(pobjectid) = self.pobjectid.as_mut() {
            pobjectid.merge(update);
        }
    }

    /// Copies the parent's identity into this process. An already-known parent
    /// command line is preserved.
    pub fn set_parent(&mut self, parent: &Process) {
        if let (Some(own), Some(theirs)) = (self.objectid.guid(), parent.objectid.guid()) {
            if own == theirs {
                return;
            }
        }
        self.pobjectid = Some(parent.objectid.clone());
        self.pimage = Some(parent.image.clone());
        if self.pcommand_line.is_none() {
            self.pcommand_line = parent.command_line.clone();
        }
        self.ppid = parent.pid;
    }

    pub fn set_start_time(&mut self, start_time: OntTime) {
        self.start_time = Some(start_time);
    }

    pub fn set_end_time(&mut self, end_time: OntTime) {
        self.end_time = Some(end_time);
    }

    /// Case- and format-insensitive GUID comparison.
    pub fn is_guid_a_match(&self, guid: &str) -> bool {
        match (self.objectid.guid(), normalize_guid(guid)) {
            (Some(own), Ok(normalized)) => own == normalized,
            _ => false,
        }
    }

    /// Normalizes the image path and sets the objectid tag from it.
    pub fn set_objectid_tag(&mut self, image: &str) {
        if image.is_empty() {
            return;
        }
        self.objectid.set_tag(&normalize_path(image, None));
    }

    pub fn create_objectid_tag(image: &str) -> Option<String> {
        if image.is_empty() {
            return None;
        }
        Some(normalize_path(image, None))
    }

    /// Normalizes the image path and sets the parent objectid tag from it.
    pub fn set_pobjectid_tag(&mut self, image: &str) {
        if image.is_empty() {
            return;
        }
        match self.pobjectid.as_mut() {
            Some(pobjectid) => pobjectid.set_tag(&normalize_path(image, None)),
            None => log::debug!("You need to set pobjectid before setting its tag"),
        }
    }

    pub fn as_primitives(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn to_lower(value: &str) -> String {
    value.to_lowercase()
}

pub(crate) fn merge_opt_string(dst: &mut Option<String>, src: Option<&str>) {
    if let Some(src) = src {
        if !src.is_empty() && dst.as_deref().map_or(true, str::is_empty) {
            *dst = Some(src.to_string());
        }
    }
}

pub(crate) fn merge_string(dst: &mut String, src: Option<&str>) {
    if let Some(src) = src {
        if !src.is_empty() && dst.is_empty() {
            *dst = src.to_string();
        }
    }
}

pub(crate) fn merge_opt_u32(dst: &mut Option<u32>, src: Option<u32>) {
    if dst.is_none() {
        *dst = src;
    }
}

/// Time fields treat the MIN/MAX sentinels as "empty": a refined end time may
/// replace the far-future default, but a real observed time never moves.
pub(crate) fn merge_time(dst: &mut Option<OntTime>, src: Option<OntTime>) {
    if src.is_none() {
        return;
    }
    let replaceable = match dst {
        None => true,
        Some(current) => current.is_min() || current.is_max(),
    };
    if replaceable {
        *dst = src;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objectid(tag: &str) -> ObjectId {
        ObjectId::new(tag, "blah", "blah-service").unwrap()
    }

    #[test]
    fn test_determine_arch() {
        assert_eq!(determine_arch("c:\\program files (x86)\\word.exe"), X86_64);
        assert_eq!(determine_arch("c:\\windows\\syswow64\\cmd.exe"), X86_64);
        assert_eq!(determine_arch("c:\\windows\\system32\\cmd.exe"), X86);
    }

    #[test]
    fn test_normalize_path_program_files() {
        assert_eq!(normalize_path("C:\\Program Files\\Word.exe", None), "?pf86\\word.exe");
        assert_eq!(normalize_path("C:\\Program Files (x86)\\Word.exe", None), "?pf86\\word.exe");
    }

    #[test]
    fn test_normalize_path_syswow64_arch_disambiguation() {
        assert_eq!(
            normalize_path("C:\\Windows\\SysWow64\\Word.exe", Some(X86)),
            "?win\\syswow64\\word.exe"
        );
        assert_eq!(
            normalize_path("C:\\Windows\\SysWow64\\Word.exe", Some(X86_64)),
            "?sys32\\word.exe"
        );
        // Inferred arch: the syswow64 marker alone implies a 64-bit host
        assert_eq!(normalize_path("C:\\Windows\\SysWow64\\Word.exe", None), "?sys32\\word.exe");
    }

    #[test]
    fn test_normalize_path_system_dirs_and_users() {
        assert_eq!(normalize_path("C:\\Windows\\System32\\cmd.exe", None), "?sys32\\cmd.exe");
        assert_eq!(
            normalize_path("C:\\Users\\buddy\\AppData\\Local\\Temp\\bad.exe", None),
            "?usrtmp\\bad.exe"
        );
        assert_eq!(normalize_path("C:\\Users\\buddy\\bad.exe", None), "?usr\\bad.exe");
        assert_eq!(normalize_path("C:\\Windows\\explorer.exe", None), "?win\\explorer.exe");
        assert_eq!(normalize_path("C:\\bad.exe", None), "?c\\bad.exe");
        assert_eq!(normalize_path("%WINDIR%\\explorer.exe", None), "?win\\explorer.exe");
        assert_eq!(normalize_path("%SAMPLEPATH%\\bad.exe", None), "?usrtmp\\bad.exe");
    }

    #[test]
    fn test_validate_rejects_self_parent() {
        let mut p = Process::new(objectid("?usr\\bad.exe"), "C:\\bad.exe").unwrap();
        p.pid = Some(123);
        p.ppid = Some(123);
        assert!(matches!(p.validate(), Err(OntologyError::SelfParent(123))));
    }

    #[test]
    fn test_validate_rejects_end_before_start() {
        let mut p = Process::new(objectid("?usr\\bad.exe"), "C:\\bad.exe").unwrap();
        p.start_time = Some(OntTime::parse("2023-02-01 10:00:00").unwrap());
        p.end_time = Some(OntTime::parse("2023-02-01 09:00:00").unwrap());
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_set_parent_preserves_known_pcommand_line() {
        let mut parent = Process::new(objectid("?win\\explorer.exe"), "C:\\Windows\\explorer.exe").unwrap();
        parent.pid = Some(1);
        parent.command_line = Some("explorer.exe".to_string());
        parent.objectid.assign_guid();

        let mut child = Process::new(objectid("?c\\bad.exe"), "C:\\bad.exe").unwrap();
        child.objectid.assign_guid();
        child.pcommand_line = Some("already known".to_string());
        child.set_parent(&parent);

        assert_eq!(child.pimage.as_deref(), Some("C:\\Windows\\explorer.exe"));
        assert_eq!(child.pcommand_line.as_deref(), Some("already known"));
        assert_eq!(child.ppid, Some(1));
        assert_eq!(child.pobjectid.as_ref().unwrap().guid(), parent.objectid.guid());
    }

    #[test]
    fn test_update_only_fills_empty_fields() {
        let mut p = Process::new(objectid("?c\\bad.exe"), "C:\\bad.exe").unwrap();
        p.command_line = Some("original".to_string());
        p.end_time = Some(OntTime::max_sentinel());
        p.update(ProcessUpdate {
            command_line: Some("replacement".to_string()),
            end_time: Some(OntTime::parse("2023-02-01 10:00:00").unwrap()),
            integrity_level: Some("HIGH".to_string()),
            ..Default::default()
        });
        assert_eq!(p.command_line.as_deref(), Some("original"));
        // the far-future sentinel counts as unknown and may be refined
        assert_eq!(p.end_time.unwrap().to_string(), "2023-02-01 10:00:00");
        assert_eq!(p.integrity_level.as_deref(), Some("high"));
    }

    #[test]
    fn test_is_guid_a_match() {
        let mut p = Process::new(objectid("?c\\bad.exe"), "C:\\bad.exe").unwrap();
        p.objectid.set_guid("748273cd-681e-4c63-8d1e-1b3b13d8d04c").unwrap();
        assert!(p.is_guid_a_match("{748273CD-681E-4C63-8D1E-1B3B13D8D04C}"));
        assert!(p.is_guid_a_match("748273cd-681e-4c63-8d1e-1b3b13d8d04c"));
        assert!(!p.is_guid_a_match("not-a-guid"));
    }
}
