//! Identity and provenance record attached to every ontology entity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{OntologyError, Result};
use crate::time::OntTime;

/// Canonicalizes a GUID into the `{8-4-4-4-12}` upper-cased format every
/// entity uses for linking.
pub fn normalize_guid(raw: &str) -> Result<String> {
    let trimmed = raw.trim_start_matches('{').trim_end_matches('}');
    let uuid = Uuid::parse_str(trimmed).map_err(|_| OntologyError::InvalidGuid(raw.to_string()))?;
    Ok(format!("{{{}}}", uuid.hyphenated().to_string().to_uppercase()))
}

/// Generates a fresh random GUID in canonical format.
pub fn generate_guid() -> String {
    format!("{{{}}}", Uuid::new_v4().hyphenated().to_string().to_uppercase())
}

/// The characteristics used to identify an object.
///
/// `tag` and `ontology_id` are always non-empty. `guid`, once set, is never
/// reassigned. `treeid` and `processtree` are filled in by the aggregator once
/// the process forest has been built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectId {
    tag: String,
    ontology_id: String,
    service_name: String,
    guid: Option<String>,
    treeid: Option<String>,
    processtree: Option<String>,
    time_observed: Option<OntTime>,
    session: Option<String>,
}

/// Partial update applied with the fill-only-empty merge policy.
#[derive(Debug, Clone, Default)]
pub struct ObjectIdUpdate {
    pub tag: Option<String>,
    pub ontology_id: Option<String>,
    pub service_name: Option<String>,
    pub guid: Option<String>,
    pub treeid: Option<String>,
    pub processtree: Option<String>,
    pub time_observed: Option<OntTime>,
    pub session: Option<String>,
}

impl ObjectId {
    pub fn new(tag: &str, ontology_id: &str, service_name: &str) -> Result<Self> {
        if tag.is_empty() {
            return Err(OntologyError::MissingField("tag"));
        }
        if ontology_id.is_empty() {
            return Err(OntologyError::MissingField("ontology_id"));
        }
        if service_name.is_empty() {
            return Err(OntologyError::MissingField("service_name"));
        }
        Ok(Self {
            tag: tag.to_string(),
            ontology_id: ontology_id.to_string(),
            service_name: service_name.to_string(),
            guid: None,
            treeid: None,
            processtree: None,
            time_observed: None,
            session: None,
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn ontology_id(&self) -> &str {
        &self.ontology_id
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn guid(&self) -> Option<&str> {
        self.guid.as_deref()
    }

    pub fn treeid(&self) -> Option<&str> {
        self.treeid.as_deref()
    }

    pub fn processtree(&self) -> Option<&str> {
        self.processtree.as_deref()
    }

    pub fn time_observed(&self) -> Option<OntTime> {
        self.time_observed
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// Updates the tag. Empty input means "no new information" and is ignored.
    pub fn set_tag(&mut self, tag: &str) {
        if tag.is_empty() {
            return;
        }
        self.tag = tag.to_string();
    }

    /// Sets the GUID from a raw string, canonicalizing the format. A GUID that
    /// is already set is kept.
    pub fn set_guid(&mut self, raw: &str) -> Result<()> {
        let normalized = normalize_guid(raw)?;
        if self.guid.is_none() {
            self.guid = Some(normalized);
        }
        Ok(())
    }

    /// Assigns a fresh random GUID if none is set yet.
    pub fn assign_guid(&mut self) {
        if self.guid.is_none() {
            self.guid = Some(generate_guid());
        }
    }

    /// Validating time setter: rejects values that do not parse in the fixed
    /// wire format. First-write-wins is not enforced here; callers gate on
    /// `time_observed().is_none()` before calling.
    pub fn set_time_observed(&mut self, value: &str) -> Result<()> {
        let parsed = OntTime::parse(value)?;
        self.time_observed = Some(parsed);
        Ok(())
    }

    pub fn set_time_observed_time(&mut self, value: OntTime) {
        self.time_observed = Some(value);
    }

    pub fn set_treeid(&mut self, treeid: String) {
        self.treeid = Some(treeid);
    }

    pub fn set_processtree(&mut self, processtree: String) {
        self.processtree = Some(processtree);
    }

    pub fn set_session(&mut self, session: String) {
        self.session = Some(session);
    }

    /// Fill-only-empty merge. Populated fields are never clobbered; a sentinel
    /// time counts as empty. Invalid incoming GUIDs are logged and dropped.
    pub fn merge(&mut self, update: &ObjectIdUpdate) {
        if let Some(guid) = update.guid.as_deref() {
            match normalize_guid(guid) {
                Ok(normalized) => {
                    if self.guid.is_none() {
                        self.guid = Some(normalized);
                    }
                }
                Err(_) => log::warn!("Invalid GUID '{}'", guid),
            }
        }
        if let Some(treeid) = update.treeid.as_ref() {
            if self.treeid.is_none() && !treeid.is_empty() {
                self.treeid = Some(treeid.clone());
            }
        }
        if let Some(processtree) = update.processtree.as_ref() {
            if self.processtree.is_none() && !processtree.is_empty() {
                self.processtree = Some(processtree.clone());
            }
        }
        if let Some(time_observed) = update.time_observed {
            let replaceable = match self.time_observed {
                None => true,
                Some(current) => current.is_min() || current.is_max(),
            };
            if replaceable {
                self.time_observed = Some(time_observed);
            }
        }
        if let Some(session) = update.session.as_ref() {
            if self.session.is_none() && !session.is_empty() {
                self.session = Some(session.clone());
            }
        }
        // tag/ontology_id/service_name are required fields and therefore
        // always populated, so the fill-only-empty policy leaves them alone.
    }

    /// Flat serialized form for embedding in an output payload.
    pub fn as_primitives(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objectid() -> ObjectId {
        ObjectId::new("blah.exe", "blah", "blah-service").unwrap()
    }

    #[test]
    fn test_required_fields() {
        assert!(ObjectId::new("", "blah", "blah").is_err());
        assert!(ObjectId::new("blah", "", "blah").is_err());
        assert!(ObjectId::new("blah", "blah", "").is_err());
    }

    #[test]
    fn test_set_tag_permissive() {
        let mut oid = objectid();
        oid.set_tag("");
        assert_eq!(oid.tag(), "blah.exe");
        oid.set_tag("other.exe");
        assert_eq!(oid.tag(), "other.exe");
    }

    #[test]
    fn test_guid_canonical_format() {
        let mut oid = objectid();
        oid.set_guid("748273cd-681e-4C63-8D1E-1b3b13d8D04C").unwrap();
        assert_eq!(oid.guid(), Some("{748273CD-681E-4C63-8D1E-1B3B13D8D04C}"));
    }

    #[test]
    fn test_guid_never_reassigned() {
        let mut oid = objectid();
        oid.assign_guid();
        let first = oid.guid().unwrap().to_string();
        oid.assign_guid();
        oid.set_guid("748273cd-681e-4c63-8d1e-1b3b13d8d04c").unwrap();
        assert_eq!(oid.guid(), Some(first.as_str()));
    }

    #[test]
    fn test_set_time_observed_validates() {
        let mut oid = objectid();
        assert!(oid.set_time_observed("not a time").is_err());
        assert!(oid.time_observed().is_none());
        oid.set_time_observed("2023-02-01 09:00:00").unwrap();
        assert_eq!(oid.time_observed().unwrap().to_string(), "2023-02-01 09:00:00");
    }

    #[test]
    fn test_merge_does_not_clobber() {
        let mut oid = objectid();
        oid.set_time_observed("2023-02-01 09:00:00").unwrap();
        let update = ObjectIdUpdate {
            tag: Some("new.exe".to_string()),
            time_observed: Some(OntTime::parse("2023-02-01 10:00:00").unwrap()),
            treeid: Some("abc".to_string()),
            ..Default::default()
        };
        oid.merge(&update);
        // tag and time are already populated so the merge leaves them alone;
        // treeid is empty and gets filled
        assert_eq!(oid.tag(), "blah.exe");
        assert_eq!(oid.time_observed().unwrap().to_string(), "2023-02-01 09:00:00");
        assert_eq!(oid.treeid(), Some("abc"));
    }
}
