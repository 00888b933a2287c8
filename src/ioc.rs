//! Free-text IOC extraction.
//!
//! Scans arbitrary text blobs for IPs, domains, and URIs, tags them on a
//! result table section, and optionally records URI attributes on a
//! signature. The regexes overlap, so matches are subtracted in order: a
//! domain match that is really an IP is dropped, and a URI match that is
//! really a bare domain or IP is dropped.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{MIN_DOMAIN_CHARS, MIN_URI_CHARS, MIN_URI_PATH_CHARS};
use crate::ontology::{Attribute, ObjectId, Signature};
use crate::section::ResultTableSection;

const IP_PATTERN: &str =
    r"(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)";
const DOMAIN_PATTERN: &str =
    r"(?:(?:[A-Za-z0-9][A-Za-z0-9_-]{0,62})?[A-Za-z0-9]\.)+(?:xn--)?[A-Za-z]{2,}";

static IP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(IP_PATTERN).expect("static regex"));
static DOMAIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(DOMAIN_PATTERN).expect("static regex"));
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:(?:(?:[A-Za-z]*:)?//)?(?:\S+(?::\S*)?@)?(?:{}|{})(?::\d{{2,5}})?)(?:[/?#][^\s,\\]*)?",
        IP_PATTERN, DOMAIN_PATTERN
    ))
    .expect("static regex")
});
static FULL_URI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?:(?:(?:[A-Za-z]*:)?//)?(?:\S+(?::\S*)?@)?(?:{}|{})(?::\d{{2,5}})?)(?:[/?#]\S*)?$",
        IP_PATTERN, DOMAIN_PATTERN
    ))
    .expect("static regex")
});
static URI_PATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[/?#]\S*").expect("static regex"));

const INVALID_URI_CHARS: [char; 4] = ['"', '\'', '<', '>'];

/// Searches a text blob for network IOCs, recording each as a tag and a
/// table row. URIs found are also attached to `so_sig` as attributes when a
/// signature and source are provided.
pub fn extract_iocs_from_text_blob(
    blob: &str,
    result_section: &mut ResultTableSection,
    mut so_sig: Option<&mut Signature>,
    source: Option<&ObjectId>,
    enforce_char_min: bool,
) {
    if blob.is_empty() {
        return;
    }
    let blob = blob.to_lowercase();

    let ips: BTreeSet<String> = IP_RE
        .find_iter(&blob)
        .map(|m| m.as_str().to_string())
        .collect();
    let domains: BTreeSet<String> = DOMAIN_RE
        .find_iter(&blob)
        .map(|m| m.as_str().to_string())
        .filter(|d| !ips.contains(d))
        .collect();
    let uris: BTreeSet<String> = URL_RE
        .find_iter(&blob)
        .map(|m| m.as_str().to_string())
        .filter(|u| !domains.contains(u) && !ips.contains(u))
        .collect();

    for ip in &ips {
        if result_section.add_tag("network.dynamic.ip", ip) {
            result_section.add_row("ip", ip);
        }
    }

    for domain in &domains {
        if enforce_char_min && domain.len() < MIN_DOMAIN_CHARS {
            continue;
        }
        if result_section.add_tag("network.dynamic.domain", domain) {
            result_section.add_row("domain", domain);
        }
    }

    for uri in &uris {
        if enforce_char_min && uri.len() < MIN_URI_CHARS {
            continue;
        }
        let mut uri = uri.clone();
        // a URI scraped out of markup may drag quotes or brackets along
        if uri.chars().any(|c| INVALID_URI_CHARS.contains(&c)) {
            for invalid in INVALID_URI_CHARS {
                let candidate = uri
                    .split(invalid)
                    .find(|part| FULL_URI_RE.is_match(part))
                    .map(str::to_string);
                if let Some(candidate) = candidate {
                    uri = candidate;
                }
            }
        }
        if result_section.add_tag("network.dynamic.uri", &uri) {
            result_section.add_row("uri", &uri);
            if let (Some(sig), Some(source)) = (so_sig.as_deref_mut(), source) {
                sig.add_attribute(Attribute::new(source.clone()).with_uri(&uri));
            }
        }
        let remainder = match uri.split_once("//") {
            Some((_, rest)) => rest.to_string(),
            None => uri,
        };
        for uri_path in URI_PATH_RE.find_iter(&remainder) {
            let uri_path = uri_path.as_str();
            if enforce_char_min && uri_path.len() < MIN_URI_PATH_CHARS {
                continue;
            }
            if result_section.add_tag("network.dynamic.uri_path", uri_path) {
                result_section.add_row("uri_path", uri_path);
            }
        }
    }
}
