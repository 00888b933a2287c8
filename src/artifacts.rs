//! Artifact validation and extraction.
//!
//! Sandboxes dump files alongside the ontology: memory dumps, network
//! captures, injected executables carved out by HollowsHunter. Each one is
//! either extracted for further analysis or attached as supplementary data,
//! and injected PEs raise the injection heuristic.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::constants::{
    HOLLOWSHUNTER_DLL_PATTERN, HOLLOWSHUNTER_EXE_PATTERN, HOLLOWSHUNTER_TITLE,
};
use crate::error::{OntologyError, Result};
use crate::section::ResultSection;

static HOLLOWSHUNTER_EXE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{}", HOLLOWSHUNTER_EXE_PATTERN)).expect("static regex"));
static HOLLOWSHUNTER_DLL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{}", HOLLOWSHUNTER_DLL_PATTERN)).expect("static regex"));

/// A file produced by the sandbox during analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub path: String,
    pub description: String,
    pub to_be_extracted: bool,
}

impl Artifact {
    pub fn new(name: &str, path: &str, description: &str, to_be_extracted: bool) -> Result<Self> {
        if name.is_empty() {
            return Err(OntologyError::MissingField("name"));
        }
        if path.is_empty() {
            return Err(OntologyError::MissingField("path"));
        }
        if description.is_empty() {
            return Err(OntologyError::MissingField("description"));
        }
        Ok(Self {
            name: name.to_string(),
            path: path.to_string(),
            description: description.to_string(),
            to_be_extracted,
        })
    }
}

#[derive(Debug, Error)]
#[error("maximum number of extracted files reached")]
pub struct ExtractionLimitReached;

/// The submission-side sink artifacts are handed to.
pub trait ArtifactRequest {
    /// Queues a file for extraction. Fails once the submission's extraction
    /// limit is reached.
    fn add_extracted(
        &mut self,
        path: &str,
        name: &str,
        description: &str,
    ) -> std::result::Result<(), ExtractionLimitReached>;

    fn add_supplementary(&mut self, path: &str, name: &str, description: &str);
}

/// Uploads every artifact and assembles the artifact result sections.
///
/// Hitting the extraction limit skips that artifact and carries on, so one
/// noisy sandbox run cannot abort the rest of the upload. Returns None when
/// nothing noteworthy was found.
pub fn handle_artifacts(
    artifacts: &[Artifact],
    request: &mut dyn ArtifactRequest,
    collapsed: bool,
    injection_heur_id: i32,
) -> Option<ResultSection> {
    let mut artifacts_result_section =
        ResultSection::new("Sandbox Artifacts").with_auto_collapse(collapsed);

    for artifact in artifacts {
        handle_artifact(artifact, &mut artifacts_result_section, injection_heur_id);

        if artifact.to_be_extracted {
            if request
                .add_extracted(&artifact.path, &artifact.name, &artifact.description)
                .is_err()
            {
                log::debug!("Extraction limit reached, skipping {}", artifact.name);
            }
        } else {
            request.add_supplementary(&artifact.path, &artifact.name, &artifact.description);
        }
    }

    if artifacts_result_section.subsections.is_empty() {
        None
    } else {
        Some(artifacts_result_section)
    }
}

fn handle_artifact(
    artifact: &Artifact,
    artifacts_result_section: &mut ResultSection,
    injection_heur_id: i32,
) {
    for (regex, signature_id) in [
        (&*HOLLOWSHUNTER_EXE_RE, "hollowshunter_exe"),
        (&*HOLLOWSHUNTER_DLL_RE, "hollowshunter_dll"),
    ] {
        if !regex.is_match(&artifact.name) {
            continue;
        }
        let position = match artifacts_result_section
            .subsections
            .iter()
            .position(|s| s.title_text == HOLLOWSHUNTER_TITLE)
        {
            Some(position) => position,
            None => {
                let mut section = ResultSection::new(HOLLOWSHUNTER_TITLE);
                section.set_heuristic(injection_heur_id);
                section.add_line("HollowsHunter dumped the following:");
                artifacts_result_section.add_subsection(section);
                artifacts_result_section.subsections.len() - 1
            }
        };
        let section = &mut artifacts_result_section.subsections[position];
        section.add_line(&format!("\t- {}", artifact.name));
        section.add_tag("dynamic.process.file_name", &artifact.name);
        if let Some(heuristic) = section.heuristic.as_mut() {
            heuristic.add_signature_id(signature_id);
        }
    }
}
