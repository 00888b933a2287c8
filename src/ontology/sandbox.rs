//! Sandbox run metadata: which analysis produced the events, on what
//! machine, and over which time window.

use serde::{Deserialize, Serialize};

use crate::time::OntTime;

use super::objectid::ObjectId;
use super::process::merge_opt_string;

/// Details of the virtual machine the sample ran on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineMetadata {
    pub ip: Option<String>,
    pub hypervisor: Option<String>,
    pub hostname: Option<String>,
    pub platform: Option<String>,
    pub version: Option<String>,
    pub architecture: Option<String>,
}

impl MachineMetadata {
    pub fn update(&mut self, update: MachineMetadata) {
        merge_opt_string(&mut self.ip, update.ip.as_deref());
        merge_opt_string(&mut self.hypervisor, update.hypervisor.as_deref());
        merge_opt_string(&mut self.hostname, update.hostname.as_deref());
        merge_opt_string(&mut self.platform, update.platform.as_deref());
        merge_opt_string(&mut self.version, update.version.as_deref());
        merge_opt_string(&mut self.architecture, update.architecture.as_deref());
    }
}

/// The analysis window and routing details for one sandbox task.
///
/// Start and end default to the far-past and far-future sentinels so that
/// event-time clamping still works when a sandbox does not report its window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub task_id: Option<String>,
    pub start_time: OntTime,
    pub end_time: OntTime,
    pub routing: Option<String>,
    pub machine_metadata: Option<MachineMetadata>,
}

impl Default for AnalysisMetadata {
    fn default() -> Self {
        Self {
            task_id: None,
            start_time: OntTime::min_sentinel(),
            end_time: OntTime::max_sentinel(),
            routing: None,
            machine_metadata: None,
        }
    }
}

impl AnalysisMetadata {
    pub fn update(&mut self, update: AnalysisMetadata) {
        merge_opt_string(&mut self.task_id, update.task_id.as_deref());
        merge_opt_string(&mut self.routing, update.routing.as_deref());
        if self.start_time.is_min() {
            self.start_time = update.start_time;
        }
        if self.end_time.is_max() {
            self.end_time = update.end_time;
        }
        match (self.machine_metadata.as_mut(), update.machine_metadata) {
            (Some(current), Some(incoming)) => current.update(incoming),
            (None, Some(incoming)) => self.machine_metadata = Some(incoming),
            _ => {}
        }
    }
}

/// One sandbox run. A submission may fan out to several of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sandbox {
    pub objectid: ObjectId,
    pub analysis_metadata: AnalysisMetadata,
    pub sandbox_name: String,
    pub sandbox_version: Option<String>,
}

impl Sandbox {
    pub fn new(objectid: ObjectId, analysis_metadata: AnalysisMetadata, sandbox_name: &str) -> Self {
        Self {
            objectid,
            analysis_metadata,
            sandbox_name: sandbox_name.to_string(),
            sandbox_version: None,
        }
    }

    pub fn update_analysis_metadata(&mut self, update: AnalysisMetadata) {
        self.analysis_metadata.update(update);
    }

    pub fn update_machine_metadata(&mut self, update: MachineMetadata) {
        match self.analysis_metadata.machine_metadata.as_mut() {
            Some(current) => current.update(update),
            None => self.analysis_metadata.machine_metadata = Some(update),
        }
    }

    pub fn as_primitives(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
