//! The ontology aggregator: owns every entity produced during an analysis
//! and enforces the linking and dedup rules between them.
//!
//! Processes are keyed by GUID. The map mirrors insertion order with a
//! side index so that lookups are cheap but time-tie sorting stays stable.

use std::collections::HashMap;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;

use crate::config::ServiceConfig;
use crate::error::{OntologyError, Result};
use crate::time::OntTime;

use super::network::{
    ConnectionDirection, NetworkConnection, NetworkDns, NetworkHttp, NetworkHttpUpdate,
    TransportLayerProtocol,
};
use super::objectid::{ObjectId, ObjectIdUpdate};
use super::process::{Process, ProcessUpdate};
use super::sandbox::{AnalysisMetadata, Sandbox};
use super::signature::{Attribute, Signature, SignatureType};

const SESSION_LENGTH: usize = 22;

/// Optional identity fields accepted by [`OntologyResults::create_objectid`].
#[derive(Debug, Clone, Default)]
pub struct ObjectIdParams {
    pub guid: Option<String>,
    pub session: Option<String>,
    pub time_observed: Option<OntTime>,
}

/// Optional process fields accepted by [`OntologyResults::create_process`].
#[derive(Debug, Clone, Default)]
pub struct ProcessParams {
    pub guid: Option<String>,
    pub pobjectid: Option<ObjectId>,
    pub pimage: Option<String>,
    pub pcommand_line: Option<String>,
    pub ppid: Option<u32>,
    pub pid: Option<u32>,
    pub command_line: Option<String>,
    pub end_time: Option<OntTime>,
    pub integrity_level: Option<String>,
    pub image_hash: Option<String>,
    pub original_file_name: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct OntologyResults {
    #[serde(skip)]
    pub service_name: Option<String>,
    pub sandboxes: Vec<Sandbox>,
    pub signatures: Vec<Signature>,
    pub network_connections: Vec<NetworkConnection>,
    pub network_dns: Vec<NetworkDns>,
    pub network_http: Vec<NetworkHttp>,
    processes: Vec<Process>,
    #[serde(skip)]
    guid_index: HashMap<String, usize>,
}

impl OntologyResults {
    pub fn new(service_name: Option<&str>) -> Self {
        Self {
            service_name: service_name.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn with_config(config: &ServiceConfig) -> Self {
        Self::new(Some(&config.service_name))
    }

    /// Builds an ObjectID stamped with this aggregator's service name.
    pub fn create_objectid(&self, tag: &str, ontology_id: &str, params: ObjectIdParams) -> Result<ObjectId> {
        let service_name = self
            .service_name
            .as_deref()
            .ok_or(OntologyError::MissingField("service_name"))?;
        let mut objectid = ObjectId::new(tag, ontology_id, service_name)?;
        if let Some(guid) = params.guid.as_deref() {
            objectid.set_guid(guid)?;
        }
        if let Some(session) = params.session {
            objectid.set_session(session);
        }
        if let Some(time_observed) = params.time_observed {
            objectid.set_time_observed_time(time_observed);
        }
        Ok(objectid)
    }

    /// Random token correlating entities from the same sandbox run when a
    /// submission fans out to several runs.
    pub fn create_session() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_LENGTH)
            .map(char::from)
            .collect()
    }

    /// Builds a Process ready for [`add_process`](Self::add_process).
    ///
    /// Structural validation happens here, not at ingest: a record that is its
    /// own parent or ends before it starts never gets constructed. Every
    /// created process carries a GUID, an observed time (defaulting to its
    /// start), and an end time (defaulting to the far-future sentinel).
    pub fn create_process(
        &self,
        objectid: ObjectId,
        image: &str,
        start_time: OntTime,
        params: ProcessParams,
    ) -> Result<Process> {
        let mut process = Process::new(objectid, image)?;
        process.set_start_time(start_time);
        if let Some(guid) = params.guid.as_deref() {
            process.objectid.set_guid(guid)?;
        }
        process.pobjectid = params.pobjectid;
        process.pimage = params.pimage;
        process.pcommand_line = params.pcommand_line;
        process.ppid = params.ppid;
        process.pid = params.pid;
        process.command_line = params.command_line;
        process.end_time = params.end_time;
        process.integrity_level = params.integrity_level.map(|level| level.to_lowercase());
        process.image_hash = params.image_hash;
        process.original_file_name = params.original_file_name;
        process.validate()?;

        process.objectid.assign_guid();
        if process.end_time.is_none() {
            process.set_end_time(OntTime::max_sentinel());
        }
        if process.objectid.time_observed().is_none() {
            process.objectid.set_time_observed_time(start_time);
        }
        Ok(process)
    }

    /// Builds a NetworkConnection with a GUID already assigned.
    pub fn create_network_connection(
        &self,
        objectid: ObjectId,
        destination_ip: &str,
        destination_port: u16,
        transport_layer_protocol: TransportLayerProtocol,
        direction: ConnectionDirection,
    ) -> Result<NetworkConnection> {
        let mut network_connection = NetworkConnection::new(
            objectid,
            destination_ip,
            destination_port,
            transport_layer_protocol,
            direction,
        )?;
        network_connection.objectid.assign_guid();
        Ok(network_connection)
    }

    pub fn create_network_dns(
        domain: &str,
        resolved_ips: Vec<String>,
        lookup_type: &str,
    ) -> Result<NetworkDns> {
        NetworkDns::new(domain, resolved_ips, lookup_type)
    }

    pub fn create_network_http(
        request_uri: &str,
        request_method: &str,
        update: NetworkHttpUpdate,
    ) -> Result<NetworkHttp> {
        let mut network_http = NetworkHttp::new(request_uri, request_method)?;
        network_http.update(update);
        Ok(network_http)
    }

    pub fn create_signature(
        objectid: ObjectId,
        name: &str,
        signature_type: SignatureType,
    ) -> Result<Signature> {
        Signature::new(objectid, name, signature_type)
    }

    pub fn create_attribute(source: ObjectId) -> Attribute {
        Attribute::new(source)
    }

    pub fn create_sandbox(
        objectid: ObjectId,
        sandbox_name: &str,
        analysis_metadata: Option<AnalysisMetadata>,
    ) -> Sandbox {
        let mut sandbox = Sandbox::new(objectid, AnalysisMetadata::default(), sandbox_name);
        if let Some(metadata) = analysis_metadata {
            sandbox.update_analysis_metadata(metadata);
        }
        sandbox
    }

    // ============================================================
    // Sandboxes
    // ============================================================

    pub fn add_sandbox(&mut self, sandbox: Sandbox) {
        self.sandboxes.push(sandbox);
    }

    pub fn get_sandboxes(&self) -> &[Sandbox] {
        &self.sandboxes
    }

    pub fn get_sandbox_by_session(&self, session: &str) -> Option<&Sandbox> {
        self.sandboxes
            .iter()
            .find(|s| s.objectid.session() == Some(session))
    }

    // ============================================================
    // Signatures
    // ============================================================

    pub fn add_signature(&mut self, signature: Signature) {
        self.signatures.push(signature);
    }

    pub fn get_signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Signatures whose attributes point at a process with the given PID.
    /// A source without a GUID is matched on its ontology id instead.
    pub fn get_signatures_by_pid(&self, pid: u32) -> Vec<&Signature> {
        let with_pid: Vec<&Process> = self.processes.iter().filter(|p| p.pid == Some(pid)).collect();
        self.signatures
            .iter()
            .filter(|sig| {
                sig.get_attributes().iter().any(|attr| match attr.source.guid() {
                    Some(guid) => with_pid.iter().any(|p| p.objectid.guid() == Some(guid)),
                    None => with_pid
                        .iter()
                        .any(|p| p.objectid.ontology_id() == attr.source.ontology_id()),
                })
            })
            .collect()
    }

    // ============================================================
    // Network connections
    // ============================================================

    pub fn add_network_connection(&mut self, mut network_connection: NetworkConnection) {
        if network_connection.objectid.guid().is_none() {
            network_connection.objectid.assign_guid();
        }
        self.network_connections.push(network_connection);
    }

    pub fn get_network_connections(&self) -> &[NetworkConnection] {
        &self.network_connections
    }

    pub fn get_network_connection_by_pid(&self, pid: u32) -> Vec<&NetworkConnection> {
        self.network_connections
            .iter()
            .filter(|nc| nc.process.as_ref().map_or(false, |p| p.pid == Some(pid)))
            .collect()
    }

    pub fn get_network_connection_by_guid(&self, guid: &str) -> Option<&NetworkConnection> {
        self.network_connections
            .iter()
            .find(|nc| nc.objectid.guid() == Some(guid))
    }

    /// Matches a flow on its endpoint tuple. Port 80 lookups also accept 443
    /// since sandboxes commonly observe the TLS upgrade, not the request.
    pub fn get_network_connection_by_details(
        &self,
        destination_ip: &str,
        destination_port: u16,
        direction: ConnectionDirection,
        transport_layer_protocol: TransportLayerProtocol,
    ) -> Option<&NetworkConnection> {
        let ports: &[u16] = if destination_port == 80 { &[80, 443] } else { &[destination_port] };
        self.network_connections.iter().find(|nc| {
            nc.destination_ip == destination_ip
                && ports.contains(&nc.destination_port)
                && nc.direction == direction
                && nc.transport_layer_protocol == transport_layer_protocol
        })
    }

    pub fn add_network_dns(&mut self, dns: NetworkDns) {
        self.network_dns.push(dns);
    }

    pub fn get_network_dns(&self) -> &[NetworkDns] {
        &self.network_dns
    }

    pub fn get_domain_by_destination_ip(&self, ip: &str) -> Option<&str> {
        self.network_dns
            .iter()
            .find(|dns| dns.resolved_ips.iter().any(|r| r == ip))
            .map(|dns| dns.domain.as_str())
    }

    pub fn get_destination_ip_by_domain(&self, domain: &str) -> Option<&str> {
        self.network_dns
            .iter()
            .find(|dns| dns.domain == domain)
            .and_then(|dns| dns.resolved_ips.first())
            .map(String::as_str)
    }

    pub fn add_network_http(&mut self, http: NetworkHttp) {
        self.network_http.push(http);
    }

    pub fn get_network_http(&self) -> &[NetworkHttp] {
        &self.network_http
    }

    pub fn get_network_http_by_path(&self, path: &str) -> Option<&NetworkHttp> {
        self.network_http.iter().find(|http| {
            http.request_body_path.as_deref() == Some(path)
                || http.response_body_path.as_deref() == Some(path)
        })
    }

    pub fn get_network_connection_by_network_http(
        &self,
        http: &NetworkHttp,
    ) -> Option<&NetworkConnection> {
        self.network_connections
            .iter()
            .find(|nc| nc.http_details.as_ref() == Some(http))
    }

    pub fn get_network_http_by_details(
        &self,
        request_uri: &str,
        request_method: &str,
        request_headers: &HashMap<String, String>,
    ) -> Option<&NetworkHttp> {
        self.network_http.iter().find(|http| {
            http.request_uri == request_uri
                && http.request_method == request_method
                && &http.request_headers == request_headers
        })
    }

    // ============================================================
    // Processes
    // ============================================================

    /// Runs the structural checks and the dedup ladder, then links the
    /// newcomer into the process graph both as a child and as a parent of
    /// already-known processes. A deduplicated record is dropped silently.
    pub fn add_process(&mut self, mut process: Process) -> Result<()> {
        process.validate()?;
        if process.objectid.guid().is_none() {
            process.objectid.assign_guid();
        }
        if !self.validate_process(&process) {
            return Ok(());
        }

        self.link_parent(&mut process);

        let guid = match process.objectid.guid() {
            Some(guid) => guid.to_string(),
            None => return Ok(()),
        };
        self.processes.push(process);
        let index = self.processes.len() - 1;
        self.guid_index.insert(guid, index);

        self.link_children(index);
        Ok(())
    }

    pub fn get_processes(&self) -> &[Process] {
        &self.processes
    }

    /// Processes whose tree ID has not been safelisted. Processes without a
    /// tree ID are kept.
    pub fn get_non_safelisted_processes(&self, safelist: &[String]) -> Vec<&Process> {
        self.processes
            .iter()
            .filter(|p| match p.objectid.treeid() {
                Some(treeid) => !safelist.iter().any(|safe| safe == treeid),
                None => true,
            })
            .collect()
    }

    pub fn is_guid_in_results(&self, guid: &str) -> bool {
        self.guid_index.contains_key(guid)
    }

    pub fn get_process_by_guid(&self, guid: &str) -> Option<&Process> {
        self.guid_index.get(guid).map(|&index| &self.processes[index])
    }

    pub fn get_process_by_command_line(&self, command_line: &str) -> Option<&Process> {
        self.processes
            .iter()
            .find(|p| p.command_line.as_deref() == Some(command_line))
    }

    pub fn get_pids(&self) -> Vec<u32> {
        self.processes.iter().filter_map(|p| p.pid).collect()
    }

    pub fn get_process_by_pid(&self, pid: u32) -> Option<&Process> {
        let mut matches = self.processes.iter().filter(|p| p.pid == Some(pid));
        let first = matches.next();
        if matches.next().is_some() {
            log::warn!("Multiple processes with PID {}, could not determine a single process", pid);
            return None;
        }
        first
    }

    pub fn get_processes_by_pid_and_time(&self, pid: u32, timestamp: OntTime) -> Vec<&Process> {
        self.processes
            .iter()
            .filter(|p| p.pid == Some(pid) && window_contains(p, timestamp))
            .collect()
    }

    /// The unique process alive with this PID at this time, or None when the
    /// answer is ambiguous.
    pub fn get_process_by_pid_and_time(&self, pid: u32, timestamp: OntTime) -> Option<&Process> {
        let matches = self.get_processes_by_pid_and_time(pid, timestamp);
        if matches.len() > 1 {
            log::warn!("Multiple processes with PID {} at {}, could not determine a single process", pid, timestamp);
            return None;
        }
        matches.into_iter().next()
    }

    pub fn get_guid_by_pid_and_time(&self, pid: u32, timestamp: OntTime) -> Option<String> {
        self.get_process_by_pid_and_time(pid, timestamp)
            .and_then(|p| p.objectid.guid())
            .map(str::to_string)
    }

    pub fn get_pguid_by_pid_and_time(&self, pid: u32, timestamp: OntTime) -> Option<String> {
        self.get_process_by_pid_and_time(pid, timestamp)
            .and_then(|p| p.pobjectid.as_ref())
            .and_then(|poid| poid.guid())
            .map(str::to_string)
    }

    pub fn get_processes_by_pguid(&self, pguid: &str) -> Vec<&Process> {
        self.processes
            .iter()
            .filter(|p| {
                p.pobjectid
                    .as_ref()
                    .and_then(|poid| poid.guid())
                    .map_or(false, |g| g == pguid)
            })
            .collect()
    }

    /// General enrichment entrypoint. The target is located by GUID when the
    /// update carries one, otherwise by PID plus a timestamp (the end time
    /// when given, else the start time). When no tracked process matches and
    /// the update carries enough to build one, it is created and added.
    pub fn update_process(&mut self, update: ProcessUpdate) {
        let guid = update
            .objectid
            .as_ref()
            .and_then(|oid| oid.guid.clone());
        let index = match guid {
            Some(guid) => self.guid_index.get(guid.as_str()).copied(),
            None => match (update.pid, update.end_time.or(update.start_time)) {
                (Some(pid), Some(timestamp)) => self
                    .get_process_by_pid_and_time(pid, timestamp)
                    .and_then(|p| p.objectid.guid())
                    .and_then(|g| self.guid_index.get(g))
                    .copied(),
                _ => {
                    log::warn!("You need to pass a GUID, or a PID and a timestamp, to update a process");
                    return;
                }
            },
        };
        let index = match index {
            Some(index) => index,
            None => {
                match self.process_from_update(&update) {
                    Some(process) => {
                        if let Err(e) = self.add_process(process) {
                            log::warn!("Could not add process from update: {}", e);
                        }
                    }
                    None => log::debug!("Could not find process to update"),
                }
                return;
            }
        };

        // parent resolution mirrors add_process when the update names one
        let needs_parent_link = update.pobjectid.as_ref().map_or(false, |p| p.guid.is_some())
            || (update.ppid.is_some() && self.processes[index].pobjectid.is_none());

        self.processes[index].update(update);

        if needs_parent_link {
            let mut process = self.processes[index].clone();
            self.link_parent(&mut process);
            self.processes[index] = process;
        }
    }

    /// Promotes an update for an untracked process into a full record, when
    /// the update carries the required identity fields.
    fn process_from_update(&self, update: &ProcessUpdate) -> Option<Process> {
        let oid_update = update.objectid.as_ref()?;
        let tag = oid_update.tag.as_deref()?;
        let ontology_id = oid_update.ontology_id.as_deref()?;
        let image = update.image.as_deref()?;
        let start_time = update.start_time?;
        let service_name = oid_update
            .service_name
            .as_deref()
            .or(self.service_name.as_deref())?;

        let mut objectid = ObjectId::new(tag, ontology_id, service_name).ok()?;
        objectid.merge(oid_update);
        let params = ProcessParams {
            pimage: update.pimage.clone(),
            pcommand_line: update.pcommand_line.clone(),
            ppid: update.ppid,
            pid: update.pid,
            command_line: update.command_line.clone(),
            end_time: update.end_time,
            integrity_level: update.integrity_level.clone(),
            image_hash: update.image_hash.clone(),
            original_file_name: update.original_file_name.clone(),
            ..Default::default()
        };
        match self.create_process(objectid, image, start_time, params) {
            Ok(process) => Some(process),
            Err(e) => {
                log::warn!("Could not create process from update: {}", e);
                None
            }
        }
    }

    /// Enriches the ObjectID of whichever entity owns the given GUID.
    pub fn update_objectid(&mut self, update: ObjectIdUpdate) {
        let guid = match update.guid.as_deref() {
            Some(guid) => guid.to_string(),
            None => {
                log::warn!("You need to pass a GUID to update an ObjectID");
                return;
            }
        };
        if let Some(&index) = self.guid_index.get(guid.as_str()) {
            self.processes[index].objectid.merge(&update);
            return;
        }
        if let Some(nc) = self
            .network_connections
            .iter_mut()
            .find(|nc| nc.objectid.guid() == Some(guid.as_str()))
        {
            nc.objectid.merge(&update);
            return;
        }
        log::debug!("Could not find an entity with GUID {}", guid);
    }

    // ============================================================
    // Linking and dedup
    // ============================================================

    /// The dedup ladder. No two tracked processes may share a GUID, so a
    /// tracked GUID is rejected outright regardless of the PID. A fresh GUID
    /// colliding on PID gets the lifetime-window check.
    fn validate_process(&self, process: &Process) -> bool {
        let guid = process.objectid.guid();
        let guid_tracked = guid.map_or(false, |g| self.guid_index.contains_key(g));
        let pid_tracked = process
            .pid
            .map_or(false, |pid| self.processes.iter().any(|p| p.pid == Some(pid)));

        match (guid_tracked, pid_tracked) {
            (true, _) => {
                log::debug!("Duplicate process, skipping");
                false
            }
            (false, true) => self.handle_pid_match(process),
            (false, false) => true,
        }
    }

    /// PID reuse: identical windows mean a duplicate record, disjoint windows
    /// mean legitimate reuse, overlapping windows mean a conflicting record.
    fn handle_pid_match(&self, process: &Process) -> bool {
        let start = effective_start(process);
        let end = effective_end(process);
        let mut valid_entry = false;
        for existing in self.processes.iter().filter(|p| p.pid == process.pid) {
            let existing_start = effective_start(existing);
            let existing_end = effective_end(existing);
            if start == existing_start && end == existing_end {
                continue;
            }
            if start >= existing_end || end <= existing_start {
                valid_entry = true;
            }
        }
        valid_entry
    }

    /// Resolves and copies parent details onto a process about to be stored.
    fn link_parent(&mut self, process: &mut Process) {
        // explicit parent GUID wins
        let pguid = process
            .pobjectid
            .as_ref()
            .and_then(|poid| poid.guid())
            .map(str::to_string);
        if let Some(pguid) = pguid {
            if let Some(parent) = self.get_process_by_guid(&pguid) {
                let parent = parent.clone();
                process.set_parent(&parent);
                return;
            }
        }
        // otherwise fall back to PID plus time window
        if let (Some(ppid), Some(start_time)) = (process.ppid, process.start_time) {
            if let Some(index) = self.select_parent_index(ppid, start_time) {
                let parent = self.processes[index].clone();
                process.set_parent(&parent);
            }
        }
    }

    /// Among processes with the right PID whose window contains the child's
    /// start, picks the most recently started. Deliberately stricter than the
    /// general PID lookup: a unique answer exists even under PID reuse.
    fn select_parent_index(&self, ppid: u32, child_start: OntTime) -> Option<usize> {
        self.processes
            .iter()
            .enumerate()
            .filter(|(_, p)| p.pid == Some(ppid))
            .filter(|(_, p)| window_contains(p, child_start))
            .filter(|(_, p)| p.start_time.map_or(true, |s| s <= child_start))
            .max_by_key(|(_, p)| p.start_time.unwrap_or_else(OntTime::min_sentinel))
            .map(|(index, _)| index)
    }

    /// Adopts already-known processes that point at the newcomer, either by
    /// parent GUID or by PPID within the newcomer's lifetime.
    fn link_children(&mut self, parent_index: usize) {
        let parent = self.processes[parent_index].clone();
        let parent_guid = parent.objectid.guid().map(str::to_string);
        let parent_start = effective_start(&parent);

        for (index, process) in self.processes.iter_mut().enumerate() {
            if index == parent_index {
                continue;
            }
            let by_guid = match (&parent_guid, process.pobjectid.as_ref().and_then(|p| p.guid())) {
                (Some(pg), Some(g)) => pg == g,
                _ => false,
            };
            let by_pid = parent.pid.is_some()
                && parent.start_time.is_some()
                && process.ppid == parent.pid
                && window_contains(process, parent_start);
            if by_guid || by_pid {
                process.set_parent(&parent);
            }
        }
    }

    // ============================================================
    // Preprocessing
    // ============================================================

    /// Drops safelisted processes (and, since this runs after treeid
    /// assignment, any process that never received one) together with every
    /// signature or flow attributed to them, then clamps sentinel times to
    /// each item's sandbox analysis window.
    pub fn preprocess_ontology(&mut self, safelist: &[String]) {
        self.remove_safelisted_processes(safelist, true);

        let sandboxes = self.sandboxes.clone();
        for process in &mut self.processes {
            clamp_process_times(&sandboxes, process);
        }
        for signature in &mut self.signatures {
            for attribute in &mut signature.attributes {
                clamp_objectid_times(&sandboxes, &mut attribute.source);
            }
        }
        for nc in &mut self.network_connections {
            if let Some(process) = nc.process.as_mut() {
                clamp_process_times(&sandboxes, process);
            }
        }
    }

    pub(crate) fn remove_safelisted_processes(&mut self, safelist: &[String], need_tree_id: bool) {
        let safelisted_guids: Vec<String> = self
            .processes
            .iter()
            .filter(|p| match p.objectid.treeid() {
                Some(treeid) => safelist.iter().any(|s| s == treeid),
                None => need_tree_id,
            })
            .filter_map(|p| p.objectid.guid())
            .map(str::to_string)
            .collect();
        if safelisted_guids.is_empty() {
            return;
        }
        let is_safelisted =
            |guid: Option<&str>| guid.map_or(false, |g| safelisted_guids.iter().any(|s| s == g));

        // a signature goes when every one of its attributes points at the
        // same safelisted process, including the degenerate no-attribute case
        self.signatures.retain(|sig| {
            !safelisted_guids.iter().any(|safelisted| {
                sig.get_attributes()
                    .iter()
                    .all(|attr| attr.source.guid() == Some(safelisted.as_str()))
            })
        });

        let removed_connections: Vec<NetworkConnection> = self
            .network_connections
            .iter()
            .filter(|nc| is_safelisted(nc.process.as_ref().and_then(|p| p.objectid.guid())))
            .cloned()
            .collect();
        for nc in &removed_connections {
            if let Some(http) = &nc.http_details {
                self.network_http.retain(|h| h != http);
            }
            if let Some(dns) = &nc.dns_details {
                self.network_dns.retain(|d| d != dns);
            }
        }
        self.network_connections
            .retain(|nc| !is_safelisted(nc.process.as_ref().and_then(|p| p.objectid.guid())));
        self.processes.retain(|p| !is_safelisted(p.objectid.guid()));
        self.rebuild_guid_index();
    }

    fn rebuild_guid_index(&mut self) {
        self.guid_index = self
            .processes
            .iter()
            .enumerate()
            .filter_map(|(index, p)| p.objectid.guid().map(|g| (g.to_string(), index)))
            .collect();
    }

    pub fn as_primitives(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn window_for(sandboxes: &[Sandbox], session: Option<&str>) -> Option<(OntTime, OntTime)> {
    sandboxes
        .iter()
        .find(|s| s.objectid.session() == session)
        .map(|s| (s.analysis_metadata.start_time, s.analysis_metadata.end_time))
}

fn clamp_objectid_times(sandboxes: &[Sandbox], objectid: &mut ObjectId) {
    let (start_time, end_time) = match window_for(sandboxes, objectid.session()) {
        Some(window) => window,
        None => return,
    };
    match objectid.time_observed() {
        Some(t) if t.is_min() => objectid.set_time_observed_time(start_time),
        Some(t) if t.is_max() => objectid.set_time_observed_time(end_time),
        _ => {}
    }
}

fn clamp_process_times(sandboxes: &[Sandbox], process: &mut Process) {
    let (start_time, end_time) = match window_for(sandboxes, process.objectid.session()) {
        Some(window) => window,
        None => return,
    };
    if process.start_time.map_or(false, |t| t.is_min()) {
        process.set_start_time(start_time);
    }
    if process.end_time.map_or(false, |t| t.is_max()) {
        process.set_end_time(end_time);
    }
    clamp_objectid_times(sandboxes, &mut process.objectid);
    if let Some(pobjectid) = process.pobjectid.as_mut() {
        clamp_objectid_times(sandboxes, pobjectid);
    }
}

pub(crate) fn effective_start(process: &Process) -> OntTime {
    process.start_time.unwrap_or_else(OntTime::min_sentinel)
}

pub(crate) fn effective_end(process: &Process) -> OntTime {
    process.end_time.unwrap_or_else(OntTime::max_sentinel)
}

pub(crate) fn window_contains(process: &Process, timestamp: OntTime) -> bool {
    effective_start(process) <= timestamp && timestamp <= effective_end(process)
}
