//! Event forest construction, treeid hashing, and safelist pruning.
//!
//! Events are linked into trees purely by GUID references. The treeid of a
//! node is the sha256 of its ancestor chain's tags, so identical spawn chains
//! hash identically across submissions and can be safelisted by hash.

use std::collections::HashMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::constants::PROCESS_TREE_DEPTH_LIMIT;
use crate::section::{ProcessItem, ResultProcessTreeSection};
use crate::time::OntTime;

use super::network::NetworkConnection;
use super::objectid::{ObjectId, ObjectIdUpdate};
use super::process::Process;
use super::results::OntologyResults;

/// Anything that can appear in the event tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Event {
    Process(Process),
    NetworkConnection(NetworkConnection),
}

impl Event {
    pub fn objectid(&self) -> &ObjectId {
        match self {
            Event::Process(p) => &p.objectid,
            Event::NetworkConnection(nc) => &nc.objectid,
        }
    }

    pub fn objectid_mut(&mut self) -> &mut ObjectId {
        match self {
            Event::Process(p) => &mut p.objectid,
            Event::NetworkConnection(nc) => &mut nc.objectid,
        }
    }

    /// The ObjectID this event hangs off of: a process's parent, or the
    /// process that opened a connection.
    pub fn parent_objectid(&self) -> Option<&ObjectId> {
        match self {
            Event::Process(p) => p.pobjectid.as_ref(),
            Event::NetworkConnection(nc) => nc.process.as_ref().map(|p| &p.objectid),
        }
    }

    pub fn as_process(&self) -> Option<&Process> {
        match self {
            Event::Process(p) => Some(p),
            Event::NetworkConnection(_) => None,
        }
    }

    fn time_observed(&self) -> OntTime {
        self.objectid()
            .time_observed()
            .unwrap_or_else(OntTime::min_sentinel)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub event: Event,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn new(event: Event) -> Self {
        Self {
            event,
            children: Vec::new(),
        }
    }
}

// ============================================================
// Sorting
// ============================================================

pub(crate) fn sort_events_by_time_observed(events: &mut [Event]) {
    if events.iter().any(|e| e.objectid().time_observed().is_none()) {
        log::warn!("All ObjectID time_observed values must be set before sorting");
        return;
    }
    events.sort_by_key(Event::time_observed);
}

/// When an event and its parent share a time observed, the time sort cannot
/// order them. This pushes each such parent ahead of its child, one move per
/// pass, until the list is stable. The pass cap guards against reference
/// cycles in malformed input.
pub(crate) fn sort_events_by_relationship(events: &mut Vec<Event>) {
    let max_passes = events.len() * events.len() + 1;
    for _ in 0..max_passes {
        if !relationship_pass(events) {
            return;
        }
    }
    log::error!("Unable to finish sorting events by relationship");
}

fn relationship_pass(events: &mut Vec<Event>) -> bool {
    for index in 0..events.len() {
        let (time_matches, pguid) = {
            let event = &events[index];
            match event.parent_objectid() {
                Some(pobjectid) => (
                    event.objectid().time_observed() == pobjectid.time_observed(),
                    pobjectid.guid().map(str::to_string),
                ),
                None => continue,
            }
        };
        let pguid = match (time_matches, pguid) {
            (true, Some(pguid)) => pguid,
            _ => continue,
        };
        for parent_index in index + 1..events.len() {
            if events[parent_index].objectid().guid() == Some(pguid.as_str()) {
                let parent = events.remove(parent_index);
                events.insert(index, parent);
                return true;
            }
        }
    }
    false
}

// ============================================================
// Forest construction
// ============================================================

fn arena_depth(children: &[Vec<usize>], index: usize) -> usize {
    1 + children[index]
        .iter()
        .map(|&child| arena_depth(children, child))
        .max()
        .unwrap_or(0)
}

/// Links a time-and-relationship-sorted event list into a forest. An event
/// whose parent GUID was already seen becomes that parent's child; anything
/// else becomes a root. Once any subtree reaches the depth limit, further
/// attachments are dropped rather than re-rooted.
pub(crate) fn build_forest(mut events: Vec<Event>) -> Vec<TreeNode> {
    sort_events_by_time_observed(&mut events);
    sort_events_by_relationship(&mut events);

    let event_count = events.len();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); event_count];
    let mut roots: Vec<usize> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for index in 0..event_count {
        let parent_index = events[index]
            .parent_objectid()
            .and_then(|p| p.guid())
            .and_then(|pguid| seen.get(pguid))
            .copied();
        match parent_index {
            Some(parent_index) => {
                let too_deep = (0..event_count)
                    .any(|top| arena_depth(&children, top) >= PROCESS_TREE_DEPTH_LIMIT);
                if !too_deep {
                    children[parent_index].push(index);
                }
                // still registered as seen so descendants do not re-root
            }
            None => roots.push(index),
        }
        if let Some(guid) = events[index].objectid().guid() {
            seen.insert(guid.to_string(), index);
        }
    }

    // a child's index always exceeds its parent's, so materialize bottom-up
    let mut slots: Vec<Option<TreeNode>> = events.into_iter().map(|e| Some(TreeNode::new(e))).collect();
    for index in (0..event_count).rev() {
        if children[index].is_empty() {
            continue;
        }
        let mut kids = Vec::with_capacity(children[index].len());
        for &child in &children[index] {
            if let Some(node) = slots[child].take() {
                kids.push(node);
            }
        }
        if let Some(node) = slots[index].as_mut() {
            node.children = kids;
        }
    }

    let mut forest: Vec<TreeNode> = roots.into_iter().filter_map(|root| slots[root].take()).collect();
    forest.sort_by_key(|node| node.event.time_observed());
    forest
}

// ============================================================
// Treeid hashing
// ============================================================

fn hash_node(
    parent_treeid: &str,
    parent_processtree: &str,
    node: &mut TreeNode,
    updates: &mut Vec<(String, String, String)>,
) {
    let tag = node.event.objectid().tag().to_string();

    let mut hasher = Sha256::new();
    hasher.update(parent_treeid.as_bytes());
    hasher.update(tag.as_bytes());
    let treeid = hex::encode(hasher.finalize());

    // only a process carries a pobjectid to fall back on; a connection
    // rooted on its own gets the bare tag
    let pobjectid = node.event.as_process().and_then(|p| p.pobjectid.as_ref());
    let processtree = if !parent_processtree.is_empty() {
        format!("{}|{}", parent_processtree, tag)
    } else if let Some(parent_pt) = pobjectid.and_then(|p| p.processtree()) {
        format!("{}|{}", parent_pt, tag)
    } else if let Some(parent_tag) = pobjectid.map(|p| p.tag()) {
        format!("{}|{}", parent_tag, tag)
    } else {
        tag.clone()
    };

    node.event.objectid_mut().set_treeid(treeid.clone());
    node.event.objectid_mut().set_processtree(processtree.clone());
    if let Some(guid) = node.event.objectid().guid() {
        updates.push((guid.to_string(), treeid.clone(), processtree.clone()));
    }

    for child in &mut node.children {
        hash_node(&treeid, &processtree, child, updates);
    }
}

// ============================================================
// Safelist pruning
// ============================================================

/// Removes a safe branch from the leaf up, stopping at the first node that is
/// not safelisted. A parent emptied by the removal inherits the removed hash
/// so the cascade can continue above it.
fn remove_safe_leaves_helper(node: &mut TreeNode, safe_treeids: &[String]) -> Option<String> {
    let mut index = 0;
    while index < node.children.len() {
        let hash_to_remove = remove_safe_leaves_helper(&mut node.children[index], safe_treeids);
        let child_treeid = node.children[index].event.objectid().treeid().map(str::to_string);
        match hash_to_remove {
            Some(hash) if Some(hash.as_str()) == child_treeid.as_deref() => {
                node.children.remove(index);
                if node.children.is_empty() {
                    node.event.objectid_mut().set_treeid(hash);
                }
            }
            _ => index += 1,
        }
    }

    if node.children.is_empty() {
        let treeid = node.event.objectid().treeid()?.to_string();
        if safe_treeids.iter().any(|s| s == &treeid) {
            return Some(treeid);
        }
    }
    None
}

pub(crate) fn remove_safe_leaves(forest: &mut Vec<TreeNode>, safe_treeids: &[String]) {
    for root in forest.iter_mut() {
        remove_safe_leaves_helper(root, safe_treeids);
    }
    forest.retain(|root| {
        let root_is_safe = root
            .event
            .objectid()
            .treeid()
            .map_or(false, |t| safe_treeids.iter().any(|s| s == t));
        !(root_is_safe && root.children.is_empty())
    });
}

/// Filters safe branches out of an event tree. A safelisted node with
/// non-safelisted descendants is retained so the suspicious activity keeps
/// its context.
pub fn filter_event_tree_against_safe_treeids(forest: &mut Vec<TreeNode>, safe_treeids: &[String]) {
    remove_safe_leaves(forest, safe_treeids);
}

// ============================================================
// OntologyResults tree operations
// ============================================================

impl OntologyResults {
    /// All process and network events with a known time, sorted by time
    /// observed, excluding safelisted treeids.
    pub fn get_events(&self, safelist: &[String]) -> Vec<Event> {
        let not_safelisted = |objectid: &ObjectId| {
            objectid
                .treeid()
                .map_or(true, |t| !safelist.iter().any(|s| s == t))
        };
        let mut events: Vec<Event> = self
            .get_processes()
            .iter()
            .filter(|p| p.start_time.is_some() && not_safelisted(&p.objectid))
            .cloned()
            .map(Event::Process)
            .collect();
        events.extend(
            self.get_network_connections()
                .iter()
                .filter(|nc| nc.objectid.time_observed().is_some() && not_safelisted(&nc.objectid))
                .cloned()
                .map(Event::NetworkConnection),
        );
        sort_events_by_time_observed(&mut events);
        events
    }

    /// Builds the full event forest, stamps a treeid and processtree onto
    /// every node, and writes them back onto the owned entities.
    pub fn get_process_tree(&mut self, safelist: &[String]) -> Vec<TreeNode> {
        let events = self.get_events(&[]);
        let mut forest = build_forest(events);

        let mut updates = Vec::new();
        for root in &mut forest {
            hash_node("", "", root, &mut updates);
        }
        for (guid, treeid, processtree) in updates {
            self.update_objectid(ObjectIdUpdate {
                guid: Some(guid),
                treeid: Some(treeid),
                processtree: Some(processtree),
                ..Default::default()
            });
        }

        if !safelist.is_empty() {
            filter_event_tree_against_safe_treeids(&mut forest, safelist);
        }
        forest
    }

    /// Renders the process tree as a result section. Network events only
    /// contribute counts; safelisted processes stay visible but untagged.
    pub fn get_process_tree_result_section(&mut self, safelist: &[String]) -> ResultProcessTreeSection {
        let tree = self.get_process_tree(safelist);
        let mut section = ResultProcessTreeSection::new("Spawned Process Tree");
        let mut items: Vec<ProcessItem> = Vec::new();
        for node in &tree {
            if let Some(process) = node.event.as_process() {
                let item = self.convert_event_tree(process, &node.children, safelist, &mut section);
                items.push(item);
            }
        }
        for item in items {
            section.add_process(item);
        }
        section
    }

    fn convert_event_tree(
        &self,
        process: &Process,
        children: &[TreeNode],
        safelist: &[String],
        section: &mut ResultProcessTreeSection,
    ) -> ProcessItem {
        let mut item = ProcessItem::new(
            process.pid.unwrap_or(0),
            &process.image,
            process.command_line.as_deref(),
        );

        if let Some(pid) = process.pid {
            item.add_network_events(self.get_network_connection_by_pid(pid).len());
            for signature in self.get_signatures_by_pid(pid) {
                item.add_signature(&signature.name, signature.score.unwrap_or(0));
            }
        }

        let safelisted = process
            .objectid
            .treeid()
            .map_or(false, |t| safelist.iter().any(|s| s == t));
        if safelisted {
            item.safelist();
        } else {
            if let Some(processtree) = process.objectid.processtree() {
                section.add_tag("dynamic.processtree_id", processtree);
            }
            if let Some(command_line) = &process.command_line {
                section.add_tag("dynamic.process.command_line", command_line);
            }
        }

        for child in children {
            if let Some(child_process) = child.event.as_process() {
                let child_item =
                    self.convert_event_tree(child_process, &child.children, safelist, section);
                item.add_child_process(child_item);
            }
        }
        item
    }
}
