//! Result report building blocks.
//!
//! These are the structured sections a service hands back to the scoring
//! layer: a generic text section with optional heuristic, a table section
//! for IOC rows, and the process tree section.

use std::collections::BTreeMap;

use serde::Serialize;

/// A scoring annotation on a section. Signature hits are counted so a
/// signature firing repeatedly can be weighted by frequency downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heuristic {
    pub heur_id: i32,
    pub signatures: BTreeMap<String, u32>,
}

impl Heuristic {
    pub fn new(heur_id: i32) -> Self {
        Self {
            heur_id,
            signatures: BTreeMap::new(),
        }
    }

    pub fn add_signature_id(&mut self, signature_id: &str) {
        *self.signatures.entry(signature_id.to_string()).or_insert(0) += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSection {
    pub title_text: String,
    pub body: Vec<String>,
    pub auto_collapse: bool,
    pub heuristic: Option<Heuristic>,
    pub subsections: Vec<ResultSection>,
    /// tag type to deduplicated values
    pub tags: BTreeMap<String, Vec<String>>,
}

impl ResultSection {
    pub fn new(title_text: &str) -> Self {
        Self {
            title_text: title_text.to_string(),
            body: Vec::new(),
            auto_collapse: false,
            subsections: Vec::new(),
            heuristic: None,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_auto_collapse(mut self, auto_collapse: bool) -> Self {
        self.auto_collapse = auto_collapse;
        self
    }

    pub fn add_line(&mut self, line: &str) {
        self.body.push(line.to_string());
    }

    pub fn set_heuristic(&mut self, heur_id: i32) {
        self.heuristic = Some(Heuristic::new(heur_id));
    }

    /// Records a tag value, skipping empties and duplicates. Returns whether
    /// the value was recorded.
    pub fn add_tag(&mut self, tag_type: &str, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        let values = self.tags.entry(tag_type.to_string()).or_default();
        if values.iter().any(|v| v == value) {
            return false;
        }
        values.push(value.to_string());
        true
    }

    pub fn add_subsection(&mut self, subsection: ResultSection) {
        self.subsections.push(subsection);
    }
}

/// One row of the IOC table: the tag type and the observed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub ioc_type: String,
    pub ioc: String,
}

/// A section whose body is a table of IOC rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultTableSection {
    #[serde(flatten)]
    pub section: ResultSection,
    pub rows: Vec<TableRow>,
}

impl ResultTableSection {
    pub fn new(title_text: &str) -> Self {
        Self {
            section: ResultSection::new(title_text),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, ioc_type: &str, ioc: &str) {
        let row = TableRow {
            ioc_type: ioc_type.to_string(),
            ioc: ioc.to_string(),
        };
        if !self.rows.contains(&row) {
            self.rows.push(row);
        }
    }

    pub fn add_tag(&mut self, tag_type: &str, value: &str) -> bool {
        self.section.add_tag(tag_type, value)
    }
}

/// One process entry in the rendered tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessItem {
    pub pid: u32,
    pub name: String,
    pub cmd: Option<String>,
    pub signatures: BTreeMap<String, i32>,
    pub children: Vec<ProcessItem>,
    pub network_count: usize,
    pub file_count: usize,
    pub registry_count: usize,
    pub safelisted: bool,
}

impl ProcessItem {
    pub fn new(pid: u32, name: &str, cmd: Option<&str>) -> Self {
        Self {
            pid,
            name: name.to_string(),
            cmd: cmd.map(str::to_string),
            signatures: BTreeMap::new(),
            children: Vec::new(),
            network_count: 0,
            file_count: 0,
            registry_count: 0,
            safelisted: false,
        }
    }

    pub fn add_signature(&mut self, name: &str, score: i32) {
        self.signatures.insert(name.to_string(), score);
    }

    pub fn add_child_process(&mut self, child: ProcessItem) {
        self.children.push(child);
    }

    pub fn add_network_events(&mut self, count: usize) {
        self.network_count += count;
    }

    pub fn add_file_events(&mut self, count: usize) {
        self.file_count += count;
    }

    pub fn add_registry_events(&mut self, count: usize) {
        self.registry_count += count;
    }

    pub fn safelist(&mut self) {
        self.safelisted = true;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultProcessTreeSection {
    pub title_text: String,
    pub processes: Vec<ProcessItem>,
    pub tags: BTreeMap<String, Vec<String>>,
}

impl ResultProcessTreeSection {
    pub fn new(title_text: &str) -> Self {
        Self {
            title_text: title_text.to_string(),
            processes: Vec::new(),
            tags: BTreeMap::new(),
        }
    }

    pub fn add_process(&mut self, process: ProcessItem) {
        self.processes.push(process);
    }

    pub fn add_tag(&mut self, tag_type: &str, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        let values = self.tags.entry(tag_type.to_string()).or_default();
        if values.iter().any(|v| v == value) {
            return false;
        }
        values.push(value.to_string());
        true
    }
}
