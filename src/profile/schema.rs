//! Machine Profile Schema
//!
//! TOML file layout and the runtime profile built from it.

use serde::Deserialize;

use crate::core::Point3;
use crate::tools::{Tool, ToolKind};

/// Lookahead depth when the profile does not set one
pub const DEFAULT_QUEUE_DEPTH: usize = 16;

/// Root profile file structure (matches TOML)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProfileFile {
    pub machine: MachineSection,
    #[serde(default)]
    pub tools: Vec<ToolDef>,
    #[serde(default)]
    pub work_offsets: Vec<WorkOffsetDef>,
}

/// `[machine]` table
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MachineSection {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    #[serde(default = "default_true")]
    pub block_delete: bool,
    #[serde(default)]
    pub optional_stop: bool,
    #[serde(default = "default_override")]
    pub feed_override: f64,
    #[serde(default = "default_override")]
    pub speed_override: f64,
}

/// `[[tools]]` entry
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ToolDef {
    pub index: usize,
    #[serde(default)]
    pub kind: ToolKind,
    pub diameter: f64,
    #[serde(default)]
    pub length: f64,
}

/// `[[work_offsets]]` entry, `system` 1 is G54
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WorkOffsetDef {
    pub system: u8,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

fn default_true() -> bool {
    true
}

fn default_override() -> f64 {
    0.9
}

/// Switches and overrides the simulated machine runs with
#[derive(Debug, Clone, PartialEq)]
pub struct MachineSettings {
    pub queue_depth: usize,
    pub block_delete: bool,
    pub optional_stop: bool,
    pub feed_override: f64,
    pub speed_override: f64,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
            block_delete: true,
            optional_stop: false,
            feed_override: default_override(),
            speed_override: default_override(),
        }
    }
}

/// Runtime machine profile
#[derive(Debug, Clone, PartialEq)]
pub struct MachineProfile {
    pub name: String,
    pub description: Option<String>,
    pub settings: MachineSettings,
    pub tools: Vec<Tool>,
    /// `(system, offset)` pairs
    pub work_offsets: Vec<(u8, Point3)>,
}

impl Default for MachineProfile {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            description: None,
            settings: MachineSettings::default(),
            tools: Vec::new(),
            work_offsets: Vec::new(),
        }
    }
}

impl From<ProfileFile> for MachineProfile {
    fn from(file: ProfileFile) -> Self {
        let tools = file
            .tools
            .into_iter()
            .map(|t| Tool {
                index: t.index,
                kind: t.kind,
                diameter: t.diameter,
                length: t.length,
            })
            .collect();

        let work_offsets = file
            .work_offsets
            .into_iter()
            .map(|w| (w.system, Point3::new(w.x, w.y, w.z)))
            .collect();

        Self {
            name: file.machine.name,
            description: file.machine.description,
            settings: MachineSettings {
                queue_depth: file.machine.queue_depth,
                block_delete: file.machine.block_delete,
                optional_stop: file.machine.optional_stop,
                feed_override: file.machine.feed_override,
                speed_override: file.machine.speed_override,
            },
            tools,
            work_offsets,
        }
    }
}
