//! Built-in grid topologies and JSON topology loading.
//!
//! The presets are compact cyber-physical test grids: a physical layer of
//! generators, buses and loads, a cyber layer of PLCs behind a router and an
//! HMI, and coupling edges between the two.

use gridlab_core::{EdgeKind, EdgeSpec, NodeKind, NodeSpec, TopologyDescriptor};
use gridlab_env::NodeLayer;
use std::path::Path;
use std::str::FromStr;

use crate::error::SimError;

/// Preset topologies shipped with the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyPreset {
    /// IEEE 14-bus style grid, 17 nodes
    Ieee14,
    /// IEEE 30-bus style grid, 20 nodes
    Ieee30,
}

impl TopologyPreset {
    pub fn all() -> [TopologyPreset; 2] {
        [TopologyPreset::Ieee14, TopologyPreset::Ieee30]
    }

    pub fn name(&self) -> &'static str {
        match self {
            TopologyPreset::Ieee14 => "ieee14",
            TopologyPreset::Ieee30 => "ieee30",
        }
    }

    /// Builds the descriptor for this preset.
    pub fn descriptor(&self) -> TopologyDescriptor {
        let mut nodes = base_nodes();
        if *self == TopologyPreset::Ieee30 {
            nodes.extend([
                physical("bus8", "Bus 8", NodeKind::Bus, 0.35, 0.35),
                physical("bus9", "Bus 9", NodeKind::Bus, 0.65, 0.35),
                physical("gen3", "Gen 3", NodeKind::Generator, 0.5, 0.1),
            ]);
        }
        TopologyDescriptor::new(nodes, base_edges()).named(self.name())
    }
}

impl FromStr for TopologyPreset {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ieee14" | "ieee-14" => Ok(TopologyPreset::Ieee14),
            "ieee30" | "ieee-30" => Ok(TopologyPreset::Ieee30),
            _ => Err(SimError::UnknownTopology(s.to_string())),
        }
    }
}

fn physical(id: &str, label: &str, kind: NodeKind, x: f64, y: f64) -> NodeSpec {
    NodeSpec::new(id, label, kind, NodeLayer::Physical).at(x, y)
}

fn cyber(id: &str, label: &str, kind: NodeKind, x: f64, y: f64) -> NodeSpec {
    NodeSpec::new(id, label, kind, NodeLayer::Cyber).at(x, y)
}

fn base_nodes() -> Vec<NodeSpec> {
    vec![
        physical("gen1", "Gen 1", NodeKind::Generator, 0.15, 0.15),
        physical("gen2", "Gen 2", NodeKind::Generator, 0.85, 0.15),
        physical("bus1", "Bus 1", NodeKind::Bus, 0.2, 0.3),
        physical("bus2", "Bus 2", NodeKind::Bus, 0.4, 0.25),
        physical("bus3", "Bus 3", NodeKind::Bus, 0.6, 0.25),
        physical("bus4", "Bus 4", NodeKind::Bus, 0.8, 0.3),
        physical("bus5", "Bus 5", NodeKind::Bus, 0.3, 0.45),
        physical("bus6", "Bus 6", NodeKind::Bus, 0.5, 0.45),
        physical("bus7", "Bus 7", NodeKind::Bus, 0.7, 0.45),
        physical("load1", "Load 1", NodeKind::Load, 0.25, 0.6),
        physical("load2", "Load 2", NodeKind::Load, 0.5, 0.6),
        physical("load3", "Load 3", NodeKind::Load, 0.75, 0.6),
        cyber("plc1", "PLC 1", NodeKind::Plc, 0.2, 0.8),
        cyber("plc2", "PLC 2", NodeKind::Plc, 0.4, 0.8),
        cyber("plc3", "PLC 3", NodeKind::Plc, 0.6, 0.8),
        cyber("router1", "Router", NodeKind::Router, 0.5, 0.9),
        cyber("hmi1", "HMI", NodeKind::Hmi, 0.8, 0.8),
    ]
}

fn base_edges() -> Vec<EdgeSpec> {
    let link = |a: &str, b: &str, kind: EdgeKind| EdgeSpec::new(a, b, kind);
    vec![
        link("gen1", "bus1", EdgeKind::Physical),
        link("gen2", "bus4", EdgeKind::Physical),
        link("bus1", "bus2", EdgeKind::Physical),
        link("bus2", "bus3", EdgeKind::Physical),
        link("bus3", "bus4", EdgeKind::Physical),
        link("bus1", "bus5", EdgeKind::Physical),
        link("bus4", "bus7", EdgeKind::Physical),
        link("bus5", "bus6", EdgeKind::Physical),
        link("bus6", "bus7", EdgeKind::Physical),
        link("bus5", "load1", EdgeKind::Physical),
        link("bus6", "load2", EdgeKind::Physical),
        link("bus7", "load3", EdgeKind::Physical),
        link("plc1", "router1", EdgeKind::Cyber),
        link("plc2", "router1", EdgeKind::Cyber),
        link("plc3", "router1", EdgeKind::Cyber),
        link("router1", "hmi1", EdgeKind::Cyber),
        link("gen1", "plc1", EdgeKind::Coupling).with_weight(0.5),
        link("bus6", "plc2", EdgeKind::Coupling).with_weight(0.5),
        link("load2", "plc3", EdgeKind::Coupling).with_weight(0.5),
    ]
}

/// Parses a topology descriptor from JSON text.
///
/// The descriptor's name defaults to `fallback_name` when the file has none.
pub fn parse_topology(json: &str, fallback_name: &str) -> Result<TopologyDescriptor, SimError> {
    let mut topology: TopologyDescriptor =
        serde_json::from_str(json).map_err(|e| SimError::TopologyParse {
            path: fallback_name.to_string(),
            reason: e.to_string(),
        })?;
    if topology.name.is_empty() {
        topology.name = fallback_name.to_string();
    }
    Ok(topology)
}

/// Loads a topology by preset name or from a `.json` file path.
pub fn load_topology(spec: &str) -> Result<TopologyDescriptor, SimError> {
    if let Ok(preset) = spec.parse::<TopologyPreset>() {
        return Ok(preset.descriptor());
    }

    let path = Path::new(spec);
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return Err(SimError::UnknownTopology(spec.to_string()));
    }

    let json = std::fs::read_to_string(path).map_err(|e| SimError::io(spec, e))?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("custom");
    parse_topology(&json, name).map_err(|e| match e {
        SimError::TopologyParse { reason, .. } => SimError::TopologyParse {
            path: spec.to_string(),
            reason,
        },
        other => other,
    })
}
