//! Common types for the GridLab environment abstraction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one lab run (`start` to `settle`/`cancel`).
///
/// Uses UUID v4 for global uniqueness without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Creates a new random RunId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic RunId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Domain a grid node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeLayer {
    Physical,
    Cyber,
}

/// Verdict class reported by the detection model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Benign,
    Malicious,
}

/// Attack families the testbed can inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttackType {
    /// Ransomware
    #[serde(rename = "RW")]
    Ransomware,
    /// False data injection against measurements
    #[serde(rename = "FDI")]
    FalseDataInjection,
    /// Reverse shell
    #[serde(rename = "RS")]
    ReverseShell,
    /// Brute-force credential attack
    #[serde(rename = "BF")]
    BruteForce,
    /// Backdoor persistence
    #[serde(rename = "BD")]
    Backdoor,
}

impl AttackType {
    /// Returns every attack type in display order.
    pub fn all() -> [AttackType; 5] {
        [
            AttackType::Ransomware,
            AttackType::FalseDataInjection,
            AttackType::ReverseShell,
            AttackType::BruteForce,
            AttackType::Backdoor,
        ]
    }

    /// Short code used on the wire and on the command line.
    pub fn code(&self) -> &'static str {
        match self {
            AttackType::Ransomware => "RW",
            AttackType::FalseDataInjection => "FDI",
            AttackType::ReverseShell => "RS",
            AttackType::BruteForce => "BF",
            AttackType::Backdoor => "BD",
        }
    }

    /// Human-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            AttackType::Ransomware => "Ransomware",
            AttackType::FalseDataInjection => "False Data Injection",
            AttackType::ReverseShell => "Reverse Shell",
            AttackType::BruteForce => "Brute Force",
            AttackType::Backdoor => "Backdoor",
        }
    }
}

impl std::fmt::Display for AttackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for AttackType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rw" | "ransomware" => Ok(AttackType::Ransomware),
            "fdi" | "false_data_injection" => Ok(AttackType::FalseDataInjection),
            "rs" | "reverse_shell" => Ok(AttackType::ReverseShell),
            "bf" | "brute_force" => Ok(AttackType::BruteForce),
            "bd" | "backdoor" => Ok(AttackType::Backdoor),
            _ => Err(format!("Unknown attack type: {}", s)),
        }
    }
}
