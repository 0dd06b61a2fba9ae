//! Attack scenarios for the Virtual Lab.

use gridlab_env::AttackType;
use std::fmt;

/// One attack to inject: a type and a target node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackScenario {
    pub attack: AttackType,
    pub target: String,
}

impl AttackScenario {
    pub fn new(attack: AttackType, target: impl Into<String>) -> Self {
        Self {
            attack,
            target: target.into(),
        }
    }

    /// The attack against its usual entry point in the preset grids.
    pub fn default_for(attack: AttackType) -> Self {
        Self::new(attack, default_target(attack))
    }

    /// One scenario per attack type, each at its default target.
    pub fn all() -> Vec<AttackScenario> {
        AttackType::all().into_iter().map(Self::default_for).collect()
    }

    /// Short name, e.g. `fdi@bus6`.
    pub fn name(&self) -> String {
        format!("{}@{}", self.attack.code().to_lowercase(), self.target)
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> String {
        let what = match self.attack {
            AttackType::Ransomware => "encrypts operator workstations and halts supervisory control",
            AttackType::FalseDataInjection => "corrupts bus measurements to mislead state estimation",
            AttackType::ReverseShell => "opens an outbound command channel from the control network",
            AttackType::BruteForce => "guesses credentials on an operator interface",
            AttackType::Backdoor => "plants persistent access on a field controller",
        };
        format!("{} on {}: {}", self.attack.label(), self.target, what)
    }
}

impl fmt::Display for AttackScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Default target node per attack type in the preset topologies.
pub fn default_target(attack: AttackType) -> &'static str {
    match attack {
        AttackType::Ransomware => "hmi1",
        AttackType::FalseDataInjection => "bus6",
        AttackType::ReverseShell => "router1",
        AttackType::BruteForce => "hmi1",
        AttackType::Backdoor => "plc2",
    }
}
