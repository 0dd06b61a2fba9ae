//! Attack definitions and mitigation playbooks.

use gridlab_env::{AttackProbe, AttackType};
use serde::{Deserialize, Serialize};

use crate::error::LabError;
use crate::graph::GridSnapshot;

/// How many neighbours an injected attack spreads to.
const MAX_SPREAD: usize = 2;

/// An attack the operator injects into the running grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackSpec {
    pub attack_type: AttackType,
    pub target: String,
}

impl AttackSpec {
    pub fn new(attack_type: AttackType, target: impl Into<String>) -> Self {
        Self {
            attack_type,
            target: target.into(),
        }
    }

    /// Target plus up to two neighbours, taken in edge order.
    pub fn affected_nodes(&self, snapshot: &GridSnapshot) -> Result<Vec<String>, LabError> {
        if !snapshot.contains(&self.target) {
            return Err(LabError::UnknownNode(self.target.clone()));
        }

        // Parallel edges count once
        let mut affected = vec![self.target.clone()];
        for neighbor in snapshot.neighbors(&self.target) {
            if affected.len() > MAX_SPREAD {
                break;
            }
            if !affected.iter().any(|id| id == neighbor) {
                affected.push(neighbor.to_string());
            }
        }
        Ok(affected)
    }

    /// Builds the probe handed to the inference engine.
    pub fn probe(&self, snapshot: &GridSnapshot) -> Result<AttackProbe, LabError> {
        Ok(AttackProbe {
            attack_type: self.attack_type,
            target: self.target.clone(),
            affected: self.affected_nodes(snapshot)?,
        })
    }

    /// Recommended operator actions for this attack.
    pub fn mitigations(&self) -> &'static [&'static str] {
        mitigations(self.attack_type)
    }
}

impl std::fmt::Display for AttackSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} attack targeting {}", self.attack_type, self.target)
    }
}

/// Ordered mitigation playbook per attack type.
pub fn mitigations(attack: AttackType) -> &'static [&'static str] {
    match attack {
        AttackType::Ransomware => &[
            "Immediately isolate affected systems from the network",
            "Activate backup systems and restore from clean snapshots",
            "Engage incident response team and notify stakeholders",
            "Review and patch vulnerabilities in compromised systems",
        ],
        AttackType::FalseDataInjection => &[
            "Cross-validate sensor readings with redundant measurements",
            "Switch to manual control mode for affected buses",
            "Deploy anomaly detection on all measurement units",
            "Recalibrate sensors after verification",
        ],
        AttackType::ReverseShell => &[
            "Terminate suspicious processes and connections immediately",
            "Block outbound connections from compromised hosts",
            "Conduct forensic analysis of affected systems",
            "Update firewall rules to prevent re-exploitation",
        ],
        AttackType::BruteForce => &[
            "Enable account lockout after failed login attempts",
            "Implement multi-factor authentication",
            "Review and strengthen password policies",
            "Monitor for credential stuffing attempts",
        ],
        AttackType::Backdoor => &[
            "Scan all systems for persistence mechanisms",
            "Review startup scripts and scheduled tasks",
            "Audit user accounts and access permissions",
            "Deploy endpoint detection and response tools",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StatusThresholds;
    use crate::graph::{EdgeKind, EdgeSpec, NodeKind, NodeSpec, TopologyDescriptor};
    use gridlab_env::NodeLayer;

    fn star() -> GridSnapshot {
        let node = |id: &str| NodeSpec::new(id, id, NodeKind::Bus, NodeLayer::Physical);
        let topo = TopologyDescriptor::new(
            vec![node("hub"), node("a"), node("b"), node("c"), node("lonely")],
            vec![
                EdgeSpec::new("hub", "a", EdgeKind::Physical),
                EdgeSpec::new("b", "hub", EdgeKind::Physical),
                EdgeSpec::new("hub", "c", EdgeKind::Physical),
            ],
        );
        GridSnapshot::from_topology(&topo, &StatusThresholds::default()).unwrap()
    }

    #[test]
    fn test_affected_takes_first_two_neighbors() {
        let spec = AttackSpec::new(AttackType::FalseDataInjection, "hub");
        assert_eq!(spec.affected_nodes(&star()).unwrap(), vec!["hub", "a", "b"]);
    }

    #[test]
    fn test_affected_skips_parallel_edges() {
        let node = |id: &str| NodeSpec::new(id, id, NodeKind::Bus, NodeLayer::Physical);
        let topo = TopologyDescriptor::new(
            vec![node("hub"), node("a"), node("b")],
            vec![
                EdgeSpec::new("hub", "a", EdgeKind::Physical),
                EdgeSpec::new("a", "hub", EdgeKind::Physical),
                EdgeSpec::new("hub", "b", EdgeKind::Physical),
            ],
        );
        let snapshot = GridSnapshot::from_topology(&topo, &StatusThresholds::default()).unwrap();
        let spec = AttackSpec::new(AttackType::Ransomware, "hub");
        assert_eq!(spec.affected_nodes(&snapshot).unwrap(), vec!["hub", "a", "b"]);
    }

    #[test]
    fn test_affected_isolated_target() {
        let spec = AttackSpec::new(AttackType::Backdoor, "lonely");
        assert_eq!(spec.affected_nodes(&star()).unwrap(), vec!["lonely"]);
    }

    #[test]
    fn test_unknown_target_rejected() {
        let spec = AttackSpec::new(AttackType::Ransomware, "nowhere");
        assert!(matches!(spec.probe(&star()), Err(LabError::UnknownNode(_))));
    }

    #[test]
    fn test_every_attack_has_playbook() {
        for attack in AttackType::all() {
            assert_eq!(mitigations(attack).len(), 4);
        }
    }
}
