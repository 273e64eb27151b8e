use crate::config::GatePolicy;
use crate::error::GateError;
use crate::register::{Severity, Status, Stride, Threat, ThreatRegister};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// A record that blocks the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateViolation {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stride: Option<Stride>,
}

impl From<&Threat> for GateViolation {
    fn from(threat: &Threat) -> Self {
        Self {
            id: threat.id.clone(),
            title: threat.title.clone(),
            severity: threat.severity,
            status: threat.status,
            stride: threat.stride,
        }
    }
}

/// Result of evaluating one register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    pub source_file: String,
    pub total_threats: usize,
    /// Open records per severity, regardless of whether they block.
    pub open_by_severity: BTreeMap<Severity, usize>,
    pub violations: Vec<GateViolation>,
    pub passed: bool,
}

impl GateReport {
    /// Identifiers of the blocking records, in register order.
    pub fn offending_ids(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.id.clone()).collect()
    }

    pub fn open_count(&self, severity: Severity) -> usize {
        self.open_by_severity.get(&severity).copied().unwrap_or(0)
    }

    pub fn into_result(self) -> Result<GateReport, GateError> {
        if self.passed {
            Ok(self)
        } else {
            Err(GateError::PolicyViolation {
                offending: self.offending_ids(),
                source_file: self.source_file,
            })
        }
    }
}

/// Check a threat register against a gate policy.
pub fn evaluate(register: &ThreatRegister, policy: &GatePolicy) -> GateReport {
    let violations: Vec<GateViolation> = register
        .threats()
        .iter()
        .filter(|t| policy.blocks(t))
        .map(GateViolation::from)
        .collect();

    let mut open_by_severity = BTreeMap::new();
    for threat in register.by_status(Status::Open) {
        *open_by_severity.entry(threat.severity).or_insert(0) += 1;
    }

    let passed = violations.is_empty();
    info!(
        source = %register.source_file,
        threats = register.len(),
        violations = violations.len(),
        passed,
        "evaluated threat register"
    );

    GateReport {
        source_file: register.source_file.clone(),
        total_threats: register.len(),
        open_by_severity,
        violations,
        passed,
    }
}
