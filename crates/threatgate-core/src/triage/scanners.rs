//! Readers for the report files emitted by external scanners.
//!
//! Each reader walks the scanner's JSON (or HTML, for ZAP) and yields one
//! [`RawFinding`] per issue with the severity string exactly as the scanner
//! wrote it. Mapping that string onto a common scale is left to the caller,
//! since triage and posture scoring map it differently.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

/// A scanner whose report threatgate knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tool {
    Bandit,
    Semgrep,
    PipAudit,
    Trivy,
    Zap,
}

impl Tool {
    pub const ALL: [Tool; 5] = [Tool::Bandit, Tool::Semgrep, Tool::PipAudit, Tool::Trivy, Tool::Zap];

    pub fn label(&self) -> &'static str {
        match self {
            Tool::Bandit => "Bandit",
            Tool::Semgrep => "Semgrep",
            Tool::PipAudit => "pip-audit",
            Tool::Trivy => "Trivy",
            Tool::Zap => "ZAP",
        }
    }

    /// Report file name the scanner writes in CI.
    pub fn report_file(&self) -> &'static str {
        match self {
            Tool::Bandit => "bandit-report.json",
            Tool::Semgrep => "semgrep-report.json",
            Tool::PipAudit => "pip-audit-report.json",
            Tool::Trivy => "trivy-report.json",
            Tool::Zap => "report_html.html",
        }
    }
}

/// One issue reported by a scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFinding {
    /// Severity as written by the scanner, if it wrote one.
    pub severity: Option<String>,
    /// Short `id: message` text used in highlight lists.
    pub label: String,
}

/// Everything read from one scanner's report file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub tool: Tool,
    /// False when the file was absent or unreadable.
    pub found: bool,
    pub findings: Vec<RawFinding>,
}

impl ScanReport {
    pub fn missing(tool: Tool) -> Self {
        Self {
            tool,
            found: false,
            findings: Vec::new(),
        }
    }

    /// Source description as shown in summaries.
    pub fn source(&self) -> String {
        if self.found {
            self.tool.report_file().to_string()
        } else {
            format!("{} (not found)", self.tool.report_file())
        }
    }

    /// Count findings whose raw severity equals `raw` (case-insensitive).
    pub fn raw_count(&self, raw: &str) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity.as_deref().is_some_and(|s| s.trim().eq_ignore_ascii_case(raw)))
            .count()
    }
}

/// Read every known scanner report under `dir`. Absent reports come back with
/// `found = false`.
pub fn load_all(dir: &Path) -> Vec<ScanReport> {
    Tool::ALL.iter().map(|tool| load_scan(dir, *tool)).collect()
}

pub fn load_scan(dir: &Path, tool: Tool) -> ScanReport {
    let path = dir.join(tool.report_file());
    // ZAP reports embed raw response bodies, so undecodable bytes are replaced.
    let content = match std::fs::read(&path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "scanner report not available");
            return ScanReport::missing(tool);
        }
    };

    let findings = if tool == Tool::Zap {
        Some(parse_zap_html(&content))
    } else {
        match serde_json::from_str::<Value>(&content) {
            Ok(json) => Some(parse_json(tool, &json)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unparsable scanner report");
                None
            }
        }
    };

    match findings {
        Some(findings) => {
            debug!(tool = tool.label(), findings = findings.len(), "read scanner report");
            ScanReport {
                tool,
                found: true,
                findings,
            }
        }
        None => ScanReport::missing(tool),
    }
}

/// Dispatch a parsed JSON report to the reader for `tool`.
pub fn parse_json(tool: Tool, json: &Value) -> Vec<RawFinding> {
    match tool {
        Tool::Bandit => parse_bandit(json),
        Tool::Semgrep => parse_semgrep(json),
        Tool::PipAudit => parse_pip_audit(json),
        Tool::Trivy => parse_trivy(json),
        Tool::Zap => Vec::new(),
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|v| v.as_str())
}

fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[])
}

/// `results[].issue_severity`
pub fn parse_bandit(json: &Value) -> Vec<RawFinding> {
    array(json, "results")
        .iter()
        .map(|item| RawFinding {
            severity: str_field(item, "issue_severity").map(String::from),
            label: format!(
                "{}: {}",
                str_field(item, "test_id").unwrap_or(""),
                str_field(item, "issue_text").unwrap_or("").trim()
            ),
        })
        .collect()
}

/// `results[].extra.severity`, falling back to `results[].severity`.
pub fn parse_semgrep(json: &Value) -> Vec<RawFinding> {
    array(json, "results")
        .iter()
        .map(|item| {
            let extra = item.get("extra");
            let severity = extra
                .and_then(|e| str_field(e, "severity"))
                .or_else(|| str_field(item, "severity"))
                .map(String::from);
            RawFinding {
                severity,
                label: format!(
                    "{}: {}",
                    str_field(item, "check_id").unwrap_or(""),
                    extra.and_then(|e| str_field(e, "message")).unwrap_or("")
                ),
            }
        })
        .collect()
}

/// Either a list of packages or `{"dependencies": [...]}`; each package lists
/// its advisories under `vulns` or `vulnerabilities`.
pub fn parse_pip_audit(json: &Value) -> Vec<RawFinding> {
    let packages: &[Value] = match json {
        Value::Array(list) => list,
        Value::Object(_) => array(json, "dependencies"),
        _ => &[],
    };

    packages
        .iter()
        .flat_map(|pkg| {
            let vulns = array(pkg, "vulns");
            if vulns.is_empty() {
                array(pkg, "vulnerabilities")
            } else {
                vulns
            }
        })
        .map(|v| RawFinding {
            severity: str_field(v, "severity")
                .or_else(|| str_field(v, "severity_name"))
                .map(String::from),
            label: format!(
                "{}: {}",
                str_field(v, "id").unwrap_or("VULN"),
                str_field(v, "advisory")
                    .or_else(|| str_field(v, "description"))
                    .unwrap_or("")
                    .trim()
            ),
        })
        .collect()
}

/// `Results[].Vulnerabilities[].Severity`
pub fn parse_trivy(json: &Value) -> Vec<RawFinding> {
    array(json, "Results")
        .iter()
        .flat_map(|result| array(result, "Vulnerabilities"))
        .map(|v| RawFinding {
            severity: str_field(v, "Severity").map(String::from),
            label: format!(
                "{} in {}",
                str_field(v, "VulnerabilityID").unwrap_or(""),
                str_field(v, "PkgName").unwrap_or("")
            ),
        })
        .collect()
}

/// ZAP's HTML report only yields one finding per risk level that appears.
pub fn parse_zap_html(content: &str) -> Vec<RawFinding> {
    let re = Regex::new(r"RISK LEVEL:\s*(HIGH|MEDIUM|LOW)").unwrap();
    let upper = content.to_uppercase();
    let present: Vec<&str> = re
        .captures_iter(&upper)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    ["HIGH", "MEDIUM", "LOW"]
        .into_iter()
        .filter(|level| present.contains(level))
        .map(|level| RawFinding {
            severity: Some(level.to_string()),
            label: format!("risk level {}", level.to_lowercase()),
        })
        .collect()
}
