use crate::triage::{ScanReport, ScanSeverity, SeverityCounts, Tool};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of past scores kept in `insights.json`.
pub const HISTORY_LIMIT: usize = 30;

/// Security posture score calculator.
///
/// Starts from 100 and subtracts a fixed penalty per finding:
/// - Critical: 15
/// - High: 10
/// - Medium: 3
/// - Low: 1
/// - Info: 0
#[derive(Debug, Clone)]
pub struct PostureWeights {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl Default for PostureWeights {
    fn default() -> Self {
        Self {
            critical: 15,
            high: 10,
            medium: 3,
            low: 1,
        }
    }
}

/// Posture grade categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostureGrade {
    Excellent,      // 90-100
    Good,           // 75-89
    #[serde(rename = "Needs Attention")]
    NeedsAttention, // 50-74
    Poor,           // 0-49
}

impl PostureGrade {
    pub fn from_score(score: u32) -> Self {
        if score >= 90 {
            PostureGrade::Excellent
        } else if score >= 75 {
            PostureGrade::Good
        } else if score >= 50 {
            PostureGrade::NeedsAttention
        } else {
            PostureGrade::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PostureGrade::Excellent => "Excellent",
            PostureGrade::Good => "Good",
            PostureGrade::NeedsAttention => "Needs Attention",
            PostureGrade::Poor => "Poor",
        }
    }
}

pub fn compute_score(counts: &SeverityCounts, weights: &PostureWeights) -> u32 {
    let penalty = counts.critical as u64 * weights.critical as u64
        + counts.high as u64 * weights.high as u64
        + counts.medium as u64 * weights.medium as u64
        + counts.low as u64 * weights.low as u64;
    100u64.saturating_sub(penalty) as u32
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: DateTime<Utc>,
    pub score: u32,
}

/// Contents of `insights.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insights {
    pub generated: DateTime<Utc>,
    pub counts: SeverityCounts,
    pub score: u32,
    pub grade: PostureGrade,
    pub by_tool: BTreeMap<String, SeverityCounts>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Severity of a finding for scoring purposes.
///
/// Follows each scanner's own vocabulary rather than the triage
/// normalization: Semgrep ERROR is a high, not a critical, and unknown
/// Trivy severities are informational. `None` means the finding is not
/// scored.
fn scoring_severity(tool: Tool, raw: Option<&str>) -> Option<ScanSeverity> {
    let raw = raw.map(|s| s.trim().to_uppercase()).unwrap_or_default();
    match tool {
        Tool::Bandit => match raw.as_str() {
            "HIGH" => Some(ScanSeverity::High),
            "MEDIUM" => Some(ScanSeverity::Medium),
            "LOW" => Some(ScanSeverity::Low),
            _ => None,
        },
        Tool::Semgrep => match raw.as_str() {
            "ERROR" => Some(ScanSeverity::High),
            "WARNING" => Some(ScanSeverity::Medium),
            "INFO" => Some(ScanSeverity::Low),
            _ => None,
        },
        Tool::PipAudit => Some(match raw.as_str() {
            "CRITICAL" => ScanSeverity::Critical,
            "HIGH" => ScanSeverity::High,
            "LOW" => ScanSeverity::Low,
            _ => ScanSeverity::Medium,
        }),
        Tool::Trivy => Some(match raw.as_str() {
            "CRITICAL" => ScanSeverity::Critical,
            "HIGH" => ScanSeverity::High,
            "MEDIUM" => ScanSeverity::Medium,
            "LOW" => ScanSeverity::Low,
            _ => ScanSeverity::Info,
        }),
        Tool::Zap => None,
    }
}

pub(crate) fn history_key(tool: Tool) -> &'static str {
    match tool {
        Tool::Bandit => "bandit",
        Tool::Semgrep => "semgrep",
        Tool::PipAudit => "pip_audit",
        Tool::Trivy => "trivy",
        Tool::Zap => "zap",
    }
}

/// Append the new score and keep the most recent [`HISTORY_LIMIT`] entries.
pub fn merge_history(previous: Option<&Insights>, score: u32, now: DateTime<Utc>) -> Vec<HistoryEntry> {
    let mut history = previous.map(|p| p.history.clone()).unwrap_or_default();
    history.push(HistoryEntry { ts: now, score });
    if history.len() > HISTORY_LIMIT {
        history.drain(..history.len() - HISTORY_LIMIT);
    }
    history
}

/// Score the scanner reports. ZAP is not part of the posture score.
pub fn compute_insights(
    reports: &[ScanReport],
    previous: Option<&Insights>,
    now: DateTime<Utc>,
) -> Insights {
    let mut by_tool = BTreeMap::new();
    let mut counts = SeverityCounts::default();

    for report in reports.iter().filter(|r| r.tool != Tool::Zap) {
        let mut tool_counts = SeverityCounts::default();
        for finding in &report.findings {
            if let Some(sev) = scoring_severity(report.tool, finding.severity.as_deref()) {
                tool_counts.add(sev);
            }
        }
        counts.merge(&tool_counts);
        by_tool.insert(history_key(report.tool).to_string(), tool_counts);
    }

    let score = compute_score(&counts, &PostureWeights::default());

    Insights {
        generated: now,
        counts,
        score,
        grade: PostureGrade::from_score(score),
        by_tool,
        history: merge_history(previous, score, now),
    }
}
