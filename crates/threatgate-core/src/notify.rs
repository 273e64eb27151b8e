use crate::error::NotifyError;
use crate::posture::{history_key, Insights};
use crate::triage::{ScanSeverity, SeverityCounts, Tool};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use tracing::info;

/// Environment variable holding the Slack incoming-webhook URL.
pub const WEBHOOK_ENV: &str = "SLACK_WEBHOOK_URL";

const COLOR_GOOD: &str = "#2ECC71";
const COLOR_WARNING: &str = "#F59E0B";
const COLOR_DANGER: &str = "#E74C3C";

/// Attachment colour for a posture score: green from 85, amber from 70.
pub fn attachment_color(score: u32) -> &'static str {
    if score >= 85 {
        COLOR_GOOD
    } else if score >= 70 {
        COLOR_WARNING
    } else {
        COLOR_DANGER
    }
}

/// Finding category a tool's results fall under.
pub fn category_for_tool(tool: Tool) -> &'static str {
    match tool {
        Tool::Trivy => "Outdated Dependencies / Container CVEs",
        Tool::PipAudit => "Outdated Dependencies",
        Tool::Bandit | Tool::Semgrep => "Static Code Issues",
        Tool::Zap => "Runtime / DAST Alerts",
    }
}

/// Score change between the last two history entries (0 with fewer than two).
pub fn score_delta(insights: &Insights) -> i64 {
    match insights.history.as_slice() {
        [.., prev, last] => last.score as i64 - prev.score as i64,
        _ => 0,
    }
}

/// The tool with the most findings and a short detail line.
///
/// Ties go to the first tool in [`Tool::ALL`] order. Trivy's detail names its
/// most frequent severity. `None` when no tool reported anything.
pub fn top_tool(insights: &Insights) -> Option<(Tool, String)> {
    let mut best: Option<(Tool, &SeverityCounts)> = None;
    for tool in Tool::ALL {
        let Some(counts) = insights.by_tool.get(history_key(tool)) else {
            continue;
        };
        if counts.total() > best.map_or(0, |(_, c)| c.total()) {
            best = Some((tool, counts));
        }
    }

    let (tool, counts) = best?;
    let detail = match tool {
        Tool::Trivy => format!("{} {}", counts.total(), title_case(dominant_severity(counts).symbol())),
        _ => format!("{} findings", counts.total()),
    };
    Some((tool, detail))
}

fn dominant_severity(counts: &SeverityCounts) -> ScanSeverity {
    let mut top = ScanSeverity::Critical;
    for severity in ScanSeverity::ORDER {
        if counts.get(severity) > counts.get(top) {
            top = severity;
        }
    }
    top
}

fn title_case(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Message lines of the notification, in Slack mrkdwn.
pub fn summary_lines(insights: &Insights) -> Vec<String> {
    let mut lines = vec![format!(
        ":bar_chart: *Security Posture:* {} / 100 ({:+} from last run)",
        insights.score,
        score_delta(insights)
    )];

    if let Some((tool, detail)) = top_tool(insights) {
        lines.push(format!(":jigsaw: *Most Findings Tool:* {} ({})", tool.label(), detail));
        lines.push(format!(":mag: *Top Category:* {}", category_for_tool(tool)));
    }

    let high_risk = insights.counts.critical + insights.counts.high;
    if high_risk > 0 {
        lines.push(format!(":warning: *High/Critical Findings:* {}", high_risk));
    }
    lines
}

/// Build the Slack incoming-webhook payload for a posture snapshot.
pub fn slack_payload(insights: &Insights, title: &str, now: DateTime<Utc>) -> Value {
    serde_json::json!({
        "attachments": [{
            "fallback": "Security posture summary",
            "color": attachment_color(insights.score),
            "title": title,
            "text": summary_lines(insights).join("\n"),
            "footer": format!("threatgate v{}", env!("CARGO_PKG_VERSION")),
            "ts": now.timestamp(),
        }]
    })
}

/// POST a payload to a webhook. Non-2xx responses are errors.
pub async fn post_webhook(url: &str, payload: &Value) -> Result<u16, NotifyError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let resp = client
        .post(url)
        .json(payload)
        .send()
        .await?
        .error_for_status()?;
    let status = resp.status().as_u16();
    info!(status, "notification sent");
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posture::{HistoryEntry, PostureGrade};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, day, 0, 0, 0).unwrap()
    }

    fn insights(score: u32, history: &[u32], by_tool: &[(&str, SeverityCounts)]) -> Insights {
        let by_tool: BTreeMap<String, SeverityCounts> =
            by_tool.iter().map(|(k, c)| (k.to_string(), *c)).collect();
        let mut counts = SeverityCounts::default();
        for c in by_tool.values() {
            counts.merge(c);
        }
        Insights {
            generated: at(2),
            counts,
            score,
            grade: PostureGrade::from_score(score),
            by_tool,
            history: history
                .iter()
                .enumerate()
                .map(|(i, s)| HistoryEntry {
                    ts: at(i as u32 + 1),
                    score: *s,
                })
                .collect(),
        }
    }

    #[test]
    fn test_color_thresholds() {
        assert_eq!(attachment_color(100), COLOR_GOOD);
        assert_eq!(attachment_color(85), COLOR_GOOD);
        assert_eq!(attachment_color(84), COLOR_WARNING);
        assert_eq!(attachment_color(70), COLOR_WARNING);
        assert_eq!(attachment_color(69), COLOR_DANGER);
        assert_eq!(attachment_color(0), COLOR_DANGER);
    }

    #[test]
    fn test_score_delta() {
        assert_eq!(score_delta(&insights(80, &[80], &[])), 0);
        assert_eq!(score_delta(&insights(72, &[90, 80, 72], &[])), -8);
        assert_eq!(score_delta(&insights(95, &[80, 95], &[])), 15);
    }

    #[test]
    fn test_top_tool_prefers_most_findings() {
        let i = insights(
            60,
            &[60],
            &[
                ("bandit", SeverityCounts { high: 2, ..Default::default() }),
                ("semgrep", SeverityCounts { medium: 5, ..Default::default() }),
            ],
        );
        let (tool, detail) = top_tool(&i).unwrap();
        assert_eq!(tool, Tool::Semgrep);
        assert_eq!(detail, "5 findings");
        assert_eq!(category_for_tool(tool), "Static Code Issues");
    }

    #[test]
    fn test_top_tool_trivy_names_dominant_severity() {
        let trivy = SeverityCounts {
            critical: 1,
            high: 2,
            medium: 4,
            ..Default::default()
        };
        let i = insights(40, &[40], &[("trivy", trivy), ("bandit", SeverityCounts { low: 1, ..Default::default() })]);
        let (tool, detail) = top_tool(&i).unwrap();
        assert_eq!(tool, Tool::Trivy);
        assert_eq!(detail, "7 Medium");
    }

    #[test]
    fn test_no_findings_has_no_tool_lines() {
        let i = insights(100, &[100], &[("bandit", SeverityCounts::default())]);
        assert!(top_tool(&i).is_none());
        assert_eq!(
            summary_lines(&i),
            vec![":bar_chart: *Security Posture:* 100 / 100 (+0 from last run)".to_string()]
        );
    }

    #[test]
    fn test_slack_payload() {
        let i = insights(
            66,
            &[76, 66],
            &[("pip_audit", SeverityCounts { critical: 1, high: 1, ..Default::default() })],
        );
        let payload = slack_payload(&i, "Security Summary", at(3));
        let attachment = &payload["attachments"][0];

        assert_eq!(attachment["color"], COLOR_DANGER);
        assert_eq!(attachment["title"], "Security Summary");
        assert_eq!(attachment["ts"], at(3).timestamp());
        let text = attachment["text"].as_str().unwrap();
        assert!(text.contains("66 / 100 (-10 from last run)"));
        assert!(text.contains("*Most Findings Tool:* pip-audit (2 findings)"));
        assert!(text.contains("*Top Category:* Outdated Dependencies"));
        assert!(text.contains("*High/Critical Findings:* 2"));
    }

    #[test]
    fn test_post_to_unreachable_webhook_fails() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let result = rt.block_on(post_webhook("http://127.0.0.1:9/hook", &serde_json::json!({})));
        assert!(matches!(result, Err(NotifyError::Http(_))));
    }
}
