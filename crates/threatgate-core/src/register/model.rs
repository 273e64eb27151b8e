use serde::{Deserialize, Serialize};

/// Risk level attached to a threat record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Parse a severity as written in a register (`critical`, `CRITICAL`, ...).
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize(raw).as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn suggest(raw: &str) -> Option<String> {
        suggest(raw, Self::ALL.iter().map(|s| s.label()))
    }
}

/// Mitigation status of a threat record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Open,
    Mitigated,
    #[serde(rename = "Accepted-Risk")]
    AcceptedRisk,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Open, Status::Mitigated, Status::AcceptedRisk];

    pub fn label(&self) -> &'static str {
        match self {
            Status::Open => "Open",
            Status::Mitigated => "Mitigated",
            Status::AcceptedRisk => "Accepted-Risk",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize(raw).as_str() {
            "open" => Some(Status::Open),
            "mitigated" => Some(Status::Mitigated),
            "acceptedrisk" | "accepted" => Some(Status::AcceptedRisk),
            _ => None,
        }
    }

    pub fn suggest(raw: &str) -> Option<String> {
        suggest(raw, Self::ALL.iter().map(|s| s.label()))
    }
}

/// STRIDE threat category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stride {
    Spoofing,
    Tampering,
    Repudiation,
    #[serde(rename = "Information Disclosure")]
    InformationDisclosure,
    #[serde(rename = "Denial of Service")]
    DenialOfService,
    #[serde(rename = "Elevation of Privilege")]
    ElevationOfPrivilege,
}

impl Stride {
    pub const ALL: [Stride; 6] = [
        Stride::Spoofing,
        Stride::Tampering,
        Stride::Repudiation,
        Stride::InformationDisclosure,
        Stride::DenialOfService,
        Stride::ElevationOfPrivilege,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Stride::Spoofing => "Spoofing",
            Stride::Tampering => "Tampering",
            Stride::Repudiation => "Repudiation",
            Stride::InformationDisclosure => "Information Disclosure",
            Stride::DenialOfService => "Denial of Service",
            Stride::ElevationOfPrivilege => "Elevation of Privilege",
        }
    }

    /// The single STRIDE letter.
    pub fn letter(&self) -> char {
        match self {
            Stride::Spoofing => 'S',
            Stride::Tampering => 'T',
            Stride::Repudiation => 'R',
            Stride::InformationDisclosure => 'I',
            Stride::DenialOfService => 'D',
            Stride::ElevationOfPrivilege => 'E',
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize(raw).as_str() {
            "s" | "spoofing" => Some(Stride::Spoofing),
            "t" | "tampering" => Some(Stride::Tampering),
            "r" | "repudiation" => Some(Stride::Repudiation),
            "i" | "informationdisclosure" => Some(Stride::InformationDisclosure),
            "d" | "denialofservice" => Some(Stride::DenialOfService),
            "e" | "elevationofprivilege" => Some(Stride::ElevationOfPrivilege),
            _ => None,
        }
    }

    pub fn suggest(raw: &str) -> Option<String> {
        suggest(raw, Self::ALL.iter().map(|s| s.label()))
    }
}

/// A single entry of the threat register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threat {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stride: Option<Stride>,
    pub severity: Severity,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<String>,
}

impl Threat {
    pub fn is_open(&self) -> bool {
        self.status == Status::Open
    }
}

/// Lowercase and drop separators so `Accepted-Risk`, `accepted_risk` and
/// `Accepted Risk` compare equal.
fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(|c| c.to_lowercase())
        .collect()
}

fn suggest<'a>(raw: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    let needle = normalize(raw);
    let mut best: Option<(&str, usize)> = None;
    for candidate in candidates {
        let dist = strsim::damerau_levenshtein(&needle, &normalize(candidate));
        if dist > 0 && dist <= 2 && best.map_or(true, |(_, d)| dist < d) {
            best = Some((candidate, dist));
        }
    }
    best.map(|(c, _)| c.to_string())
}
