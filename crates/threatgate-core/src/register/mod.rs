mod model;

pub use model::{Severity, Status, Stride, Threat};

use crate::error::RegisterError;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// The loaded threat register: an ordered, immutable list of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatRegister {
    pub source_file: String,
    threats: Vec<Threat>,
}

impl ThreatRegister {
    pub fn new(source_file: String, threats: Vec<Threat>) -> Self {
        Self { source_file, threats }
    }

    pub fn threats(&self) -> &[Threat] {
        &self.threats
    }

    pub fn len(&self) -> usize {
        self.threats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threats.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Threat> {
        self.threats.iter().find(|t| t.id == id)
    }

    pub fn by_severity(&self, severity: Severity) -> impl Iterator<Item = &Threat> {
        self.threats.iter().filter(move |t| t.severity == severity)
    }

    pub fn by_status(&self, status: Status) -> impl Iterator<Item = &Threat> {
        self.threats.iter().filter(move |t| t.status == status)
    }

    pub fn by_stride(&self, stride: Stride) -> impl Iterator<Item = &Threat> {
        self.threats.iter().filter(move |t| t.stride == Some(stride))
    }
}

/// Load a threat register from a YAML (or JSON) file.
pub fn load_register(path: &Path) -> Result<ThreatRegister, RegisterError> {
    let content = std::fs::read_to_string(path).map_err(|source| RegisterError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_register(&content, path.to_string_lossy().to_string())
}

/// Parse register content.
///
/// Accepts either a top-level list of threat mappings or a mapping with a
/// `threats:` list. The first malformed record aborts the parse.
pub fn parse_register(content: &str, source_file: String) -> Result<ThreatRegister, RegisterError> {
    let yaml: Value = serde_yaml::from_str(content).map_err(|source| RegisterError::Yaml {
        source_file: source_file.clone(),
        source,
    })?;

    let entries: &[Value] = match &yaml {
        Value::Sequence(seq) => seq.as_slice(),
        Value::Mapping(map) => match map.get("threats") {
            Some(Value::Sequence(seq)) => seq.as_slice(),
            Some(Value::Null) => &[],
            Some(_) => {
                return Err(shape(&source_file, "'threats' must be a list"));
            }
            None => {
                return Err(shape(&source_file, "mapping has no 'threats' key"));
            }
        },
        // An empty file loads as null.
        Value::Null => &[],
        _ => {
            return Err(shape(
                &source_file,
                "expected a list of threats or a mapping with a 'threats' list",
            ));
        }
    };

    let mut threats = Vec::with_capacity(entries.len());
    let mut seen = HashSet::new();

    for (i, entry) in entries.iter().enumerate() {
        let index = i + 1;
        let map = entry.as_mapping().ok_or_else(|| {
            shape(&source_file, &format!("threat #{} is not a mapping", index))
        })?;

        let threat = parse_threat(map, index, &source_file)?;
        if !seen.insert(threat.id.clone()) {
            return Err(RegisterError::DuplicateId {
                source_file,
                id: threat.id,
            });
        }
        threats.push(threat);
    }

    debug!(source = %source_file, threats = threats.len(), "loaded threat register");
    Ok(ThreatRegister::new(source_file, threats))
}

fn parse_threat(map: &Mapping, index: usize, source_file: &str) -> Result<Threat, RegisterError> {
    let missing = |field| RegisterError::MissingField {
        source_file: source_file.to_string(),
        index,
        field,
    };

    let id = scalar(map, &["id"], index, source_file)?.ok_or_else(|| missing("id"))?;
    let id = id.trim().to_string();
    if id.is_empty() {
        return Err(RegisterError::EmptyId {
            source_file: source_file.to_string(),
            index,
        });
    }

    let invalid = |field, value: String, suggestion| RegisterError::InvalidValue {
        id: id.clone(),
        field,
        value,
        suggestion,
    };

    let raw_severity =
        scalar(map, &["severity", "risk"], index, source_file)?.ok_or_else(|| missing("severity"))?;
    let severity = Severity::parse(&raw_severity)
        .ok_or_else(|| invalid("severity", raw_severity.clone(), Severity::suggest(&raw_severity)))?;

    let raw_status = scalar(map, &["status"], index, source_file)?.ok_or_else(|| missing("status"))?;
    let status = Status::parse(&raw_status)
        .ok_or_else(|| invalid("status", raw_status.clone(), Status::suggest(&raw_status)))?;

    let stride = match scalar(map, &["stride", "category"], index, source_file)? {
        Some(raw) => Some(
            Stride::parse(&raw).ok_or_else(|| invalid("stride", raw.clone(), Stride::suggest(&raw)))?,
        ),
        None => None,
    };

    let title = scalar(map, &["title", "description"], index, source_file)?.unwrap_or_default();

    Ok(Threat {
        id,
        title: title.trim().to_string(),
        stride,
        severity,
        status,
        component: scalar(map, &["component"], index, source_file)?,
        owner: scalar(map, &["owner"], index, source_file)?,
        mitigation: scalar(map, &["mitigation"], index, source_file)?,
    })
}

/// Read the first non-null key of `keys` as a string. Numbers and booleans
/// are stringified; nested values are rejected.
fn scalar(
    map: &Mapping,
    keys: &[&str],
    index: usize,
    source_file: &str,
) -> Result<Option<String>, RegisterError> {
    let Some((key, value)) = keys
        .iter()
        .find_map(|k| map.get(*k).filter(|v| !v.is_null()).map(|v| (*k, v)))
    else {
        return Ok(None);
    };
    match value {
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        _ => Err(shape(
            source_file,
            &format!("field '{}' of threat #{} must be a scalar", key, index),
        )),
    }
}

fn shape(source_file: &str, message: &str) -> RegisterError {
    RegisterError::Shape {
        source_file: source_file.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<ThreatRegister, RegisterError> {
        parse_register(yaml, "threats.yml".to_string())
    }

    #[test]
    fn test_parse_top_level_list() {
        let register = parse(
            r#"
- id: T1
  title: SQL injection in search
  stride: Tampering
  severity: Critical
  status: Open
- id: T2
  title: Verbose error pages
  stride: I
  severity: low
  status: mitigated
"#,
        )
        .unwrap();

        assert_eq!(register.len(), 2);
        let t1 = register.get("T1").unwrap();
        assert_eq!(t1.severity, Severity::Critical);
        assert_eq!(t1.stride, Some(Stride::Tampering));
        assert_eq!(register.get("T2").unwrap().stride, Some(Stride::InformationDisclosure));
    }

    #[test]
    fn test_parse_wrapped_list_with_aliases() {
        let register = parse(
            r#"
threats:
  - id: TM-001
    title: Stored XSS in comments
    risk: High
    status: Open
"#,
        )
        .unwrap();

        let t = &register.threats()[0];
        assert_eq!(t.severity, Severity::High);
        assert_eq!(t.title, "Stored XSS in comments");
        assert_eq!(t.stride, None);
    }

    #[test]
    fn test_description_key_fills_title() {
        let register = parse("- {id: T1, description: Weak session ids, severity: Medium, status: Open}").unwrap();
        assert_eq!(register.threats()[0].title, "Weak session ids");
    }

    #[test]
    fn test_numeric_id_is_stringified() {
        let register = parse("- {id: 7, severity: Low, status: Open}").unwrap();
        assert_eq!(register.threats()[0].id, "7");
    }

    #[test]
    fn test_empty_register_is_valid() {
        assert!(parse("[]").unwrap().is_empty());
        assert!(parse("threats: []").unwrap().is_empty());
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_severity_is_malformed() {
        let err = parse("- {id: T1, severity: Severe, status: Open}").unwrap_err();
        match err {
            RegisterError::InvalidValue { id, field, value, .. } => {
                assert_eq!(id, "T1");
                assert_eq!(field, "severity");
                assert_eq!(value, "Severe");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_status_synonym_is_malformed() {
        let err = parse("- {id: T1, severity: Critical, status: resolved}").unwrap_err();
        assert!(matches!(
            err,
            RegisterError::InvalidValue { field: "status", ref value, .. } if value == "resolved"
        ));

        let err = parse("- {id: T2, severity: moderate, status: Open}").unwrap_err();
        assert!(matches!(
            err,
            RegisterError::InvalidValue { field: "severity", ref value, .. } if value == "moderate"
        ));
    }

    #[test]
    fn test_null_key_falls_back_to_alternate() {
        let register = parse("- {id: T1, severity: null, risk: High, status: Open}").unwrap();
        assert_eq!(register.threats()[0].severity, Severity::High);

        let register = parse("- {id: T2, title: ~, description: Open redirect, severity: Low, status: Open}").unwrap();
        assert_eq!(register.threats()[0].title, "Open redirect");
    }

    #[test]
    fn test_unknown_stride_is_malformed() {
        let err = parse("- {id: T1, stride: Phishing, severity: Low, status: Open}").unwrap_err();
        assert!(matches!(err, RegisterError::InvalidValue { field: "stride", .. }));
    }

    #[test]
    fn test_missing_fields() {
        assert!(matches!(
            parse("- {severity: Low, status: Open}").unwrap_err(),
            RegisterError::MissingField { field: "id", index: 1, .. }
        ));
        assert!(matches!(
            parse("- {id: T1, status: Open}").unwrap_err(),
            RegisterError::MissingField { field: "severity", .. }
        ));
        assert!(matches!(
            parse("- {id: T1, severity: High}").unwrap_err(),
            RegisterError::MissingField { field: "status", .. }
        ));
    }

    #[test]
    fn test_blank_id_rejected() {
        assert!(matches!(
            parse("- {id: '   ', severity: High, status: Open}").unwrap_err(),
            RegisterError::EmptyId { index: 1, .. }
        ));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = parse(
            "- {id: T1, severity: High, status: Open}\n- {id: T1, severity: Low, status: Open}",
        )
        .unwrap_err();
        assert!(matches!(err, RegisterError::DuplicateId { id, .. } if id == "T1"));
    }

    #[test]
    fn test_bad_shapes() {
        assert!(matches!(parse("just a string").unwrap_err(), RegisterError::Shape { .. }));
        assert!(matches!(parse("owners: []").unwrap_err(), RegisterError::Shape { .. }));
        assert!(matches!(parse("threats: nope").unwrap_err(), RegisterError::Shape { .. }));
        assert!(matches!(parse("- plain entry").unwrap_err(), RegisterError::Shape { .. }));
        assert!(matches!(
            parse("- {id: [a, b], severity: Low, status: Open}").unwrap_err(),
            RegisterError::Shape { .. }
        ));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(parse("- id: [unclosed").unwrap_err(), RegisterError::Yaml { .. }));
    }

    #[test]
    fn test_filters() {
        let register = parse(
            r#"
- {id: T1, stride: S, severity: High, status: Open}
- {id: T2, stride: S, severity: High, status: Mitigated}
- {id: T3, severity: Low, status: Accepted-Risk}
"#,
        )
        .unwrap();
        assert_eq!(register.by_severity(Severity::High).count(), 2);
        assert_eq!(register.by_status(Status::AcceptedRisk).count(), 1);
        assert_eq!(register.by_stride(Stride::Spoofing).count(), 2);
    }
}
