pub mod config;
pub mod error;
pub mod gate;
pub mod notify;
pub mod posture;
pub mod register;
pub mod report;
pub mod summary;
pub mod triage;

pub use config::{GatePolicy, PolicyConfig};
pub use error::{ConfigError, GateError, NotifyError, RegisterError};
pub use gate::{evaluate, GateReport, GateViolation};
pub use register::{load_register, parse_register, Severity, Status, Stride, Threat, ThreatRegister};
