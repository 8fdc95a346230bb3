//! Logging System - Severity Escalation
//!
//! Every component logs through a `PhaseLogger`. Events go to `tracing`
//! and to a shared `LogTrail`. SEVERE and CRITICAL events return an error
//! that the caller must propagate; logging is the abort trigger.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{BuildError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Severe,
    Critical,
}

impl Severity {
    pub fn escalates(self) -> bool {
        self >= Severity::Severe
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogPhase {
    Config,
    Load,
    Modify,
    Output,
    Manager,
}

impl fmt::Display for LogPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogPhase::Config => "config",
            LogPhase::Load => "load",
            LogPhase::Modify => "modify",
            LogPhase::Output => "output",
            LogPhase::Manager => "manager",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub phase: LogPhase,
    pub severity: Severity,
    pub message: String,
}

/// Ordered record of every event logged during a run.
#[derive(Debug, Clone, Default)]
pub struct LogTrail {
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl LogTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logger(&self, phase: LogPhase) -> PhaseLogger {
        PhaseLogger {
            phase,
            trail: self.clone(),
        }
    }

    pub fn events(&self) -> Vec<LogEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count_at_least(&self, severity: Severity) -> usize {
        self.events().iter().filter(|e| e.severity >= severity).count()
    }

    fn push(&self, event: LogEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhaseLogger {
    phase: LogPhase,
    trail: LogTrail,
}

impl PhaseLogger {
    pub fn phase(&self) -> LogPhase {
        self.phase
    }

    /// Record an event. Returns `UnrecoverableState` for SEVERE/CRITICAL.
    pub fn log(&self, severity: Severity, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        match severity {
            Severity::Low => debug!(phase = %self.phase, "{}", message),
            Severity::Medium | Severity::High => {
                warn!(phase = %self.phase, severity = ?severity, "{}", message)
            }
            Severity::Severe | Severity::Critical => {
                error!(phase = %self.phase, severity = ?severity, "{}", message)
            }
        }

        self.trail.push(LogEvent {
            phase: self.phase,
            severity,
            message: message.clone(),
        });

        if severity.escalates() {
            return Err(BuildError::UnrecoverableState { severity, message });
        }
        Ok(())
    }

    /// LOW events can never escalate, so there is nothing to propagate.
    pub fn low(&self, message: impl Into<String>) {
        let _ = self.log(Severity::Low, message);
    }

    pub fn medium(&self, message: impl Into<String>) {
        let _ = self.log(Severity::Medium, message);
    }
}

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Install the fmt subscriber. Only the first call has any effect.
pub fn init_tracing(verbose: bool) {
    TRACING_INIT.get_or_init(|| {
        let level = if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        };
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}
