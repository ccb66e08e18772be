use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

pub const RESTART_SIGNALED: &str = "Restart Signaled";
pub const TERMINATED: &str = "Terminated";

/// Severity hint for notifiers; `None` means the event type has no success/failure reading.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
pub enum Criticality {
    Success,
    Failure,
    #[default]
    None,
}

impl Criticality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::None => "none",
        }
    }
}

fn unhealthy_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)unhealthy").expect("static regex is valid"))
}

pub fn classify(event_type: &str, details: &BTreeMap<String, String>) -> Criticality {
    match event_type {
        RESTART_SIGNALED => {
            let unhealthy = details
                .get("restart_reason")
                .is_some_and(|reason| unhealthy_pattern().is_match(reason));
            if unhealthy {
                Criticality::Failure
            } else {
                Criticality::Success
            }
        }
        TERMINATED => {
            let oom_killed = details.get("oom_killed").map(String::as_str) == Some("true");
            let clean_exit = details.get("exit_code").map(String::as_str) == Some("0");
            if clean_exit && !oom_killed {
                Criticality::Success
            } else {
                Criticality::Failure
            }
        }
        _ => Criticality::None,
    }
}
