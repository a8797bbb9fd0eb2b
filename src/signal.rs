// src/signal.rs

//! Lifecycle signals a resource broadcasts to its dependents.

use std::fmt;
use std::str::FromStr;

/// Outcome events emitted by the scheduler on behalf of a resource.
///
/// Per resource and per run the emission order is fixed:
///
/// - met dependencies: `Skipped` or `Materialized`, then `Evaluated`, then
///   `Finished`
/// - unmet dependencies: `Unevaluated`, then `Finished`
///
/// A resource whose run is canceled emits nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Signal {
    /// Always the last signal. Emitted regardless of what the evaluation
    /// entailed, so depending on it means "wait until upstream is done".
    Finished,
    /// The resource's dependencies finished without emitting a signal it
    /// required, so it was never evaluated.
    Unevaluated,
    /// The resource was either skipped or materialized.
    Evaluated,
    /// The skip-check reported the resource as already in its desired state.
    Skipped,
    /// The resource's materialization ran and succeeded.
    Materialized,
}

impl Signal {
    /// Every signal, in declaration order.
    pub const ALL: [Signal; 5] = [
        Signal::Finished,
        Signal::Unevaluated,
        Signal::Evaluated,
        Signal::Skipped,
        Signal::Materialized,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Finished => "Finished",
            Signal::Unevaluated => "Unevaluated",
            Signal::Evaluated => "Evaluated",
            Signal::Skipped => "Skipped",
            Signal::Materialized => "Materialized",
        }
    }

    /// Whether this signal ends the emission sequence of a resource.
    pub fn is_terminal(self) -> bool {
        matches!(self, Signal::Finished)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Signal::ALL
            .into_iter()
            .find(|sig| sig.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                format!(
                    "invalid signal: {wanted} (expected one of Finished, Unevaluated, Evaluated, Skipped, Materialized)"
                )
            })
    }
}

/// Render a list of signals as `A, B, C` for log lines.
pub(crate) fn join_signals(signals: &[Signal]) -> String {
    signals
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("materialized".parse::<Signal>(), Ok(Signal::Materialized));
        assert_eq!(" Finished ".parse::<Signal>(), Ok(Signal::Finished));
        assert!("done".parse::<Signal>().is_err());
    }

    #[test]
    fn only_finished_is_terminal() {
        let terminal: Vec<_> = Signal::ALL.into_iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![Signal::Finished]);
    }

    #[test]
    fn joins_for_logging() {
        assert_eq!(
            join_signals(&[Signal::Skipped, Signal::Evaluated]),
            "Skipped, Evaluated"
        );
    }
}
