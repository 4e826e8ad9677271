use std::sync::LazyLock;

use regex::Regex;

use crate::models::Measurement;

/// `severity >= 8`, `severity>5`, `severity == 10`, ...
static SEVERITY_ATOM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^severity\s*(>=|<=|==|=|>|<)\s*(-?\d+)$").unwrap());

/// `worsening`, `worsening trend`, `trend is worsening`
static WORSENING_ATOM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:worsening(?:\s+trend)?|trend\s+is\s+worsening)$").unwrap());

static OR_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+or\s+").unwrap());

static AND_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+and\s+").unwrap());

/// Result of evaluating one criterion against a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CriterionOutcome {
    pub satisfied: bool,
    /// At least one atom could not be evaluated (and counted as false).
    pub unevaluable: bool,
}

/// Evaluate a criterion: clauses joined by `or`, each a conjunction of atoms
/// joined by `and`.
pub fn evaluate(criterion: &str, measurement: &Measurement) -> CriterionOutcome {
    let text = criterion.trim().to_lowercase();
    let mut outcome = CriterionOutcome::default();
    if text.is_empty() {
        return outcome;
    }

    for clause in OR_SPLIT.split(&text) {
        let mut clause_holds = true;
        for atom in AND_SPLIT.split(clause) {
            match evaluate_atom(atom, measurement) {
                Some(holds) => clause_holds &= holds,
                None => {
                    tracing::debug!(atom = %atom.trim(), "Unevaluable protocol criterion atom");
                    outcome.unevaluable = true;
                    clause_holds = false;
                }
            }
        }
        outcome.satisfied |= clause_holds;
    }
    outcome
}

/// `None` when the atom is outside the recognised language.
fn evaluate_atom(atom: &str, measurement: &Measurement) -> Option<bool> {
    let atom = atom.trim().trim_end_matches(['.', ',', ';']).trim();

    if let Some(caps) = SEVERITY_ATOM.captures(atom) {
        let bound: i32 = caps[2].parse().ok()?;
        let s = measurement.severity;
        return Some(match &caps[1] {
            ">=" => s >= bound,
            ">" => s > bound,
            "<=" => s <= bound,
            "<" => s < bound,
            _ => s == bound,
        });
    }

    if WORSENING_ATOM.is_match(atom) {
        return Some(measurement.is_worsening());
    }

    None
}
