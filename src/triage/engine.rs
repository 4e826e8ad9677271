use std::collections::BTreeSet;
use std::time::Instant;

use crate::config::TriagePolicy;
use crate::events::SymptomTrend;
use crate::models::enums::TriageRoute;
use crate::models::{Measurement, Protocol};
use crate::protocols::criteria;

use super::messages::MessageTemplates;
use super::types::Decision;
use super::{
    TriageError, FLAG_DEFAULT_POLICY, FLAG_PROTOCOL_RED, FLAG_PROTOCOL_YELLOW,
    FLAG_RAPID_PROGRESSION, FLAG_UNEVALUABLE_CRITERION,
};

/// Pure decision function: never reads or writes any store.
#[derive(Debug, Clone, Default)]
pub struct TriageEngine {
    policy: TriagePolicy,
}

/// Route, trigger and confidence before summaries are rendered.
struct Verdict {
    route: TriageRoute,
    trigger: Option<String>,
    confidence: f64,
    basis: String,
}

impl TriageEngine {
    pub fn new(policy: TriagePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TriagePolicy {
        &self.policy
    }

    /// Classify the current measurement.
    ///
    /// Protocol thresholds are checked first (red, then yellow), then rapid
    /// progression over `recent_window`, then the default policy when no
    /// protocol applies. With no protocol, a default-policy red outranks a
    /// rapid-progression yellow.
    pub fn decide(
        &self,
        patient_id: &str,
        chief_complaint: Option<&str>,
        current: &Measurement,
        protocol: Option<&Protocol>,
        recent_window: &SymptomTrend,
    ) -> Result<Decision, TriageError> {
        current.validate()?;
        let start = Instant::now();

        let mut flags = BTreeSet::new();
        let rapid = self.rapid_progression(recent_window);

        let verdict = match protocol {
            Some(protocol) => self.protocol_verdict(protocol, current, rapid, &mut flags),
            None => self.default_verdict(current, rapid, &mut flags),
        };

        let decision = Decision {
            route: verdict.route,
            patient_summary: MessageTemplates::patient_summary(
                verdict.route,
                &current.name,
                current.severity,
            ),
            clinician_summary: MessageTemplates::clinician_summary(
                verdict.route,
                patient_id,
                &current.name,
                current.severity,
                &verdict.basis,
                &flags,
            ),
            safety_flags: flags,
            escalation_trigger: verdict.trigger,
            confidence: verdict.confidence,
            chief_complaint: chief_complaint.map(str::to_string),
            symptom: current.name.clone(),
            severity: current.severity,
        };

        tracing::info!(
            patient_id = %patient_id,
            symptom = %decision.symptom,
            severity = decision.severity,
            route = decision.route.as_str(),
            confidence = decision.confidence,
            protocol = protocol.is_some(),
            processing_us = start.elapsed().as_micros() as u64,
            "Triage decision"
        );

        Ok(decision)
    }

    fn protocol_verdict(
        &self,
        protocol: &Protocol,
        current: &Measurement,
        rapid: Option<String>,
        flags: &mut BTreeSet<String>,
    ) -> Verdict {
        let red = criteria::evaluate(&protocol.criteria.red, current);
        let yellow = criteria::evaluate(&protocol.criteria.yellow, current);
        if red.unevaluable || yellow.unevaluable {
            flags.insert(FLAG_UNEVALUABLE_CRITERION.to_string());
        }

        let confidence = self.policy.confidence_protocol;
        if red.satisfied {
            flags.insert(FLAG_PROTOCOL_RED.to_string());
            return Verdict {
                route: TriageRoute::Red,
                trigger: Some(protocol.criteria.red.clone()),
                confidence,
                basis: format!("protocol red criterion \"{}\"", protocol.criteria.red),
            };
        }
        if yellow.satisfied {
            flags.insert(FLAG_PROTOCOL_YELLOW.to_string());
            return Verdict {
                route: TriageRoute::Yellow,
                trigger: Some(protocol.criteria.yellow.clone()),
                confidence,
                basis: format!("protocol yellow criterion \"{}\"", protocol.criteria.yellow),
            };
        }
        if let Some(rise) = rapid {
            flags.insert(FLAG_RAPID_PROGRESSION.to_string());
            return Verdict {
                route: TriageRoute::Yellow,
                basis: rise.clone(),
                trigger: Some(rise),
                confidence: self.policy.confidence_acceleration,
            };
        }
        Verdict {
            route: TriageRoute::Green,
            trigger: None,
            confidence,
            basis: "no protocol criterion met".to_string(),
        }
    }

    fn default_verdict(
        &self,
        current: &Measurement,
        rapid: Option<String>,
        flags: &mut BTreeSet<String>,
    ) -> Verdict {
        let (route, threshold) = self.default_route(current.severity);

        match rapid {
            Some(rise) if route < TriageRoute::Red => {
                flags.insert(FLAG_RAPID_PROGRESSION.to_string());
                Verdict {
                    route: TriageRoute::Yellow,
                    basis: rise.clone(),
                    trigger: Some(rise),
                    confidence: self.policy.confidence_acceleration,
                }
            }
            rapid => {
                if rapid.is_some() {
                    flags.insert(FLAG_RAPID_PROGRESSION.to_string());
                }
                flags.insert(FLAG_DEFAULT_POLICY.to_string());
                let trigger = threshold
                    .map(|t| MessageTemplates::default_threshold(route, current.severity, t));
                Verdict {
                    route,
                    basis: trigger
                        .clone()
                        .unwrap_or_else(|| "below default thresholds".to_string()),
                    trigger,
                    confidence: self.policy.confidence_default,
                }
            }
        }
    }

    /// Default-policy route plus the threshold that was crossed, if any.
    fn default_route(&self, severity: i32) -> (TriageRoute, Option<i32>) {
        if severity >= self.policy.default_red_threshold {
            (TriageRoute::Red, Some(self.policy.default_red_threshold))
        } else if severity >= self.policy.default_yellow_threshold {
            (TriageRoute::Yellow, Some(self.policy.default_yellow_threshold))
        } else {
            (TriageRoute::Green, None)
        }
    }

    /// Rapid progression across the window: a rise larger than the margin,
    /// or a rise crossing the boundary from below.
    fn rapid_progression(&self, window: &SymptomTrend) -> Option<String> {
        if window.len() < 2 {
            return None;
        }
        let first = window.earliest()?.severity;
        let last = window.latest()?.severity;

        let large_rise = last - first > self.policy.acceleration_margin;
        let boundary = self.policy.acceleration_boundary;
        let crossed = first < boundary && last >= boundary && last > first;

        if large_rise || crossed {
            tracing::debug!(symptom = %window.symptom, from = first, to = last, "Rapid symptom progression");
            Some(MessageTemplates::rapid_progression(
                &window.symptom,
                first,
                last,
                window.len(),
            ))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::events::TrendPoint;
    use crate::models::enums::Trend;

    fn engine() -> TriageEngine {
        TriageEngine::new(TriagePolicy::default())
    }

    fn window(severities: &[i32]) -> SymptomTrend {
        let now = Utc::now();
        let n = severities.len() as i64;
        let points = severities
            .iter()
            .enumerate()
            .map(|(i, s)| TrendPoint {
                timestamp: now - Duration::hours((n - i as i64) * 6),
                severity: *s,
            })
            .collect();
        SymptomTrend::from_points("Headache", points)
    }

    fn headache_protocol() -> Protocol {
        Protocol::new("p1", Some("Headache"), "severity >= 8", "severity >= 4")
    }

    #[test]
    fn protocol_thresholds_partition_the_scale() {
        let engine = engine();
        let protocol = headache_protocol();
        for s in 0..=10 {
            let d = engine
                .decide(
                    "p1",
                    Some("Headache"),
                    &Measurement::new("Headache", s, None),
                    Some(&protocol),
                    &SymptomTrend::empty("Headache"),
                )
                .unwrap();
            let expected = if s >= 8 {
                TriageRoute::Red
            } else if s >= 4 {
                TriageRoute::Yellow
            } else {
                TriageRoute::Green
            };
            assert_eq!(d.route, expected, "severity {s}");
            assert_eq!(d.confidence, 0.95);
        }
    }

    #[test]
    fn protocol_red_carries_trigger_and_flag() {
        let d = engine()
            .decide(
                "p1",
                Some("Headache"),
                &Measurement::new("Headache", 8, Some(Trend::Worsening)),
                Some(&Protocol::new("p1", Some("Headache"), "severity>=8", "severity>=4")),
                &SymptomTrend::empty("Headache"),
            )
            .unwrap();
        assert_eq!(d.route, TriageRoute::Red);
        assert_eq!(d.escalation_trigger.as_deref(), Some("severity>=8"));
        assert!(d.has_flag(FLAG_PROTOCOL_RED));
        assert_eq!(d.confidence, 0.95);
    }

    #[test]
    fn protocol_green_has_no_trigger() {
        let d = engine()
            .decide(
                "p1",
                Some("Headache"),
                &Measurement::new("Headache", 2, None),
                Some(&headache_protocol()),
                &SymptomTrend::empty("Headache"),
            )
            .unwrap();
        assert_eq!(d.route, TriageRoute::Green);
        assert!(d.escalation_trigger.is_none());
        assert!(d.safety_flags.is_empty());
        assert_eq!(d.confidence, 0.95);
    }

    #[test]
    fn rapid_rise_without_protocol_is_yellow() {
        let d = engine()
            .decide(
                "p1",
                None,
                &Measurement::new("Headache", 7, None),
                None,
                &window(&[2, 7]),
            )
            .unwrap();
        assert_eq!(d.route, TriageRoute::Yellow);
        assert!(d.has_flag(FLAG_RAPID_PROGRESSION));
        assert!(!d.has_flag(FLAG_DEFAULT_POLICY));
        assert_eq!(d.confidence, 0.75);
        assert!(d.escalation_trigger.unwrap().contains("from 2 to 7"));
    }

    #[test]
    fn boundary_crossing_counts_as_rapid() {
        // Rise of 2 is under the margin but crosses 7 from below
        let d = engine()
            .decide("p1", None, &Measurement::new("Headache", 3, None), None, &window(&[5, 7]))
            .unwrap();
        assert_eq!(d.route, TriageRoute::Yellow);
        assert!(d.has_flag(FLAG_RAPID_PROGRESSION));
    }

    #[test]
    fn small_rise_is_not_rapid() {
        let d = engine()
            .decide("p1", None, &Measurement::new("Headache", 2, None), None, &window(&[1, 3]))
            .unwrap();
        assert_eq!(d.route, TriageRoute::Green);
        assert!(d.has_flag(FLAG_DEFAULT_POLICY));
    }

    #[test]
    fn single_point_window_never_accelerates() {
        let d = engine()
            .decide("p1", None, &Measurement::new("Headache", 2, None), None, &window(&[9]))
            .unwrap();
        assert!(!d.has_flag(FLAG_RAPID_PROGRESSION));
    }

    #[test]
    fn default_policy_red_at_nine() {
        let d = engine()
            .decide(
                "p1",
                None,
                &Measurement::new("Fatigue", 9, None),
                None,
                &SymptomTrend::empty("Fatigue"),
            )
            .unwrap();
        assert_eq!(d.route, TriageRoute::Red);
        assert_eq!(d.confidence, 0.5);
        assert!(d.has_flag(FLAG_DEFAULT_POLICY));
        assert!(d.escalation_trigger.is_some());
    }

    #[test]
    fn default_policy_bands() {
        let engine = engine();
        let route = |s| {
            engine
                .decide("p1", None, &Measurement::new("Fatigue", s, None), None, &SymptomTrend::empty("Fatigue"))
                .unwrap()
                .route
        };
        assert_eq!(route(3), TriageRoute::Green);
        assert_eq!(route(4), TriageRoute::Yellow);
        assert_eq!(route(7), TriageRoute::Yellow);
        assert_eq!(route(8), TriageRoute::Red);
    }

    #[test]
    fn default_red_outranks_rapid_yellow() {
        let d = engine()
            .decide("p1", None, &Measurement::new("Headache", 9, None), None, &window(&[2, 9]))
            .unwrap();
        assert_eq!(d.route, TriageRoute::Red);
        assert!(d.has_flag(FLAG_RAPID_PROGRESSION));
        assert!(d.has_flag(FLAG_DEFAULT_POLICY));
        assert_eq!(d.confidence, 0.5);
    }

    #[test]
    fn protocol_threshold_outranks_rapid_progression() {
        let d = engine()
            .decide(
                "p1",
                Some("Headache"),
                &Measurement::new("Headache", 9, None),
                Some(&headache_protocol()),
                &window(&[1, 9]),
            )
            .unwrap();
        assert_eq!(d.route, TriageRoute::Red);
        assert!(!d.has_flag(FLAG_RAPID_PROGRESSION));
    }

    #[test]
    fn rapid_progression_applies_under_protocol_when_no_threshold_met() {
        let protocol = Protocol::new("p1", Some("Headache"), "severity >= 9", "severity >= 8");
        let d = engine()
            .decide(
                "p1",
                Some("Headache"),
                &Measurement::new("Headache", 6, None),
                Some(&protocol),
                &window(&[1, 7]),
            )
            .unwrap();
        assert_eq!(d.route, TriageRoute::Yellow);
        assert_eq!(d.confidence, 0.75);
    }

    #[test]
    fn unevaluable_criterion_is_flagged() {
        let protocol = Protocol::new(
            "p1",
            Some("Nausea"),
            "unable to keep fluids down > 12h",
            "severity >= 5",
        );
        let d = engine()
            .decide(
                "p1",
                Some("Nausea"),
                &Measurement::new("Nausea", 10, None),
                Some(&protocol),
                &SymptomTrend::empty("Nausea"),
            )
            .unwrap();
        assert_eq!(d.route, TriageRoute::Yellow);
        assert!(d.has_flag(FLAG_UNEVALUABLE_CRITERION));
        assert!(d.has_flag(FLAG_PROTOCOL_YELLOW));
    }

    #[test]
    fn out_of_range_severity_is_rejected() {
        let result = engine().decide(
            "p1",
            None,
            &Measurement::new("Headache", 11, None),
            None,
            &SymptomTrend::empty("Headache"),
        );
        assert!(matches!(result, Err(TriageError::Validation(_))));
    }

    #[test]
    fn custom_policy_moves_default_thresholds() {
        let policy = TriagePolicy {
            default_red_threshold: 9,
            default_yellow_threshold: 6,
            ..TriagePolicy::default()
        };
        let d = TriageEngine::new(policy)
            .decide("p1", None, &Measurement::new("Pain", 8, None), None, &SymptomTrend::empty("Pain"))
            .unwrap();
        assert_eq!(d.route, TriageRoute::Yellow);
    }
}
