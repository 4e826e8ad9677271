use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::enums::TrendDirection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub severity: i32,
}

/// Severity series of one symptom over a window, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomTrend {
    pub symptom: String,
    pub points: Vec<TrendPoint>,
    pub direction: TrendDirection,
}

impl SymptomTrend {
    /// Sorts the points chronologically (stable for equal timestamps) and
    /// derives the direction from the earliest and latest values.
    pub fn from_points(symptom: impl Into<String>, mut points: Vec<TrendPoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        let direction = direction_of(&points);
        Self {
            symptom: symptom.into(),
            points,
            direction,
        }
    }

    /// The same series with one more reading folded in.
    pub fn with_point(self, point: TrendPoint) -> Self {
        let mut points = self.points;
        points.push(point);
        Self::from_points(self.symptom, points)
    }

    pub fn empty(symptom: impl Into<String>) -> Self {
        Self::from_points(symptom, Vec::new())
    }

    pub fn earliest(&self) -> Option<&TrendPoint> {
        self.points.first()
    }

    pub fn latest(&self) -> Option<&TrendPoint> {
        self.points.last()
    }

    /// `latest - earliest`, once there are at least two points.
    pub fn delta(&self) -> Option<i32> {
        if self.points.len() < 2 {
            return None;
        }
        match (self.earliest(), self.latest()) {
            (Some(first), Some(last)) => Some(last.severity - first.severity),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn direction_of(points: &[TrendPoint]) -> TrendDirection {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 2 => {
            match last.severity.cmp(&first.severity) {
                std::cmp::Ordering::Greater => TrendDirection::Worsening,
                std::cmp::Ordering::Less => TrendDirection::Improving,
                std::cmp::Ordering::Equal => TrendDirection::Stable,
            }
        }
        _ => TrendDirection::InsufficientData,
    }
}
