use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ValidationError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(EventSource {
    Manual => "manual",
    Voice => "voice",
    Generated => "generated",
});

str_enum!(EventKind {
    Symptom => "symptom",
    Wellness => "wellness",
    Treatment => "treatment",
    Lifestyle => "lifestyle",
    WorkflowResult => "workflow_result",
});

str_enum!(Trend {
    Worsening => "worsening",
    Stable => "stable",
    Improving => "improving",
});

str_enum!(TrendDirection {
    Worsening => "worsening",
    Stable => "stable",
    Improving => "improving",
    InsufficientData => "insufficient_data",
});

str_enum!(LifestyleCategory {
    Diet => "diet",
    Exercise => "exercise",
    Sleep => "sleep",
    Stress => "stress",
    Travel => "travel",
    Other => "other",
});

// Declaration order is severity order: Green < Yellow < Red.
str_enum!(TriageRoute {
    Green => "green",
    Yellow => "yellow",
    Red => "red",
});

str_enum!(TaskUrgency {
    Routine => "routine",
    Urgent => "urgent",
    Stat => "stat",
});

str_enum!(TaskStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

str_enum!(EscalationSeverity {
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

str_enum!(ContactPreference {
    Call => "call",
    Message => "message",
    Both => "both",
});

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether a follow-up task may move from `self` to `next`.
    ///
    /// Terminal states accept nothing. A pending task may be closed directly
    /// (completed or cancelled) without passing through `in_progress`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::Pending, Self::Completed)
                | (Self::Pending, Self::Cancelled)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Cancelled)
        )
    }
}
