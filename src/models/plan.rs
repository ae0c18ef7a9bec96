use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Claude plan tiers with their per-window token ceilings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanType {
    #[default]
    Pro,
    Max5,
    Max20,
    /// Detection-only tier for usage above Max20; carries the rounded limit
    CustomMax(u64),
}

impl PlanType {
    pub fn limit(&self) -> u64 {
        match self {
            PlanType::Pro => 44_000,
            PlanType::Max5 => 220_000,
            PlanType::Max20 => 880_000,
            PlanType::CustomMax(limit) => *limit,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlanType::Pro => "Pro",
            PlanType::Max5 => "Max5",
            PlanType::Max20 => "Max20",
            PlanType::CustomMax(_) => "Custom Max",
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanSelectionError {
    #[error("\"Custom Max\" is detected automatically and cannot be selected manually")]
    DetectionOnly,
    #[error("unknown plan tier \"{0}\"; use auto, pro, max5 or max20")]
    Unknown(String),
}

/// A user's plan choice: follow detection, or pin a manual tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSelection {
    Auto,
    Manual(PlanType),
}

impl FromStr for PlanSelection {
    type Err = PlanSelectionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect();

        match normalized.as_str() {
            "auto" => Ok(PlanSelection::Auto),
            "pro" => Ok(PlanSelection::Manual(PlanType::Pro)),
            "max5" => Ok(PlanSelection::Manual(PlanType::Max5)),
            "max20" => Ok(PlanSelection::Manual(PlanType::Max20)),
            "custommax" => Err(PlanSelectionError::DetectionOnly),
            _ => Err(PlanSelectionError::Unknown(value.trim().to_string())),
        }
    }
}

/// Manual-plan preference as persisted by the settings store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualOverride {
    pub enabled: bool,
    pub tier: Option<String>,
}

impl ManualOverride {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// The pinned tier, if the override is enabled and names a settable tier
    pub fn selected_plan(&self) -> Option<PlanType> {
        if !self.enabled {
            return None;
        }

        match self.tier.as_deref().map(str::parse::<PlanSelection>) {
            Some(Ok(PlanSelection::Manual(plan))) => Some(plan),
            Some(Ok(PlanSelection::Auto)) => None,
            Some(Err(e)) => {
                log::warn!("Ignoring stored manual plan override: {e}");
                None
            }
            None => {
                log::warn!("Manual plan override enabled without a tier; using auto detection");
                None
            }
        }
    }
}

impl From<PlanSelection> for ManualOverride {
    fn from(selection: PlanSelection) -> Self {
        match selection {
            PlanSelection::Auto => ManualOverride::disabled(),
            PlanSelection::Manual(plan) => ManualOverride {
                enabled: true,
                tier: Some(plan.name().to_string()),
            },
        }
    }
}

/// Plan in effect after applying any manual override to the detected tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPlan {
    pub plan: PlanType,
    pub detected: PlanType,
    pub is_manual: bool,
}

impl ResolvedPlan {
    pub fn limit(&self) -> u64 {
        self.plan.limit()
    }

    pub fn label(&self) -> String {
        let mode = if self.is_manual { "Manual" } else { "Auto" };
        format!("{} ({mode})", self.plan.name())
    }
}
