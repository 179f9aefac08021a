//! Bias metric codes understood by the analysis service
//!
//! Only the identifiers live here. The metrics themselves are computed
//! remotely by the processing job.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// When a metric can be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricPhase {
    /// Computed from the labeled dataset alone
    PreTraining,
    /// Needs predictions from the hosted model
    PostTraining,
}

impl fmt::Display for MetricPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricPhase::PreTraining => write!(f, "pre-training"),
            MetricPhase::PostTraining => write!(f, "post-training"),
        }
    }
}

/// A bias metric code, e.g. `DI` for disparate impact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricCode {
    // Pre-training
    /// Class imbalance
    Ci,
    /// Difference in proportions of labels
    Dpl,
    /// Kullback-Leibler divergence
    Kl,
    /// Jensen-Shannon divergence
    Js,
    /// Lp-norm
    Lp,
    /// Total variation distance
    Tvd,
    /// Kolmogorov-Smirnov
    Ks,
    /// Conditional demographic disparity in labels
    Cddl,

    // Post-training
    /// Difference in positive proportions in predicted labels
    Dppl,
    /// Disparate impact
    Di,
    /// Difference in conditional acceptance
    Dca,
    /// Difference in conditional rejection
    Dcr,
    /// Recall difference
    Rd,
    /// Difference in acceptance rates
    Dar,
    /// Difference in rejection rates
    Drr,
    /// Accuracy difference
    Ad,
    /// Conditional demographic disparity in predicted labels
    Cddpl,
    /// Treatment equality
    Te,
    /// Flip test
    Ft,
}

impl MetricCode {
    pub const PRE_TRAINING: [MetricCode; 8] = [
        MetricCode::Ci,
        MetricCode::Dpl,
        MetricCode::Kl,
        MetricCode::Js,
        MetricCode::Lp,
        MetricCode::Tvd,
        MetricCode::Ks,
        MetricCode::Cddl,
    ];

    pub const POST_TRAINING: [MetricCode; 11] = [
        MetricCode::Dppl,
        MetricCode::Di,
        MetricCode::Dca,
        MetricCode::Dcr,
        MetricCode::Rd,
        MetricCode::Dar,
        MetricCode::Drr,
        MetricCode::Ad,
        MetricCode::Cddpl,
        MetricCode::Te,
        MetricCode::Ft,
    ];

    /// The wire code, as used in `analysis_config.json`
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricCode::Ci => "CI",
            MetricCode::Dpl => "DPL",
            MetricCode::Kl => "KL",
            MetricCode::Js => "JS",
            MetricCode::Lp => "LP",
            MetricCode::Tvd => "TVD",
            MetricCode::Ks => "KS",
            MetricCode::Cddl => "CDDL",
            MetricCode::Dppl => "DPPL",
            MetricCode::Di => "DI",
            MetricCode::Dca => "DCA",
            MetricCode::Dcr => "DCR",
            MetricCode::Rd => "RD",
            MetricCode::Dar => "DAR",
            MetricCode::Drr => "DRR",
            MetricCode::Ad => "AD",
            MetricCode::Cddpl => "CDDPL",
            MetricCode::Te => "TE",
            MetricCode::Ft => "FT",
        }
    }

    pub fn phase(&self) -> MetricPhase {
        if Self::PRE_TRAINING.contains(self) {
            MetricPhase::PreTraining
        } else {
            MetricPhase::PostTraining
        }
    }
}

impl fmt::Display for MetricCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::PRE_TRAINING
            .iter()
            .chain(Self::POST_TRAINING.iter())
            .find(|code| code.as_str() == upper)
            .copied()
            .ok_or_else(|| format!("Unknown bias metric code: {}", s))
    }
}

impl Serialize for MetricCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MetricCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
