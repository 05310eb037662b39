//! Strategy signals (spec.md §3).

use serde::{Deserialize, Serialize};
use ustr::Ustr;
use vertex_core::UnixSeconds;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Open,
    Close,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
}

impl SignalKind {
    #[must_use]
    pub fn action(self) -> Action {
        match self {
            SignalKind::OpenLong | SignalKind::OpenShort => Action::Open,
            SignalKind::CloseLong | SignalKind::CloseShort => Action::Close,
        }
    }

    #[must_use]
    pub fn side(self) -> Side {
        match self {
            SignalKind::OpenLong | SignalKind::CloseLong => Side::Long,
            SignalKind::OpenShort | SignalKind::CloseShort => Side::Short,
        }
    }
}

/// Metadata attached by an optional LLM enhancement pass (spec.md §3, §9). Absence means the
/// signal was never handed to an enhancer, or the enhancer declined/timed out — either way the
/// trading decision itself is never altered by its absence.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Enhancement {
    pub enhanced: bool,
    pub reasoning: Option<String>,
    pub confidence: Option<f64>,
    pub model: Option<String>,
    pub risk_tier: Option<String>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Signal {
    pub strategy_name: Ustr,
    pub symbol: Ustr,
    pub timestamp: UnixSeconds,
    pub price: f64,
    pub signal_kind: SignalKind,
    pub side: Side,
    pub action: Action,
    pub reason: String,
    pub confidence: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub enhancement: Option<Enhancement>,
}

impl Signal {
    /// The `action == OPEN ⇔ signal_kind ∈ {OPEN_*}` invariant from spec.md §3, plus the
    /// matching-side requirement for OPEN signals.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.action == self.signal_kind.action() && self.side == self.signal_kind.side()
    }
}
