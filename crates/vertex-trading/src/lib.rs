//! Strategy framework (§4.6) and position manager (§4.7) for the Vertex trading engine.

pub mod position;
pub mod strategy;

pub use position::{PositionManager, SizingPreset, SizingStrategy};
pub use strategy::{
    compute_stop_target, default_confirm_signal, default_exit, ConfirmParams, DualMaCrossStrategy, EnhancementContext, Enhancer,
    RsiMeanReversionStrategy, Strategy, StrategyRegistry, StopTargetParams,
};
