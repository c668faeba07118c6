// Trading strategy module
pub mod signals;

pub use signals::{DecisionMode, Evaluation, SignalEvaluator};
