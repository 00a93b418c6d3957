//! Correlation and scoring: actor attribution, ATT&CK technique mapping,
//! and the composite risk score.

pub mod actor;
pub mod mitre;
pub mod risk;

pub use actor::ActorMatrix;
pub use mitre::map_techniques;
pub use risk::{ExternalSignals, RiskEngine};
