//! The per-tick signal-processing pipeline: a fixed sequence of [`crate::frame::PipelineModule`]
//! stages, each consuming the previous stage's [`crate::frame::Frame`] and producing its own.

pub mod buttons;
pub mod cluster;
pub mod predictive;
pub mod smoother;
pub mod towed_circle;
pub mod unrotate;

pub use buttons::ButtonMapperStage;
pub use cluster::ClusterStage;
pub use predictive::PredictiveDualIrStage;
pub use smoother::SmootherStage;
pub use towed_circle::TowedCircleStage;
pub use unrotate::UnrotateStage;
