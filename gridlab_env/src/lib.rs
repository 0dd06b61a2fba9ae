//! GridLab Environment Abstraction Layer
//!
//! This crate provides the seams that let the Virtual Lab core run against
//! either a **Production** environment (tokio, a real detection model) or a
//! **Simulation** (virtual clock, seeded detector).
//!
//! # Core Concept
//!
//! The lab core never touches the outside world directly. It goes through:
//! - Time (`now()`, `sleep()`) via [`LabContext`]
//! - Anomaly inference via [`InferenceEngine`]
//!
//! Everything that crosses the boundary (inference requests and results,
//! run identifiers, attack types) is defined here so that both sides agree
//! on the wire shape.
//!
//! # Example
//!
//! ```ignore
//! use gridlab_env::{InferenceEngine, InferenceRequest, LabContext};
//!
//! async fn detect<Ctx: LabContext, E: InferenceEngine>(ctx: &Ctx, engine: &E, req: InferenceRequest) {
//!     let started = ctx.now();
//!     let result = engine.infer(req).await;
//!     tracing::info!("inference took {:?}", ctx.now() - started);
//! }
//! ```

mod context;
mod error;
mod inference;
mod tokio_impl;
mod types;

pub use context::LabContext;
pub use error::EnvError;
pub use inference::{
    AttackProbe, EdgeFeature, InferenceEngine, InferenceRequest, InferenceResult,
    InferenceSummary, NodeFeature, NodeVerdict,
};
pub use tokio_impl::TokioContext;
pub use types::{AttackType, Classification, NodeLayer, RunId};
