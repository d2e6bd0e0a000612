//! # Pose Fusion
//!
//! Factor-graph least squares on Lie-group manifolds, for pose-graph problems in 2D and 3D.
//!
//! Unknown poses live on SE(2) or SE(3). Relative measurements between them are
//! [`BetweenFactor`]s whose errors are measured in the tangent space. Optimizers minimize the
//! total loss by computing a gradient in tangent coordinates and retracting every pose along
//! its own step, so estimates never leave the manifold.
//!
//! ## Layers
//!
//! - [`manifold`]: SO(2), SO(3), SE(2), SE(3) with analytic Jacobians of every group operation
//! - [`core`]: estimate collections, linearization records and factor graphs
//! - [`factors`]: the [`Factor`] trait, [`BetweenFactor`] and [`PriorFactor`]
//! - [`optimizer`]: [`GradientDescent`] and [`Sgd`], cancellation and termination reporting
//!
//! ## Example
//!
//! ```
//! use pose_fusion::{BetweenFactor, FactorGraph, GradientDescent, GradientDescentConfig, Values};
//! use pose_fusion::manifold::se2::SE2;
//!
//! let mut values = Values::new();
//! let x0 = values.insert(SE2::from_xy_angle(0.0, 0.0, 0.0));
//! let x1 = values.insert(SE2::from_xy_angle(1.5, 0.2, 0.1));
//!
//! let mut graph = FactorGraph::new();
//! graph.add_factor(BetweenFactor::new(x0, x1, SE2::from_xy_angle(1.0, 0.0, 0.0)));
//!
//! let mut solver = GradientDescent::with_config(GradientDescentConfig::new().with_learning_rate(0.1));
//! let result = solver.optimize(&graph, &values).unwrap();
//! println!("{:?}", result.values.to_triples());
//! ```

pub mod core;
pub mod error;
pub mod factors;
#[cfg(feature = "logging")]
pub mod logger;
pub mod manifold;
pub mod observers;
pub mod optimizer;

// Re-export core types
pub use core::graph::FactorGraph;
pub use core::jacobian_factor::{JacobianFactor, LinearFactor};
pub use core::values::{TangentValues, Values, VariableId};
pub use error::{PoseFusionError, PoseFusionResult};

// Re-export factor types
pub use factors::{BetweenFactor, BetweenFactor2, BetweenFactor3, Factor, PriorFactor};

#[cfg(feature = "logging")]
pub use logger::{init_logger, init_logger_with_level};
pub use optimizer::{
    GradientDescent, GradientDescentConfig, LossFunction, Objective, OptObserver, OptObserverVec,
    OptimizationStatus, Sgd, SgdConfig, Solver, SolverResult, StopHandle,
};
