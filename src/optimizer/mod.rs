//! # Optimizer Module
//!
//! The optimize pipeline, split into submodules:
//! - `media_optimizer`: batch orchestrator
//! - `task_optimizer`: single-file encode worker
//! - `progress_tracker`: batch-wide progress aggregation
//! - `path_resolver`: marker path arithmetic

pub mod media_optimizer;
pub mod task_optimizer;
pub mod progress_tracker;
pub mod path_resolver;

pub use media_optimizer::{BatchOrchestrator, BatchReport};
pub use task_optimizer::TaskOptimizer;
pub use progress_tracker::ProgressAggregator;
pub use path_resolver::PathResolver;
