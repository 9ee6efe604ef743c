//! Model training
//!
//! A regression decision tree, a seeded bootstrap random forest over it, and
//! the max-depth sweep that picks the forest by validation loss.

pub mod decision_tree;
pub mod random_forest;
pub mod sweep;

pub use decision_tree::DecisionTree;
pub use random_forest::RandomForest;
pub use sweep::{depth_grid, DepthSweep, TrainedModel};
