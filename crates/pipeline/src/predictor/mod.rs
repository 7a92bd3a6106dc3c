//! Cold-start predictors.
//!
//! - `FoldInPredictor`: projects into a published snapshot; the serving path
//! - `FullRefitPredictor`: refactorizes with the user appended; offline only

pub mod fold_in;
pub mod full_refit;

pub use fold_in::FoldInPredictor;
pub use full_refit::FullRefitPredictor;
