//! # Data Loader Crate
//!
//! Loads observed ratings and exposes them through the `RatingStore` trait.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (Rating, RatingScale, RatingStore, RatingIndex)
//! - **parser**: Parse CSV or `.dat` rating files into records
//! - **index**: Load and validate a `RatingIndex`
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{RatingIndex, RatingStore};
//! use std::path::Path;
//!
//! let index = RatingIndex::load_from_file(Path::new("data/ratings.csv"))?;
//! let ratings = index.all_ratings();
//! println!("Loaded {} ratings", ratings.len());
//! ```

// Public modules
pub mod error;
pub mod types;
pub mod parser;
pub mod index;

// Re-export commonly used types for convenience
pub use error::{DataLoadError, Result};
pub use types::{
    // Type aliases
    UserId,
    ItemId,
    // Core types
    Rating,
    RatingScale,
    RatingIndex,
    RatingStore,
};
