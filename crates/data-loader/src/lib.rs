//! # Data Loader Crate
//!
//! This crate loads user-item rating files and indexes them.
//! It is the ratings source for the factorization engine.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (Rating, RatingIndex, RatingStats)
//! - **parser**: Parse and write `::`, `,` and tab separated rating files
//! - **index**: Load, validate and summarize a RatingIndex
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{RatingFormat, RatingIndex};
//! use std::path::Path;
//!
//! let index = RatingIndex::load_from_file(Path::new("data/ml-1m/ratings.dat"), RatingFormat::Dat)?;
//! let (users, items, ratings) = index.counts();
//! println!("{} users rated {} items {} times", users, items, ratings);
//! ```

// Public modules
pub mod error;
pub mod types;
pub mod parser;
pub mod index;

// Re-export commonly used types for convenience
pub use error::{DataLoadError, Result};
pub use parser::{parse_ratings, write_ratings, RatingFormat};
pub use types::{
    // Type aliases
    UserId,
    ItemId,
    // Core types
    Rating,
    RatingIndex,
    RatingStats,
};
