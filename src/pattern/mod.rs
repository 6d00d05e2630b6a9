/*!
 * Path Pattern Module
 * Glob compilation, canonical path cleaning, and compiled-matcher caching
 */

mod cache;
mod matcher;

pub use cache::PatternCache;
pub use matcher::{clean_path, PatternError, PatternMatcher};
