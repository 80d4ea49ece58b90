#![warn(missing_docs)]
//! Treebench Statistical Primitives
//!
//! Provides the descriptive statistics shared by the case runner (per-case
//! summaries) and the eval engine (baseline comparison):
//! - `descriptive_stats` computing mean/median/deviation/CV over a series
//! - the tagged `SummaryValue` model distinguishing statistic leaves from
//!   nested groupings

mod summary;

pub use summary::{Stats, Summary, SummaryValue, descriptive_stats};
