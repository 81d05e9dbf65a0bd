//! Portfolio model and publishing pipeline.
//!
//! # Data Flow
//! ```text
//! store.rs (slug → Portfolio, seeded from fixtures.rs)
//!     → generation.rs (validate address + content, order sections)
//!     → PublishedPage
//! ```
//!
//! Used by the portfolio API and by the `generation` health probe.

pub mod fixtures;
pub mod generation;
pub mod store;
pub mod types;

pub use generation::assemble;
pub use store::PortfolioStore;
pub use types::{GenerationError, Portfolio, PublishedPage, SectionKind, Template};
