//! Engine services
//!
//! Each service owns one concern and composes through narrow trait seams:
//! the evaluator sees a `GrantResolver`, a `TrustReader`, and a
//! `ViolationSink`, never the concrete stores behind them.

pub mod catalog;
pub mod correlator;
pub mod evaluator;
pub mod grants;
pub mod hierarchy;
pub mod trust;

pub use catalog::PermissionCatalog;
pub use correlator::{AlertCorrelator, ViolationSink};
pub use evaluator::PolicyEvaluator;
pub use grants::{GrantResolver, GrantStore};
pub use hierarchy::RoleHierarchyResolver;
pub use trust::{TrustReader, TrustScoreEngine};
