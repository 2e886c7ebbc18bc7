//! Store traits and their in-memory implementations
//!
//! Every store is a trait seam so services stay testable with mocks and the
//! engine stays embeddable behind any persistence layer. The in-memory
//! implementations are the reference semantics: write-side invariants
//! (hierarchy shape, version tokens, audit idempotency) are enforced here,
//! not left to callers.

pub mod alert;
pub mod audit;
pub mod grant;
pub mod identity;
pub mod permission;
pub mod policy;
pub mod role;
pub mod trust;

pub use alert::{
    AlertRuleRepository, InMemoryAlertRuleRepository, InMemorySecurityAlertRepository,
    SecurityAlertRepository,
};
pub use audit::{AuditSink, InMemoryAuditSink};
pub use grant::{InMemoryUserPermissionRepository, UserPermissionRepository};
pub use identity::{IdentityProvider, StaticIdentityProvider};
pub use permission::{InMemoryPermissionRepository, PermissionRepository};
pub use policy::{
    InMemoryPolicyViolationRepository, InMemorySecurityPolicyRepository,
    PolicyViolationRepository, SecurityPolicyRepository,
};
pub use role::{InMemoryRoleRepository, RoleRepository};
pub use trust::{InMemoryTrustScoreRepository, TrustScoreRepository};
