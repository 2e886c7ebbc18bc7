//! Domain models for the Trustgate engine

pub mod alert;
pub mod audit;
pub mod grant;
pub mod permission;
pub mod policy;
pub mod request;
pub mod role;
pub mod trust;

pub use alert::*;
pub use audit::*;
pub use grant::*;
pub use permission::*;
pub use policy::*;
pub use request::*;
pub use role::*;
pub use trust::*;
