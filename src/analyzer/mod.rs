//! Static checks run on hook bytecode before it is installed.

pub mod guard;

pub use guard::{GuardChecker, GuardReport, GuardViolation};
