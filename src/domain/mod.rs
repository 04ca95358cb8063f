//! Provisioning domain
//!
//! Template assembly, operator input validation, and the single-target and
//! batch provisioning flows built on the management client.

pub mod batch;
pub mod provision;
pub mod template;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;
