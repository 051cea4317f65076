//! Policy bridge / intent builder (C7) and role resolver (C9), spec §4.7/§4.9.

#![deny(unsafe_code)]

mod intent_builder;
mod role_resolver;

pub use intent_builder::{IntentBuilder, IntentError};
pub use role_resolver::RoleResolver;
