//! External service clients/adapters.

pub mod notifier;
