//! Business logic services (use cases).
//!
//! Services orchestrate repository calls, filesystem operations, and
//! business rules. They depend on traits (ports) -- never on concrete
//! infrastructure implementations.

pub mod character;
pub mod conversation;
pub mod fs;
pub mod interaction;
pub mod personality;
pub mod role;

