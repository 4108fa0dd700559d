//! stagehand-core: the dependency-resolution and staging engine.
//!
//! Given a compiled program's output tree, an engine installation, and a
//! target platform, the engine decides what ships ([`resolver`]), copies or
//! references it into the destination layout ([`stager`]), and orchestrates
//! one packaging run end to end with cancellation and progress reporting
//! ([`session`]). Platform differences are data, not code: [`policy`] holds
//! one declarative record per supported platform.

pub mod error;
pub mod policy;
pub mod resolver;
pub mod session;
pub mod stager;
pub mod target;

pub use error::{Conflict, ResolveError, StageError};
pub use policy::{LayoutRules, PlatformPolicy, policy_for, policy_for_id};
pub use resolver::{ResolveRequest, resolve};
pub use session::{SessionController, SessionError, SessionHandle, SessionRequest};
pub use stager::{StageOptions, stage};
