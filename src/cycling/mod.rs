//! Groups, MRU ordering and the per-hotkey session logic.
//!
//! Everything in this module is platform-free: window and process access live
//! in `services`, and reach the session only as snapshots and effects.

pub mod engine;
pub mod group;
pub mod instance;
pub mod mru;
pub mod session;
pub mod store;

pub use engine::{Candidate, CyclingEngine, Decision, DecisionContext, DecisionReason, Target};
pub use group::{AppRef, CyclingMode, Group, GroupId, RunningApp};
pub use instance::{InstanceId, MatchTier};
pub use session::{Effect, SessionMachine, SessionPhase, SessionSettings, WorldSnapshot};
pub use store::{GroupStore, MemoryGroupStore};
