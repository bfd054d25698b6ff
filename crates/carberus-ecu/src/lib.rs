//! Carberus ECU: fuses key fob tokens and face recognition into unlock
//! decisions.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐        ┌───────────┐
//! │ scanner  │─queue─►│           │                ┌────────────────┐
//! │ task     │        │ EventLoop │──► Arbiter ───►│ DoorController │
//! └──────────┘        │ (50 ms)   │   (cooldown)   └────────────────┘
//! ┌──────────┐        │           │                        │
//! │ camera   │─frame─►│ Biometric │◄──── status lines ─────┘
//! └──────────┘        └───────────┘
//! ```
//!
//! - [`scanner`]: reads advertisements, validates tokens, queues events
//! - [`arbiter`]: the cooldown policy and the only caller of the door
//! - [`event_loop`]: the tick loop and orderly teardown
//! - [`telemetry`]: counters for every absorbed fault

pub mod arbiter;
pub mod event_loop;
pub mod scanner;
pub mod telemetry;

pub use arbiter::{Arbiter, ArbiterStats, UnlockDecision};
pub use event_loop::EventLoop;
pub use scanner::{ScannerHandle, TokenFeed, spawn_scanner};
pub use telemetry::{LoopStats, TelemetrySnapshot};
