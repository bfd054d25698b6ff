//! Door controller (BCM) connection for the Carberus ECU.
//!
//! - [`protocol`]: the newline-delimited ASCII command and status lines
//! - [`codec`]: a tokio-util codec framing those lines over [`bytes::BytesMut`]
//! - [`controller`]: [`DoorController`], which owns the link, writes unlock
//!   commands and collects status from a background reader
//!
//! A controller that never connected, or whose link was lost, keeps working
//! in logic-only mode: unlocks are refused without raising.

pub mod codec;
pub mod controller;
pub mod protocol;

pub use codec::DoorLineCodec;
pub use controller::{DoorController, DoorStats};
pub use protocol::{DoorCommand, DoorStatus};
