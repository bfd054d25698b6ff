//! Key fob token channel.
//!
//! A key fob periodically advertises one AES-128 block under its
//! vendor-specific manufacturer data. This crate turns those raw payloads
//! into authentication events:
//!
//! ```text
//! advertisement ─► payload (16 B) ─► decrypt ─► TokenPacket ─► command? ─► replay? ─► AuthEvent
//!                      │                │                          │           │
//!                      └ InvalidLength  └ Decrypt                  └ Unsupported└ Replay
//! ```
//!
//! Every rejection is classified by [`TokenRejection`] and counted in
//! [`TokenStats`]. Replay rejections are security events and are kept apart
//! from malformed payloads so they stay distinguishable in telemetry.
//!
//! # Examples
//!
//! ```
//! use carberus_core::{AuthSource, ReplayScope, constants::DEFAULT_TOKEN_KEY};
//! use carberus_token::{TokenChannel, TokenCipher, TokenPacket};
//!
//! let cipher = TokenCipher::new(&DEFAULT_TOKEN_KEY);
//! let mut channel = TokenChannel::new(cipher.clone(), ReplayScope::Global);
//!
//! let payload = cipher.seal(&TokenPacket::unlock([0; 4], 7));
//! let event = channel.ingest(&payload).unwrap();
//! assert_eq!(event.source, AuthSource::Token);
//!
//! // The same payload cannot be used twice.
//! assert!(channel.ingest(&payload).is_none());
//! ```

pub mod advertisement;
pub mod channel;
pub mod cipher;
pub mod error;
pub mod packet;
pub mod replay;
pub mod stats;

pub use advertisement::{Advertisement, AdvertisementError};
pub use channel::TokenChannel;
pub use cipher::TokenCipher;
pub use error::TokenRejection;
pub use packet::TokenPacket;
pub use replay::{ReplayGuard, StateWrite};
pub use stats::{TokenStats, TokenStatsSnapshot};
