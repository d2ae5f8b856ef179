//! # weatherwatch-types
//!
//! Core types shared by weather-station dashboards: timestamped observation
//! packets, the fixed set of display time spans and their fetch options,
//! and per-observation statistics.
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: JSON serialization via serde
//!
//! ## Example
//!
//! ```rust
//! use weatherwatch_types::{Packet, TimeSpanKey};
//!
//! let packet = Packet::new(1_700_000_000_000)
//!     .with("out_temperature", 21.5)
//!     .with("wind_speed", 3.2);
//!
//! assert_eq!(packet.get("out_temperature"), Some(21.5));
//! assert_eq!(TimeSpanKey::Recent.stats_key(), TimeSpanKey::Day);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod packet;
mod span;
mod stats;

pub use packet::*;
pub use span::*;
pub use stats::*;

/// Milliseconds in one minute.
pub const MINUTE_MS: i64 = 60_000;
