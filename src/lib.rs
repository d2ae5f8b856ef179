// Library crate: public API items may not be used by the binary
#![allow(unused)]

//! # weatherwatch
//!
//! A live weather-station dashboard for the terminal, and the library that
//! keeps its data in step with the selected time span.
//!
//! The dashboard shows one of five time spans (`recent`, `day`, `week`,
//! `month`, `year`). For the selected span it fetches historical packets,
//! subscribes to the live feed of the span's measurement, trims the rolling
//! `recent` window to its detail length, and computes a readable time axis.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           Application                            │
//! │  ┌─────────┐   ┌────────────┐   ┌────────┐   ┌─────────┐         │
//! │  │   app   │──▶│ controller │──▶│  data  │──▶│   ui    │         │
//! │  │ (state) │   └─────┬──────┘   └────────┘   └─────────┘         │
//! │  └─────────┘         │                                           │
//! │             ┌────────┴────────┐                                  │
//! │             ▼                 ▼                                  │
//! │       ┌──────────┐    ┌──────────────┐                           │
//! │       │  fetch   │    │ subscription │                           │
//! │       └────┬─────┘    └──────┬───────┘                           │
//! │            ▼                 ▼                                   │
//! │      ArchiveSource     TcpFeed | ChannelFeed    (source)         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`controller`]**: [`TimeSpanController`] reacts to activation,
//!   selection changes and teardown
//! - **[`fetch`]**: [`FetchCoordinator`], at most one fetch in flight per span
//! - **[`subscription`]**: [`SubscriptionManager`], at most one live
//!   subscription per measurement
//! - **[`store`]**: [`DashboardStore`], the session-long span records
//! - **[`data`]**: pure derivations (stale trimming, nice axis domains,
//!   plot projection, units)
//! - **[`source`]**: the fetch and live-feed collaborators
//! - **[`ui`]**: terminal rendering using ratatui
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Archived packets only
//! weatherwatch --archive /var/lib/weather
//!
//! # With a live feed
//! weatherwatch --archive /var/lib/weather --connect localhost:9090
//!
//! # Write the selected span as JSON and exit
//! weatherwatch --archive /var/lib/weather --span week --export week.json
//! ```
//!
//! ### As a library
//!
//! ```
//! use std::sync::Arc;
//! use weatherwatch::{
//!     ArchiveSource, ChannelFeed, FetchCoordinator, Settings, SubscriptionManager,
//!     TimeSpanController, TimeSpanKey,
//! };
//!
//! # tokio_test::block_on(async {
//! let settings = Settings::default();
//! let mut store = settings.build_store(1_700_000_000_000);
//!
//! let archive = Arc::new(ArchiveSource::new("/var/lib/weather", chrono::Utc));
//! let (_tx, feed) = ChannelFeed::create("in-process");
//!
//! let mut controller = TimeSpanController::new(
//!     FetchCoordinator::new(archive.clone(), archive),
//!     SubscriptionManager::new(Arc::new(feed)),
//!     TimeSpanKey::Recent,
//! );
//! controller.activate(&mut store);
//! controller.settle(&mut store).await;
//! # });
//! ```

pub mod app;
pub mod config;
pub mod controller;
pub mod data;
pub mod error;
pub mod events;
pub mod fetch;
pub mod source;
pub mod store;
pub mod subscription;
pub mod ui;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use app::App;
pub use config::Settings;
pub use controller::{CurrentConditions, PumpSummary, TimeSpanController};
pub use data::{nice_domain_and_ticks, Axis, Domain, PlotProjection, PlotStatus};
pub use error::{FetchError, SubscribeError};
pub use fetch::{FetchCoordinator, FreshnessPolicy};
pub use source::{
    ArchiveSource, ChannelFeed, LiveEvent, LiveMessage, LiveSink, PacketFetcher, PacketStream,
    StatsFetcher, SubscriptionHandle, TcpFeed,
};
pub use store::{DashboardStore, FetchPhase, StatsRecord, TimeSpanRecord};
pub use subscription::SubscriptionManager;
pub use weatherwatch_types::{Packet, Stats, TagFilter, TimeSpanKey, TimeSpanOptions};
