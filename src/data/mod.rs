//! Pure derivations from stored packets to chart-ready data.
//!
//! ## Submodules
//!
//! - [`stale`]: Trimming the rolling `recent` window to its freshness threshold
//! - [`calendar`]: Day/week/month/year boundaries in the display time zone
//! - [`domain`]: "Nice" axis domains and tick marks ([`Axis`], [`Domain`])
//! - [`projection`]: The plot-ready view of a time span ([`PlotProjection`])
//! - [`units`]: Observation labels and value formatting
//!
//! ## Data Flow
//!
//! ```text
//! TimeSpanRecord.packets
//!        │
//!        ├──▶ first_fresh_index()   (recent only)
//!        │
//!        ├──▶ period_bounds()       (calendar spans)
//!        │
//!        ▼
//! nice_domain_and_ticks() ──▶ PlotProjection { packets, header, domain, ticks }
//! ```

pub mod calendar;
pub mod domain;
pub mod projection;
pub mod stale;
pub mod units;

pub use domain::{nice_domain_and_ticks, Axis, Domain, MAX_TICK_COUNT};
pub use projection::{plot_projection, PlotProjection, PlotStatus, DEFAULT_DETAIL_MINUTES};
pub use stale::{first_fresh_index, fresh_tail};
