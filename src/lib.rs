//! feedkeeper: a periodic, fault-tolerant feed-refresh engine.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌───────────┐ tick ┌───────────┐  fetch  ┌───────────┐
//! │ Scheduler │ ───► │ Refresher │ ──────► │  source/  │
//! │ (poll.rs) │      │ (poll.rs) │ ◄────── │ (Fetcher) │
//! └───────────┘      └───────────┘ Result  └───────────┘
//!                      │       │
//!          reconcile() │       │ lifecycle::apply()
//!                      ▼       ▼
//!                  ┌─────────────────┐
//!                  │ store/ (Store)  │
//!                  └─────────────────┘
//! ```
//!
//! * **`source/`**: the `Fetcher` trait, the parsed document type, failure
//!   classification and the HTTP fetcher for RSS and Atom.
//! * **`reconcile`**: upserts a document's entries and source metadata.
//! * **`lifecycle`**: the per-source retry state machine.
//! * **`poll`**: runs the per-source pipeline across all eligible sources,
//!   on demand or on a fixed period.
//! * **`store/`**: the persistence interface and its backends.
//! * **`config`**: TOML configuration for the daemon.

pub mod config;
pub mod lifecycle;
pub mod model;
pub mod poll;
pub mod reconcile;
pub mod source;
pub mod store;
