//! E2E tests driving kotekan-sim through the kotekan-runner harness.
//!
//! Every scenario renders a config document, launches the real
//! `kotekan-sim` binary and inspects the frames it captured.
//!
//! # Test Structure
//!
//! - `helpers/` -- Shared settings, global configs and frame assertions
//! - `scenarios/` -- Test files organized by scenario
//!
//! # Running
//!
//! ```bash
//! cargo test -p kotekan-sim --test e2e
//! ```

mod helpers;
mod scenarios;
