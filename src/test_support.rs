//! Test-only helper bridging `log` events to `env_logger` (`SPEC_FULL.md` §A.5).
//! Not required by any assertion — only by a test that wants to eyeball the
//! `log::debug!`/`log::trace!` trace this crate emits while it runs.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize `env_logger` once per test binary, idempotently across however
/// many tests call it.
pub fn init_logging() {
  INIT.call_once(|| { env_logger::init(); });
}
