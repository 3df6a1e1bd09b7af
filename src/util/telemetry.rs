//! Tracing setup for runner diagnostics.
//!
//! Runner and pool events (submissions, completions, parks, shutdown) are
//! emitted through `tracing`; this module only wires up a subscriber for
//! hosts that have not installed their own.

/// Install an env-filtered fmt subscriber unless one is already set.
///
/// Safe to call more than once; later calls are no-ops. Hosts with their own
/// subscriber can skip this entirely — runners never require it.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
