// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Global tracing control.
//!
//! The subscriber is a registry with a reloadable [`EnvFilter`] and a fmt layer. The filter is
//! built from a default level plus an optional list of `target=level` directives, which may come
//! from `RUST_LOG` or from the command line.

use std::sync::{Mutex, OnceLock};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

pub const DEFAULT_DEFAULT_LOGLEVEL: LevelFilter = LevelFilter::INFO;

#[derive(Debug, thiserror::Error)]
pub enum TraceCtlError {
    #[error("Invalid tracing configuration '{0}': {1}")]
    InvalidConfig(String, String),
    #[error("Failed to reload tracing filter: {0}")]
    ReloadError(String),
    #[error("Tracing control state is poisoned")]
    Poisoned,
}

#[derive(Debug)]
struct FilterState {
    default: LevelFilter,
    directives: String,
}

pub struct TracingControl {
    handle: reload::Handle<EnvFilter, Registry>,
    state: Mutex<FilterState>,
}

static TRACE_CTL: OnceLock<TracingControl> = OnceLock::new();

/// Get the process-wide [`TracingControl`], initializing tracing on first use.
///
/// Initial directives are read from `RUST_LOG`, if set and valid.
pub fn get_trace_ctl() -> &'static TracingControl {
    TRACE_CTL.get_or_init(TracingControl::new)
}

/// Build an [`EnvFilter`] from a default level and a comma-separated list of directives.
pub(crate) fn build_filter(
    default: LevelFilter,
    directives: &str,
) -> Result<EnvFilter, TraceCtlError> {
    EnvFilter::builder()
        .with_default_directive(default.into())
        .parse(directives)
        .map_err(|e| TraceCtlError::InvalidConfig(directives.to_string(), e.to_string()))
}

impl TracingControl {
    fn new() -> Self {
        let directives = std::env::var("RUST_LOG").unwrap_or_default();
        let filter = build_filter(DEFAULT_DEFAULT_LOGLEVEL, &directives).unwrap_or_else(|e| {
            eprintln!("Ignoring RUST_LOG: {e}");
            EnvFilter::default().add_directive(DEFAULT_DEFAULT_LOGLEVEL.into())
        });
        let (filter, handle) = reload::Layer::new(filter);

        // another subscriber may already be installed (e.g. in tests); the handle is still usable
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init();

        Self {
            handle,
            state: Mutex::new(FilterState {
                default: DEFAULT_DEFAULT_LOGLEVEL,
                directives,
            }),
        }
    }

    fn reload(&self, state: &FilterState) -> Result<(), TraceCtlError> {
        let filter = build_filter(state.default, &state.directives)?;
        self.handle
            .reload(filter)
            .map_err(|e| TraceCtlError::ReloadError(e.to_string()))
    }

    /// Set the level applied to targets without an explicit directive.
    pub fn set_default_level(&self, level: LevelFilter) -> Result<(), TraceCtlError> {
        let mut state = self.state.lock().map_err(|_| TraceCtlError::Poisoned)?;
        state.default = level;
        self.reload(&state)
    }

    /// Replace the per-target directives with those in `config`, e.g.
    /// `"netmig_alias_helper=debug,kube=warn"`.
    pub fn setup_from_string(&self, config: &str) -> Result<(), TraceCtlError> {
        // validate before touching the state
        build_filter(LevelFilter::OFF, config)?;
        let mut state = self.state.lock().map_err(|_| TraceCtlError::Poisoned)?;
        state.directives = config.to_string();
        self.reload(&state)
    }

    /// Render the current configuration.
    pub fn as_string(&self) -> Result<String, TraceCtlError> {
        let state = self.state.lock().map_err(|_| TraceCtlError::Poisoned)?;
        Ok(format!(
            "default={}; directives='{}'",
            state.default, state.directives
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_build_filter() {
        let filter = build_filter(LevelFilter::WARN, "netmig_webhook=debug,kube=error").unwrap();
        let rendered = filter.to_string().to_lowercase();
        assert!(rendered.contains("netmig_webhook=debug"));
        assert!(rendered.contains("kube=error"));
        assert!(rendered.contains("warn"));
    }

    #[test]
    fn test_build_filter_rejects_garbage() {
        let err = build_filter(LevelFilter::INFO, "netmig=loud").unwrap_err();
        assert!(matches!(err, TraceCtlError::InvalidConfig(..)));
    }

    #[test]
    fn test_trace_ctl_reconfigure() {
        let tctl = get_trace_ctl();
        tctl.set_default_level(LevelFilter::DEBUG).unwrap();
        tctl.setup_from_string("netmig_alias_helper=trace").unwrap();
        assert!(tctl.setup_from_string("netmig=loud").is_err());
        let current = tctl.as_string().unwrap().to_lowercase();
        assert!(current.contains("default=debug"));
        assert!(current.contains("netmig_alias_helper=trace"));
    }
}
