//! Diagnostics context threaded into every pipeline component.
//!
//! Components receive a [`Diagnostics`] at construction and log inside its
//! span instead of reaching for shared global publishers. Install a
//! subscriber once at startup with [`init_tracing`].
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `SEEKTRACK_LOG_FORMAT=json` | Emit newline-delimited JSON logs. |

use tracing::Span;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// A component's logging context.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    span: Span,
}

impl Diagnostics {
    /// Root context for one pipeline instance.
    pub fn root(name: &str) -> Self {
        Self {
            span: tracing::info_span!("seektrack", pipeline = name),
        }
    }

    /// A context that drops everything; handy in tests.
    pub fn disabled() -> Self {
        Self {
            span: Span::none(),
        }
    }

    /// Derive the context for one component under this one.
    pub fn child(&self, component: &'static str) -> Self {
        Self {
            span: tracing::debug_span!(parent: &self.span, "component", name = component),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::root("default")
    }
}

/// Install the process `tracing` subscriber.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let use_json = std::env::var("SEEKTRACK_LOG_FORMAT").as_deref() == Ok("json");

    let result = if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_twice_is_harmless() {
        init_tracing();
        init_tracing();
    }

    #[test]
    fn child_of_disabled_is_usable() {
        let diag = Diagnostics::disabled().child("tracker");
        let _entered = diag.span().enter();
        tracing::info!("inside a disabled span");
    }
}
