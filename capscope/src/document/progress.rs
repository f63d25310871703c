//! Progress reporting for long-running document operations.

use crossbeam_channel::Sender;
use std::fmt;
use std::sync::Arc;

/// One progress report: fraction in `[0, 1]` and a stage label.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub fraction: f64,
    pub message: String,
}

pub type ProgressFn = dyn Fn(f64, &str) + Send + Sync;

/// Where progress reports go.
#[derive(Clone, Default)]
pub enum ProgressSink {
    #[default]
    None,
    Callback(Arc<ProgressFn>),
    Channel(Sender<ProgressUpdate>),
}

impl ProgressSink {
    pub fn callback(f: impl Fn(f64, &str) + Send + Sync + 'static) -> Self {
        Self::Callback(Arc::new(f))
    }

    #[must_use]
    pub fn channel(sender: Sender<ProgressUpdate>) -> Self {
        Self::Channel(sender)
    }

    pub fn report(&self, fraction: f64, message: &str) {
        let fraction = fraction.clamp(0.0, 1.0);
        match self {
            Self::None => {}
            Self::Callback(f) => f(fraction, message),
            Self::Channel(tx) => {
                // A dropped receiver just means nobody is watching any more.
                let _ = tx.send(ProgressUpdate { fraction, message: message.to_string() });
            }
        }
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("ProgressSink::None"),
            Self::Callback(_) => f.write_str("ProgressSink::Callback"),
            Self::Channel(_) => f.write_str("ProgressSink::Channel"),
        }
    }
}
