//! Progress reporting from the engine back to the caller.
//!
//! A [`ProgressSink`] is a cheap, cloneable capability. The engine calls
//! [`ProgressSink::report`] from whatever context it runs in; the sink never
//! blocks, so a slow consumer cannot stall generation.

use crate::media::ImageTensor;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One progress update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressEvent {
    pub step: usize,
    pub step_max: usize,
    /// 1-based index of the batch item, 0 outside batch mode
    pub batch: usize,
    pub batch_max: usize,
    /// Intermediate decode, when the engine produces one
    pub partial: Option<ImageTensor>,
    pub message: Option<String>,
}

impl ProgressEvent {
    pub fn step(step: usize, step_max: usize) -> Self {
        Self {
            step,
            step_max,
            ..Default::default()
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }
}

type Callback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Destination for progress events.
#[derive(Clone, Default)]
pub struct ProgressSink {
    callback: Option<Callback>,
}

impl ProgressSink {
    /// A sink that drops every event
    pub fn noop() -> Self {
        Self { callback: None }
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(ProgressEvent) + Send + Sync + 'static,
    {
        Self {
            callback: Some(Arc::new(f)),
        }
    }

    /// A sink backed by an unbounded channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self::from_fn(move |event| {
            // Receiver gone means nobody is listening any more
            let _ = tx.send(event);
        });
        (sink, rx)
    }

    pub fn is_noop(&self) -> bool {
        self.callback.is_none()
    }

    pub fn report(&self, event: ProgressEvent) {
        if let Some(callback) = &self.callback {
            callback(event);
        }
    }

    /// Stamp every event with the batch position before forwarding it.
    pub fn with_batch(&self, batch: usize, batch_max: usize) -> Self {
        let Some(inner) = self.callback.clone() else {
            return Self::noop();
        };
        Self::from_fn(move |mut event| {
            event.batch = batch;
            event.batch_max = batch_max;
            inner(event);
        })
    }

    /// Drop events that arrive after `cancel` fires.
    pub fn until_cancelled(&self, cancel: CancellationToken) -> Self {
        let Some(inner) = self.callback.clone() else {
            return Self::noop();
        };
        Self::from_fn(move |event| {
            if !cancel.is_cancelled() {
                inner(event);
            }
        })
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSink")
            .field("noop", &self.is_noop())
            .finish()
    }
}
