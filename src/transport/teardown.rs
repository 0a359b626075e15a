//! One-shot joint teardown shared by the two halves of a pump.
//!
//! The first loop to fail records its error and cancels the token both
//! loops select on. Later calls are no-ops, so teardown runs at
//! most once no matter how the two loops race.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::ProtocolError;

#[derive(Debug, Default)]
pub(crate) struct Teardown {
    closed: AtomicBool,
    token: CancellationToken,
    cause: Mutex<Option<ProtocolError>>,
}

impl Teardown {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Start teardown. Returns `true` only for the call that actually did it.
    ///
    /// `cause` is `None` when teardown was requested rather than caused by a
    /// failure.
    pub(crate) fn trigger(&self, cause: Option<ProtocolError>) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        if let Some(err) = cause {
            if let Ok(mut slot) = self.cause.lock() {
                *slot = Some(err);
            }
        }
        self.token.cancel();
        true
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once teardown has been triggered.
    pub(crate) async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Take the failure that started teardown, if any.
    pub(crate) fn take_cause(&self) -> Option<ProtocolError> {
        self.cause.lock().ok().and_then(|mut slot| slot.take())
    }
}
