//! Receive filters and bounds for [`StreamActor::next`](super::StreamActor::next).

use std::{fmt, time::Duration};

use crate::frame::{ControlFrame, ServerFrame};

/// Default number of non-matching frames a receive tolerates.
pub const DEFAULT_MAX_IGNORED: usize = 25;
/// Default receive deadline.
pub const DEFAULT_NEXT_TIMEOUT: Duration = Duration::from_secs(5);

/// Which frames a receive returns; everything else is counted and skipped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameFilter {
    /// Any data frame.
    DataOnly,
    /// Data frames produced by the subscription registered for this operation.
    Operation(String),
    /// The connection acknowledgement.
    ConnectionAck,
}

impl FrameFilter {
    pub(crate) fn matches(&self, frame: &ServerFrame) -> bool {
        match (self, frame) {
            (FrameFilter::DataOnly, ServerFrame::Data(_))
            | (FrameFilter::ConnectionAck, ServerFrame::Control(ControlFrame::ConnectionAck)) => {
                true
            }
            (FrameFilter::Operation(name), ServerFrame::Data(data)) => {
                data.operation() == Some(name.as_str())
            }
            _ => false,
        }
    }
}

impl fmt::Display for FrameFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameFilter::DataOnly => f.write_str("data frame"),
            FrameFilter::Operation(name) => write!(f, "{name} data frame"),
            FrameFilter::ConnectionAck => f.write_str("connection_ack"),
        }
    }
}

/// Bounds for one receive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NextOptions {
    pub filter: FrameFilter,
    /// Non-matching frames tolerated before the receive fails.
    pub max_ignored: usize,
    pub timeout: Duration,
}

impl Default for NextOptions {
    fn default() -> Self {
        Self {
            filter: FrameFilter::DataOnly,
            max_ignored: DEFAULT_MAX_IGNORED,
            timeout: DEFAULT_NEXT_TIMEOUT,
        }
    }
}

impl NextOptions {
    /// Wait for data frames of one operation.
    #[must_use]
    pub fn operation(name: impl Into<String>) -> Self {
        Self {
            filter: FrameFilter::Operation(name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: FrameFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_max_ignored(mut self, max_ignored: usize) -> Self {
        self.max_ignored = max_ignored;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
