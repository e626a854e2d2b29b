//! Device context injection
//!
//! Thread-local storage for the identity of the device doing the work, so
//! logs from several journals in one process (tests, tools that open two
//! data directories) can be told apart.

use std::cell::RefCell;

use inkwell_core::StreamId;
use uuid::Uuid;

/// Device context data stored in thread-local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceContextData {
    /// Short form of the device's stream id
    pub device: String,
    /// Full stream id
    pub stream_id: StreamId,
    /// Unique id for this process session
    pub session_id: Uuid,
}

thread_local! {
    static DEVICE_CONTEXT: RefCell<Option<DeviceContextData>> = const { RefCell::new(None) };
}

/// RAII guard for device context
///
/// Sets the device context for the current thread; dropping it restores the
/// previous context (if any).
///
/// # Example
///
/// ```ignore
/// use inkwell_logging::DeviceContextGuard;
///
/// let _guard = DeviceContextGuard::new(&journal.stream_id());
///
/// // Spans created in this scope carry the device
/// tracing::info!("Syncing");
/// ```
pub struct DeviceContextGuard {
    previous: Option<DeviceContextData>,
}

impl DeviceContextGuard {
    /// Create a new device context guard with a fresh session id
    pub fn new(stream_id: &StreamId) -> Self {
        Self::with_session_id(stream_id, Uuid::now_v7())
    }

    /// Create a guard with a specific session id
    pub fn with_session_id(stream_id: &StreamId, session_id: Uuid) -> Self {
        let context = DeviceContextData {
            device: stream_id.short(),
            stream_id: *stream_id,
            session_id,
        };
        let previous = DEVICE_CONTEXT.with(|ctx| ctx.borrow_mut().replace(context));

        Self { previous }
    }

    /// Get the current device context (if any)
    pub fn current() -> Option<DeviceContextData> {
        DEVICE_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Get the current device (if set)
    pub fn current_device() -> Option<String> {
        Self::current().map(|ctx| ctx.device)
    }
}

impl Drop for DeviceContextGuard {
    fn drop(&mut self) {
        DEVICE_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}
