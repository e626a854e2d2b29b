//! Span layer carrying the device context

use tracing::{Subscriber, span};
use tracing_subscriber::{
    layer::{Context, Layer},
    registry::LookupSpan,
};

use crate::context::{DeviceContextData, DeviceContextGuard};

/// Layer that attaches the active device context to new spans
///
/// When a [`DeviceContextGuard`] is active, every span created on that
/// thread carries a [`DeviceContextExtension`], which later layers and
/// formatters can read back.
#[derive(Debug, Default)]
pub struct DeviceContextLayer;

impl DeviceContextLayer {
    pub fn new() -> Self {
        Self
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct DeviceContextExtension {
    pub data: DeviceContextData,
}

impl<S> Layer<S> for DeviceContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id)
            && let Some(device) = DeviceContextGuard::current()
        {
            span.extensions_mut()
                .insert(DeviceContextExtension { data: device });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use inkwell_core::StreamId;
    use tracing_subscriber::Registry;
    use tracing_subscriber::layer::SubscriberExt;

    /// Records the device found on each new span
    struct Recorder {
        seen: Arc<Mutex<Vec<Option<String>>>>,
    }

    impl<S> Layer<S> for Recorder
    where
        S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    {
        fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
            let span = ctx.span(id).unwrap();
            let device = span
                .extensions()
                .get::<DeviceContextExtension>()
                .map(|ext| ext.data.device.clone());
            self.seen.lock().unwrap().push(device);
        }
    }

    #[test]
    fn test_spans_carry_device_context() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let subscriber = Registry::default()
            .with(DeviceContextLayer::new())
            .with(Recorder { seen: seen.clone() });

        let stream_id = StreamId::generate();
        tracing::subscriber::with_default(subscriber, || {
            let _outside = tracing::info_span!("outside").entered();
            let _guard = DeviceContextGuard::new(&stream_id);
            let _inside = tracing::info_span!("inside").entered();
        });

        assert_eq!(*seen.lock().unwrap(), vec![None, Some(stream_id.short())]);
    }
}
