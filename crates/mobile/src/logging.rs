use std::{panic::PanicHookInfo, sync::Once};

use tracing_subscriber::{filter::FilterFn, layer::SubscriberExt, util::SubscriberInitExt};

pub(crate) fn setup_logging() {
    static LOGGING_SETUP: Once = Once::new();

    LOGGING_SETUP.call_once(|| {
        let filter = FilterFn::new(|metadata| {
            metadata
                .module_path()
                .unwrap_or_default()
                .starts_with("animated_tile")
        });

        #[cfg(target_os = "android")]
        let layer = {
            use tracing_logcat::{LogcatMakeWriter, LogcatTag};
            use tracing_subscriber::fmt::format::Format;

            let tag = LogcatTag::Fixed("AnimatedTile-Rust".to_owned());
            let Ok(writer) = LogcatMakeWriter::new(tag) else {
                return;
            };
            tracing_subscriber::fmt::layer()
                .event_format(Format::default().with_level(false).without_time())
                .with_writer(writer)
                .with_ansi(false)
        };

        #[cfg(not(target_os = "android"))]
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false);

        if tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .try_init()
            .is_ok()
        {
            std::panic::set_hook(Box::new(panic_hook));
        }
    })
}

fn panic_hook(info: &PanicHookInfo) {
    tracing::error!("{info}")
}
