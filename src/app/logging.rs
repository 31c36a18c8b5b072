//! Tracing subscriber setup, custom formatter, dynamic log level reload.

use tracing_subscriber::{reload, EnvFilter};

// Global reload handle for dynamic log level changes (SIGHUP, host-pushed config)
pub type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;
pub static RELOAD_HANDLE: std::sync::OnceLock<ReloadHandle> = std::sync::OnceLock::new();

// Timestamps as "YYYY-MM-DD HH:MM:SS" in local time
struct LocalTimeFormatter;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

// Event lines as "YYYY-MM-DD HH:MM:SS [LEVEL] message"
struct EventFormat;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for EventFormat
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        use tracing_subscriber::fmt::time::FormatTime;

        LocalTimeFormatter.format_time(&mut writer)?;
        write!(writer, " ")?;

        let level = event.metadata().level();
        let level_color = match *level {
            tracing::Level::TRACE => "\x1b[2m",  // Dim/gray
            tracing::Level::DEBUG => "\x1b[34m", // Blue
            tracing::Level::INFO => "\x1b[32m",  // Green
            tracing::Level::WARN => "\x1b[33m",  // Yellow
            tracing::Level::ERROR => "\x1b[31m", // Red
        };
        write!(writer, "{}[{}]\x1b[0m ", level_color, level)?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Initialize the tracing subscriber with reload capability.
pub fn init_tracing(filter: &str) {
    use tracing_subscriber::prelude::*;

    let env_filter = EnvFilter::new(filter);
    let (filter_layer, reload_handle) = reload::Layer::new(env_filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(LocalTimeFormatter)
                .with_target(false)
                .with_level(true)
                .fmt_fields(tracing_subscriber::fmt::format::DefaultFields::new())
                .event_format(EventFormat),
        )
        .init();

    let _ = RELOAD_HANDLE.set(reload_handle);
}

/// Map a user-facing level name to a tracing filter directive.
pub fn filter_for_level(level: &str) -> &'static str {
    match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_levels_fall_back_to_info() {
        assert_eq!(filter_for_level("DEBUG"), "debug");
        assert_eq!(filter_for_level("verbose"), "info");
        assert_eq!(filter_for_level(""), "info");
    }
}
