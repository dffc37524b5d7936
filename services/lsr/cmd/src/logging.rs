use std::fmt;
use std::io::IsTerminal;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_CYAN: &str = "\x1b[36m";
const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_BRIGHT_YELLOW: &str = "\x1b[93m";
const COLOR_BRIGHT_RED: &str = "\x1b[91m";
const COLOR_BRIGHT_GRAY: &str = "\x1b[90m";

/// Column widths for alignment
const SOURCE_WIDTH: usize = 14;
const LOG_LEVEL_WIDTH: usize = 7;

/// Formatter printing `[timestamp] [source] [level] message`.
///
/// Events carrying a `node` field, or raised inside a span that carries one,
/// are attributed to that node. Events with a `component` field are
/// attributed to `lsr-<component>`.
pub struct LsrLogFormatter {
    service_name: String,
    color_enabled: bool,
}

/// Log at info level on behalf of a harness component
#[macro_export]
macro_rules! component_info {
    ($component:expr, $($arg:tt)*) => {
        tracing::info!(component = $component, $($arg)*)
    };
}

/// Log at warn level on behalf of a harness component
#[macro_export]
macro_rules! component_warn {
    ($component:expr, $($arg:tt)*) => {
        tracing::warn!(component = $component, $($arg)*)
    };
}

/// Log at debug level on behalf of a harness component
#[macro_export]
macro_rules! component_debug {
    ($component:expr, $($arg:tt)*) => {
        tracing::debug!(component = $component, $($arg)*)
    };
}

/// Log at error level on behalf of a harness component
#[macro_export]
macro_rules! component_error {
    ($component:expr, $($arg:tt)*) => {
        tracing::error!(component = $component, $($arg)*)
    };
}

impl LsrLogFormatter {
    pub fn new(service_name: String) -> Self {
        Self {
            service_name,
            color_enabled: is_terminal(),
        }
    }

    fn format_source(&self, visitor: &FieldVisitor) -> String {
        let name = match (&visitor.node, &visitor.component) {
            (Some(node), _) => format!("node {}", node),
            (None, Some(component)) => format!("lsr-{}", component),
            (None, None) => self.service_name.clone(),
        };

        if name.chars().count() > SOURCE_WIDTH {
            let truncated: String = name.chars().take(SOURCE_WIDTH - 1).collect();
            format!("{}…", truncated)
        } else {
            format!("{:<width$}", name, width = SOURCE_WIDTH)
        }
    }

    fn format_log_level(&self, level: &tracing::Level) -> String {
        let level_str = match *level {
            tracing::Level::ERROR => "✗ ERROR",
            tracing::Level::WARN => "⚠ WARN",
            tracing::Level::INFO => "ℹ INFO",
            tracing::Level::DEBUG => "◦ DEBUG",
            tracing::Level::TRACE => "◦ TRACE",
        };

        format!("{:<width$}", level_str, width = LOG_LEVEL_WIDTH + 2)
    }

    fn color_for_level(&self, level: &tracing::Level) -> &'static str {
        if !self.color_enabled {
            return "";
        }

        match *level {
            tracing::Level::ERROR => COLOR_BRIGHT_RED,
            tracing::Level::WARN => COLOR_BRIGHT_YELLOW,
            tracing::Level::INFO => COLOR_GREEN,
            tracing::Level::DEBUG | tracing::Level::TRACE => COLOR_BRIGHT_GRAY,
        }
    }
}

impl<S, N> FormatEvent<S, N> for LsrLogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let level = event.metadata().level();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        if visitor.node.is_none() {
            visitor.node = span_node(ctx);
        }

        let color = self.color_for_level(level);
        let reset_color = if self.color_enabled { COLOR_RESET } else { "" };
        let cyan_color = if self.color_enabled { COLOR_CYAN } else { "" };

        write!(
            writer,
            "{}[{}] [{}] [{}{}{}] ",
            cyan_color,
            timestamp,
            self.format_source(&visitor),
            color,
            self.format_log_level(level),
            reset_color
        )?;

        write!(writer, "{}", visitor.message)?;
        for (name, value) in &visitor.extra {
            write!(writer, " {}={}", name, value)?;
        }
        writeln!(writer, "{}", reset_color)
    }
}

/// Collects the message, the attribution fields and any remaining key/value pairs
#[derive(Default)]
struct FieldVisitor {
    message: String,
    component: Option<String>,
    node: Option<String>,
    extra: Vec<(&'static str, String)>,
}

impl FieldVisitor {
    fn store(&mut self, field: &tracing::field::Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            "component" => self.component = Some(value),
            "node" => self.node = Some(value),
            name => self.extra.push((name, value)),
        }
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        let mut rendered = format!("{:?}", value);
        if rendered.len() >= 2 && rendered.starts_with('"') && rendered.ends_with('"') {
            rendered = rendered[1..rendered.len() - 1].to_string();
        }
        self.store(field, rendered);
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.store(field, value.to_string());
    }
}

/// Innermost `node=` field recorded on the event's span scope
fn span_node<S, N>(ctx: &FmtContext<'_, S, N>) -> Option<String>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    let scope = ctx.event_scope()?;
    for span in scope {
        let extensions = span.extensions();
        let Some(fields) = extensions.get::<FormattedFields<N>>() else {
            continue;
        };
        if let Some(node) = node_field(fields.as_str()) {
            return Some(node.to_string());
        }
    }
    None
}

fn node_field(fields: &str) -> Option<&str> {
    fields
        .split_whitespace()
        .find_map(|pair| pair.strip_prefix("node="))
        .map(|value| value.trim_matches('"'))
}

fn is_terminal() -> bool {
    if std::env::var("TERM").unwrap_or_default() == "dumb" {
        return false;
    }
    std::io::stdout().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_prefers_node_over_component() {
        let formatter = LsrLogFormatter {
            service_name: "lsr".to_string(),
            color_enabled: false,
        };

        let visitor = FieldVisitor {
            component: Some("sim".to_string()),
            node: Some("A".to_string()),
            ..FieldVisitor::default()
        };
        assert_eq!(formatter.format_source(&visitor).trim_end(), "node A");

        let visitor = FieldVisitor {
            component: Some("sim".to_string()),
            ..FieldVisitor::default()
        };
        assert_eq!(formatter.format_source(&visitor).trim_end(), "lsr-sim");

        let visitor = FieldVisitor::default();
        assert_eq!(formatter.format_source(&visitor).len(), SOURCE_WIDTH);
    }

    #[test]
    fn node_field_is_found_among_span_fields() {
        assert_eq!(node_field("node=A"), Some("A"));
        assert_eq!(node_field("port=3 node=\"r1\""), Some("r1"));
        assert_eq!(node_field("port=3"), None);
    }

    #[test]
    fn long_sources_are_truncated() {
        let formatter = LsrLogFormatter {
            service_name: "lsr".to_string(),
            color_enabled: false,
        };
        let visitor = FieldVisitor {
            node: Some("a-very-long-router-name".to_string()),
            ..FieldVisitor::default()
        };
        let source = formatter.format_source(&visitor);
        assert_eq!(source.chars().count(), SOURCE_WIDTH);
        assert!(source.ends_with('…'));
    }
}
