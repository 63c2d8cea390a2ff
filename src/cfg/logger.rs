// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashMap, fmt::Debug, fs, path::Path, sync::Arc};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{Event, Subscriber};
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter,
    fmt::{
        self, FmtContext, FormatEvent, FormatFields, FormattedFields,
        format::{JsonFields, Writer},
    },
    layer::SubscriberExt,
};

/// Environment variable that redirects warnings: `stderr`, `stdout` or a
/// file path.
pub const WARNINGS_ENV: &str = "SCSI_PT_WARNINGS";

// Config logger
#[derive(Debug, Deserialize, Clone)]
struct LoggerConfig {
    logger: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
struct LogConfig {
    level: String,
    output: String,
    #[serde(default)]
    format: LogFormat,
    #[serde(default)]
    is_show_line: bool,
    #[serde(default)]
    is_show_module_path: bool,
    #[serde(default)]
    is_show_target: bool,
    file: Option<LogFileConfig>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
struct LogFileConfig {
    path: String,
    rotation_frequency: Option<String>,
}

// Define custom layer for reading tracing events in json format
struct JsonFormatter {
    config: Arc<LogConfig>,
}

impl JsonFormatter {
    fn new(config: Arc<LogConfig>) -> Self {
        Self { config }
    }
}

#[derive(Serialize)]
struct LogEntry {
    timestamp: String,
    level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    module_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
    fields: serde_json::Map<String, serde_json::Value>,
}

impl LogEntry {
    fn new(
        config: &LogConfig,
        event: &Event,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: event.metadata().level().to_string(),
            target: config
                .is_show_target
                .then(|| event.metadata().target().to_string()),
            module_path: config
                .is_show_module_path
                .then(|| event.metadata().module_path().unwrap_or("").to_string()),
            line: if config.is_show_line {
                event.metadata().line()
            } else {
                None
            },
            fields,
        }
    }
}

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);

        let mut fields = visitor.fields;

        if let Some(scope) = ctx.event_scope() {
            let mut span_names = vec![];
            for span in scope.from_root() {
                span_names.push(span.name().to_string());
                if let Some(ext) = span.extensions().get::<FormattedFields<JsonFields>>()
                {
                    let v: HashMap<String, Value> =
                        serde_json::from_str(&ext.fields).unwrap_or_default();
                    fields.extend(v);
                }
            }
            fields.insert("span_names".to_string(), json!(span_names));
        }

        let log_entry = LogEntry::new(&self.config, event, fields);
        writeln!(
            writer,
            "{}",
            serde_json::to_string(&log_entry).map_err(|_| std::fmt::Error)?
        )
    }
}

#[derive(Default)]
struct JsonVisitor {
    fields: serde_json::Map<String, serde_json::Value>,
}

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(
        &mut self,
        field: &tracing::field::Field,
        value: &dyn std::fmt::Debug,
    ) {
        self.fields
            .insert(field.name().to_string(), json!(format!("{:?}", value)));
    }
}

fn split_path(path: &str) -> (String, String) {
    let path = Path::new(path);
    let directory = path
        .parent()
        .and_then(|p| p.to_str())
        .unwrap_or("")
        .to_string();
    let file_name = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("")
        .to_string();
    (directory, file_name)
}

fn file_writer(path: &str, rotation: Option<&str>) -> (NonBlocking, WorkerGuard) {
    let rotation = match rotation {
        Some("minutely") => Rotation::MINUTELY,
        Some("hourly") => Rotation::HOURLY,
        Some("daily") => Rotation::DAILY,
        _ => Rotation::NEVER,
    };
    let (dir, name) = split_path(path);
    let file_appender = RollingFileAppender::new(rotation, dir, name);
    tracing_appender::non_blocking(file_appender)
}

/// Writer for an output name: `stdout`, `stderr`, or a file path.
fn named_writer(dest: &str) -> (NonBlocking, WorkerGuard) {
    match dest {
        "stdout" => tracing_appender::non_blocking(std::io::stdout()),
        "stderr" | "" => tracing_appender::non_blocking(std::io::stderr()),
        path => file_writer(path, None),
    }
}

fn writer_for(config: &LogConfig) -> Result<(NonBlocking, WorkerGuard)> {
    if let Ok(dest) = std::env::var(WARNINGS_ENV) {
        return Ok(named_writer(dest.trim()));
    }
    Ok(match config.output.as_str() {
        "stdout" | "stderr" => named_writer(&config.output),
        "file" => {
            let cfg = config
                .file
                .as_ref()
                .context("Failed to find log config file")?;
            file_writer(&cfg.path, cfg.rotation_frequency.as_deref())
        },
        other => bail!("Invalid log output specified: {other}"),
    })
}

fn install(config: LogConfig) -> Result<WorkerGuard> {
    let (writer, guard) = writer_for(&config)?;
    let env_filter = EnvFilter::try_new(&config.level)
        .context("Failed to parse log level from config")?;

    let res = match config.format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .json()
                .event_format(JsonFormatter::new(Arc::new(config.clone())))
                .fmt_fields(JsonFields::default());
            tracing::subscriber::set_global_default(
                tracing_subscriber::registry().with(env_filter).with(layer),
            )
        },
        LogFormat::Text => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(config.is_show_target)
                .with_line_number(config.is_show_line)
                .with_file(config.is_show_module_path);
            tracing::subscriber::set_global_default(
                tracing_subscriber::registry().with(env_filter).with(layer),
            )
        },
    };
    res.context("Failed to set global default subscriber")?;
    Ok(guard)
}

/// Install the global subscriber from a YAML logger config.
pub fn init_logger(config_path: &str) -> Result<WorkerGuard> {
    let config_content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {config_path}"))?;
    let config: LoggerConfig = serde_yaml::from_str(&config_content)
        .with_context(|| format!("Failed to parse config file: {config_path}"))?;
    install(config.logger)
}

/// Plain-text stderr logger whose level follows the `-v` count.
pub fn init_default_logger(verbosity: i32) -> Result<WorkerGuard> {
    install(LogConfig {
        level: level_for_verbosity(verbosity).to_string(),
        output: "stderr".to_string(),
        format: LogFormat::Text,
        is_show_line: false,
        is_show_module_path: false,
        is_show_target: false,
        file: None,
    })
}

pub fn level_for_verbosity(verbosity: i32) -> &'static str {
    match verbosity {
        i32::MIN..=0 => "warn",
        1 => "info",
        2 | 3 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml_with_defaults() {
        let cfg: LoggerConfig = serde_yaml::from_str(
            "logger:\n  level: debug\n  output: file\n  format: json\n  file:\n    path: /tmp/pt/log.jsonl\n",
        )
        .expect("yaml");
        assert_eq!(cfg.logger.format, LogFormat::Json);
        assert!(!cfg.logger.is_show_line);
        assert_eq!(
            split_path(&cfg.logger.file.expect("file").path),
            ("/tmp/pt".to_string(), "log.jsonl".to_string())
        );
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for_verbosity(0), "warn");
        assert_eq!(level_for_verbosity(2), "debug");
        assert_eq!(level_for_verbosity(7), "trace");
    }
}
