//! CLI command implementations
//!
//! Each command opens a registry from the configuration, replaying the
//! journal when one is configured, then talks line-delimited JSON.

use std::io::{BufRead, Write};

use serde::Serialize;

use super::args::Command;
use super::config::Config;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_response};
use crate::api::{ApiError, ApiHandler, Response};
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::registry::Registry;

/// Open the registry described by `config`
pub fn open_registry(config: &Config) -> CliResult<Registry> {
    Logger::set_min_severity(config.log_severity()?);
    Registry::open(config.registry_config()).map_err(CliError::open_failed)
}

/// Run one command against stdin/stdout
pub fn run_command(command: &Command, config: &Config) -> CliResult<()> {
    let registry = open_registry(config)?;
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut input = stdin.lock();
    let mut output = stdout.lock();

    match command {
        Command::Serve => serve(&registry, &mut input, &mut output).map(|_| ()),
        Command::Exec => exec(&registry, &mut input, &mut output),
        Command::Check => check(&registry, &mut output),
    }
}

/// Answer requests until EOF; returns how many were handled
pub fn serve<R: BufRead, W: Write>(
    registry: &Registry,
    input: &mut R,
    output: &mut W,
) -> CliResult<u64> {
    let handler = ApiHandler::new(registry);
    log_event_with_fields(
        Event::Serving,
        &[("durable", if registry.is_durable() { "true" } else { "false" })],
    );

    let mut handled = 0u64;
    while let Some(line) = read_request(input)? {
        let response = handler.handle(&line);
        write_response(output, &response)?;
        handled += 1;
    }

    log_event_with_fields(Event::ShutdownComplete, &[("requests", &handled.to_string())]);
    Ok(handled)
}

/// Answer exactly one request
pub fn exec<R: BufRead, W: Write>(
    registry: &Registry,
    input: &mut R,
    output: &mut W,
) -> CliResult<()> {
    let response = match read_request(input)? {
        Some(line) => ApiHandler::new(registry).handle(&line),
        None => Response::error(&ApiError::invalid_request("Empty input")),
    };
    write_response(output, &response)
}

#[derive(Debug, Clone, Serialize)]
struct StreamSummary {
    stream_name: String,
    stream_status: String,
    open_shards: usize,
    closed_shards: usize,
}

#[derive(Debug, Clone, Serialize)]
struct CheckSummary {
    durable: bool,
    streams: Vec<StreamSummary>,
    journal_entries_replayed: u64,
}

/// Print one JSON summary of the replayed registry
pub fn check<W: Write>(registry: &Registry, output: &mut W) -> CliResult<()> {
    let names = registry
        .list_all_stream_names(registry.config().default_list_limit)
        .map_err(CliError::open_failed)?;

    let mut streams = Vec::with_capacity(names.len());
    for name in names {
        let description = registry.describe_stream(&name).map_err(CliError::open_failed)?;
        let open_shards = description.shards.iter().filter(|s| s.is_open()).count();
        streams.push(StreamSummary {
            stream_name: description.stream_name,
            stream_status: description.stream_status.as_str().to_string(),
            open_shards,
            closed_shards: description.shards.len() - open_shards,
        });
    }

    let summary = CheckSummary {
        durable: registry.is_durable(),
        streams,
        journal_entries_replayed: registry.replayed_entries(),
    };
    let json = serde_json::to_string(&summary)
        .map_err(|e| CliError::io_error(format!("JSON error: {}", e)))?;
    writeln!(output, "{}", json)?;
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use serde_json::Value;

    use crate::stream::Encryption;

    fn lines(out: Vec<u8>) -> Vec<Value> {
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_serve_answers_each_line() {
        let registry = Registry::new();
        let mut input = Cursor::new(
            "{\"op\":\"create_stream\",\"stream_name\":\"s\",\"shard_count\":1}\n\n\
             {\"op\":\"list_streams\"}\n\
             {\"op\":\"nope\"}\n",
        );
        let mut out = Vec::new();
        assert_eq!(serve(&registry, &mut input, &mut out).unwrap(), 3);

        let responses = lines(out);
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[1]["data"]["stream_names"][0], "s");
        assert_eq!(responses[2]["code"], "UNKNOWN_OPERATION");
    }

    #[test]
    fn test_exec_empty_input() {
        let registry = Registry::new();
        let mut out = Vec::new();
        exec(&registry, &mut Cursor::new(""), &mut out).unwrap();
        assert_eq!(lines(out)[0]["code"], "INVALID_REQUEST");
    }

    #[test]
    fn test_check_after_replay() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        {
            let registry = open_registry(&config).unwrap();
            registry.create_stream("a", 2, Encryption::None).unwrap();
            registry.put_record("a", "k", b"v").unwrap();
        }

        let registry = open_registry(&config).unwrap();
        let mut out = Vec::new();
        check(&registry, &mut out).unwrap();
        let summary = &lines(out)[0];
        assert_eq!(summary["durable"], true);
        assert_eq!(summary["streams"][0]["stream_name"], "a");
        assert_eq!(summary["streams"][0]["open_shards"], 2);
        assert_eq!(summary["journal_entries_replayed"], 2);
    }
}
