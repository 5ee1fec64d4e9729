use crate::input_file::InputFile;
use crate::verbosity::Verbosity;
use anyhow::{Context, Error, Result, anyhow};
use batchfetch_lib::{
    DEFAULT_CONCURRENCY, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_RETRY_WAIT_TIME_SECS, DEFAULT_USER_AGENT,
};
use clap::builder::PossibleValuesParser;
use clap::{Parser, builder::TypedValueParser};
use const_format::{concatcp, formatcp};
use http::{
    HeaderMap,
    header::{HeaderName, HeaderValue},
};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::Path;
use std::{fs, path::PathBuf, str::FromStr};
use strum::{Display, EnumString, VariantNames};

pub(crate) const BATCHFETCH_CONFIG_FILE: &str = "batchfetch.toml";

/// Size at which the log file is rotated, 10 MiB
pub(crate) const DEFAULT_LOG_MAX_BYTES: u64 = 10 * 1024 * 1024;
/// Number of rotated log files kept next to the log file
pub(crate) const DEFAULT_LOG_BACKUP_COUNT: usize = 5;

// this exists because clap requires `&str` type values for defaults
// whereas serde expects owned `String` types
const CONCURRENCY_STR: &str = concatcp!(DEFAULT_CONCURRENCY);
const MAX_ATTEMPTS_STR: &str = concatcp!(DEFAULT_MAX_ATTEMPTS);
const RETRY_WAIT_TIME_STR: &str = concatcp!(DEFAULT_RETRY_WAIT_TIME_SECS);
const CONNECT_TIMEOUT_STR: &str = concatcp!(DEFAULT_CONNECT_TIMEOUT_SECS);
const LOG_MAX_BYTES_STR: &str = concatcp!(DEFAULT_LOG_MAX_BYTES);
const LOG_BACKUP_COUNT_STR: &str = concatcp!(DEFAULT_LOG_BACKUP_COUNT);
// We use a custom help message here because we want to show the default
// value of the config file, but also be able to check if the user has
// provided a custom value. If they didn't, we won't throw an error if
// the file doesn't exist.
const HELP_MSG_CONFIG_FILE: &str = formatcp!(
    "Configuration file to use\n\n[default: {}]",
    BATCHFETCH_CONFIG_FILE,
);

/// The format to use for the per-URL results and the summary
#[derive(
    Debug, Deserialize, Default, Clone, Copy, Display, EnumString, VariantNames, PartialEq, Eq,
)]
#[non_exhaustive]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub(crate) enum OutputFormat {
    /// One line per URL, followed by a summary line
    #[default]
    Plain,
    /// A single JSON document with all bodies and the summary
    Json,
}

/// How log lines are rendered
#[derive(
    Debug, Deserialize, Default, Clone, Copy, Display, EnumString, VariantNames, PartialEq, Eq,
)]
#[non_exhaustive]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub(crate) enum LogFormat {
    /// `[LEVEL] message`
    #[default]
    Plain,
    /// `<RFC 3339 timestamp> [LEVEL] message`
    Timestamped,
}

/// Where log messages go and what they look like.
///
/// In a config file this is the `[log]` table.
#[derive(clap::Args, Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct LogConfig {
    /// Also write log messages to this file.
    /// Missing parent directories are created.
    #[arg(id = "log_file", long = "log-file", value_name = "PATH")]
    #[serde(default)]
    pub(crate) file: Option<PathBuf>,

    /// Do not write log messages to stderr
    #[arg(id = "no_console_log", long = "no-console-log")]
    #[serde(default)]
    pub(crate) no_console: bool,

    /// Format of log messages
    #[arg(id = "log_format", long = "log-format", default_value = "plain", value_parser = PossibleValuesParser::new(LogFormat::VARIANTS).map(|s| s.parse::<LogFormat>().unwrap()))]
    #[serde(default)]
    pub(crate) format: LogFormat,

    /// Rotate the log file once it would grow beyond this many bytes.
    /// 0 disables rotation
    #[arg(id = "log_max_bytes", long = "log-max-bytes", value_name = "BYTES", default_value = &LOG_MAX_BYTES_STR)]
    #[serde(default = "log_max_bytes")]
    pub(crate) max_bytes: u64,

    /// Number of rotated log files to keep (`<file>.1` is the newest)
    #[arg(id = "log_backup_count", long = "log-backup-count", value_name = "COUNT", default_value = &LOG_BACKUP_COUNT_STR)]
    #[serde(default = "log_backup_count")]
    pub(crate) backup_count: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: None,
            no_console: false,
            format: LogFormat::default(),
            max_bytes: DEFAULT_LOG_MAX_BYTES,
            backup_count: DEFAULT_LOG_BACKUP_COUNT,
        }
    }
}

// Macro for generating default functions to be used by serde
macro_rules! default_function {
    ( $( $name:ident : $T:ty = $e:expr; )* ) => {
        $(
            #[allow(clippy::missing_const_for_fn)]
            fn $name() -> $T {
                $e
            }
        )*
    };
}

// Generate the functions for serde defaults
default_function! {
    concurrency: usize = DEFAULT_CONCURRENCY;
    max_attempts: u32 = DEFAULT_MAX_ATTEMPTS;
    retry_wait_time: u64 = DEFAULT_RETRY_WAIT_TIME_SECS;
    connect_timeout: u64 = DEFAULT_CONNECT_TIMEOUT_SECS;
    user_agent: String = DEFAULT_USER_AGENT.to_string();
    verbosity: Verbosity = Verbosity::default();
    log_max_bytes: u64 = DEFAULT_LOG_MAX_BYTES;
    log_backup_count: usize = DEFAULT_LOG_BACKUP_COUNT;
}

// Macro for merging configuration values
macro_rules! fold_in {
    ($cli:ident , $toml:ident ; $ty:ident { $(..$ignore:ident,)* $( $key:ident : $default:expr, )* } ) => {
        if (false) {
            #[allow(dead_code, unused, clippy::diverging_sub_expression)]
            let _check_fold_in_exhaustivity = $ty {
                $($key: unreachable!(), )*
                $($ignore: unreachable!(), )*
            };
        };
        $(
            if $cli.$key == $default && $toml.$key != $default {
                $cli.$key = $toml.$key;
            }
        )*
    };
}

/// Parse a single header into a [`HeaderName`] and [`HeaderValue`]
///
/// Headers are expected to be in format `Header-Name: Header-Value`.
/// The header name and value are trimmed of whitespace.
///
/// If the header contains multiple colons, the part after the first colon is
/// considered the value.
///
/// # Errors
///
/// This fails if the header does not contain a `:` character or
/// if the header name contains non-ASCII characters.
fn parse_single_header(header: &str) -> Result<(HeaderName, HeaderValue)> {
    let parts: Vec<&str> = header.splitn(2, ':').collect();
    match parts.as_slice() {
        [name, value] => {
            let name = name.trim();
            let name = HeaderName::from_str(name)
                .map_err(|e| anyhow!("Unable to convert header name '{name}': {e}"))?;
            let value = HeaderValue::from_str(value.trim())
                .map_err(|e| anyhow!("Unable to read value of header with name '{name}': {e}"))?;
            Ok((name, value))
        }
        _ => Err(anyhow!(
            "Invalid header format. Expected colon-separated string in the format 'HeaderName: HeaderValue'"
        )),
    }
}

/// Parses a single HTTP header into a tuple of (String, String)
///
/// This does NOT merge multiple headers into one.
#[derive(Clone, Debug)]
struct HeaderParser;

impl TypedValueParser for HeaderParser {
    type Value = (String, String);

    fn parse_ref(
        &self,
        _cmd: &clap::Command,
        _arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let header_str = value.to_str().ok_or_else(|| {
            clap::Error::raw(
                clap::error::ErrorKind::InvalidValue,
                "Header value contains invalid UTF-8",
            )
        })?;

        match parse_single_header(header_str) {
            Ok((name, value)) => {
                let Ok(value) = value.to_str() else {
                    return Err(clap::Error::raw(
                        clap::error::ErrorKind::InvalidValue,
                        "Header value contains invalid UTF-8",
                    ));
                };

                Ok((name.to_string(), value.to_string()))
            }
            Err(e) => Err(clap::Error::raw(
                clap::error::ErrorKind::InvalidValue,
                e.to_string(),
            )),
        }
    }
}

impl clap::builder::ValueParserFactory for HeaderParser {
    type Parser = HeaderParser;
    fn value_parser() -> Self::Parser {
        HeaderParser
    }
}

/// Extension trait for converting a Vec of header pairs to a `HeaderMap`
pub(crate) trait HeaderMapExt {
    /// Convert a collection of header key-value pairs to a `HeaderMap`
    fn from_header_pairs(headers: &[(String, String)]) -> Result<HeaderMap, Error>;
}

impl HeaderMapExt for HeaderMap {
    fn from_header_pairs(headers: &[(String, String)]) -> Result<HeaderMap, Error> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| anyhow!("Invalid header name '{name}': {e}"))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| anyhow!("Invalid header value '{value}': {e}"))?;
            header_map.insert(header_name, header_value);
        }
        Ok(header_map)
    }
}

/// batchfetch fetches a list of URLs concurrently and reports which of them
/// returned a body.
///
/// Every URL is fetched with a GET request. At most `--concurrency` requests
/// are in flight at any time. Failed requests are retried with exponential
/// backoff, and connections are reused across requests.
#[derive(Parser, Debug)]
#[command(version, about, next_display_order = None)]
pub(crate) struct BatchFetchOptions {
    /// URLs to fetch
    #[arg(
        name = "urls",
        required_unless_present = "input_file",
        long_help = "URLs to fetch, in the order their results are reported.
Alternatively, use `--input-file` to read URLs from a file.

NOTE: Use `--` to separate URLs from options that allow multiple arguments."
    )]
    raw_urls: Vec<String>,

    /// Configuration file to use
    #[arg(long = "config")]
    #[arg(help = HELP_MSG_CONFIG_FILE)]
    pub(crate) config_file: Option<PathBuf>,

    #[clap(flatten)]
    pub(crate) config: Config,
}

impl BatchFetchOptions {
    /// All URLs of the batch: those given as arguments first,
    /// then the contents of every input file in the order given.
    pub(crate) fn urls(&self) -> Result<Vec<String>> {
        let mut urls = self.raw_urls.clone();
        for path in &self.config.input_file {
            let input = InputFile::try_from(path.as_path())
                .context("Cannot read URLs from --input-file")?;
            urls.extend(input.urls);
        }
        Ok(urls)
    }
}

// Custom deserializer function for the header field
fn deserialize_headers<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    let map = HashMap::<String, String>::deserialize(deserializer)?;
    Ok(map.into_iter().collect())
}

/// The main configuration for batchfetch
#[derive(Parser, Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// Read URLs from the given file or stdin (if path is '-').
    #[arg(
        short,
        long,
        value_name = "PATH",
        action = clap::ArgAction::Append,
        long_help = "Read URLs from the given file or stdin (if path is '-').

Can be passed multiple times. URLs from files are fetched after the URLs
given as arguments.

File Format:
- Each line should contain one URL.
- Lines starting with '#' are treated as comments and ignored.
- Empty lines are also ignored."
    )]
    #[serde(default)]
    pub(crate) input_file: Vec<PathBuf>,

    /// Verbose program output
    #[clap(flatten)]
    #[serde(default = "verbosity")]
    pub(crate) verbose: Verbosity,

    /// Maximum number of requests in flight at the same time
    #[arg(short, long, default_value = &CONCURRENCY_STR)]
    #[serde(default = "concurrency")]
    pub(crate) concurrency: usize,

    /// Maximum number of attempts per URL before giving up on it
    #[arg(long, default_value = &MAX_ATTEMPTS_STR)]
    #[serde(default = "max_attempts")]
    pub(crate) max_attempts: u32,

    /// Wait time in seconds before the first retry of a failed request.
    /// Doubles with every further retry
    #[arg(short, long, default_value = &RETRY_WAIT_TIME_STR)]
    #[serde(default = "retry_wait_time")]
    pub(crate) retry_wait_time: u64,

    /// Timeout in seconds for establishing a connection
    #[arg(long, default_value = &CONNECT_TIMEOUT_STR)]
    #[serde(default = "connect_timeout")]
    pub(crate) connect_timeout: u64,

    /// Set custom header for requests
    #[arg(
        short = 'H',
        long,
        action = clap::ArgAction::Append,
        value_parser = HeaderParser,
        value_name = "HEADER:VALUE",
        long_help = "Set custom header for requests

Specify custom headers in the format 'Name: Value'. For example, 'Accept: text/html'.
This is the same format that other tools like curl or wget use.
Multiple headers can be specified by using the flag multiple times.
The specified headers are used for ALL requests."
    )]
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_headers")]
    pub(crate) header: Vec<(String, String)>,

    /// User agent
    #[arg(short, long, default_value = DEFAULT_USER_AGENT)]
    #[serde(default = "user_agent")]
    pub(crate) user_agent: String,

    /// Proceed for server connections considered insecure (invalid TLS)
    #[arg(long)]
    #[serde(default)]
    pub(crate) insecure: bool,

    /// Output format of the results
    #[arg(short, long, default_value = "plain", value_parser = PossibleValuesParser::new(OutputFormat::VARIANTS).map(|s| s.parse::<OutputFormat>().unwrap()))]
    #[serde(default)]
    pub(crate) format: OutputFormat,

    /// Write the results to this file instead of stdout
    #[arg(short, long, value_parser)]
    #[serde(default)]
    pub(crate) output: Option<PathBuf>,

    /// Logging destinations and format
    #[clap(flatten)]
    #[serde(default)]
    pub(crate) log: LogConfig,
}

impl Config {
    /// Special handling for merging headers
    ///
    /// Overwrites existing headers in `self` with the values from `other`.
    fn merge_headers(&mut self, other: &[(String, String)]) {
        let self_map = self.header.iter().cloned().collect::<HashMap<_, _>>();
        let other_map = other.iter().cloned().collect::<HashMap<_, _>>();

        // Merge the two maps, with `other` taking precedence
        let merged_map: HashMap<_, _> = self_map.into_iter().chain(other_map).collect();

        // Convert the merged map back to a Vec of tuples
        self.header = merged_map.into_iter().collect();
    }

    /// Load configuration from a file
    pub(crate) fn load_from_file(path: &Path) -> Result<Config> {
        // Read configuration file
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).with_context(|| "Failed to parse configuration file")
    }

    /// Merge the configuration from TOML into the CLI configuration
    pub(crate) fn merge(&mut self, toml: Config) {
        // Special handling for headers before fold_in!
        self.merge_headers(&toml.header);
        self.log.merge(toml.log);

        // NOTE: if you see an error within this macro call, check to make sure that
        // that the fields provided to fold_in! match all the fields of the Config struct.
        fold_in! {
            // Destination and source configs
            self, toml;

            Config {
                // Keys which are handled outside of fold_in
                ..header,
                ..log,

                // Keys with defaults to assign
                concurrency: DEFAULT_CONCURRENCY,
                connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
                format: OutputFormat::default(),
                input_file: Vec::<PathBuf>::new(),
                insecure: false,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                output: None,
                retry_wait_time: DEFAULT_RETRY_WAIT_TIME_SECS,
                user_agent: DEFAULT_USER_AGENT,
                verbose: Verbosity::default(),
            }
        }
    }
}

impl LogConfig {
    /// Merge the `[log]` table of a config file into the CLI log settings,
    /// key by key
    fn merge(&mut self, toml: LogConfig) {
        fold_in! {
            self, toml;

            LogConfig {
                backup_count: DEFAULT_LOG_BACKUP_COUNT,
                file: None,
                format: LogFormat::default(),
                max_bytes: DEFAULT_LOG_MAX_BYTES,
                no_console: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    fn parse(args: &[&str]) -> BatchFetchOptions {
        BatchFetchOptions::parse_from(std::iter::once("batchfetch").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_custom_headers() {
        assert_eq!(
            parse_single_header("accept:text/html").unwrap(),
            (
                HeaderName::from_static("accept"),
                HeaderValue::from_static("text/html")
            )
        );
    }

    #[test]
    fn test_parse_custom_header_multiple_colons() {
        assert_eq!(
            parse_single_header("key:x-test:check=this").unwrap(),
            (
                HeaderName::from_static("key"),
                HeaderValue::from_static("x-test:check=this")
            )
        );
    }

    #[test]
    /// We should not reveal potentially sensitive data contained in the headers.
    fn test_does_not_echo_sensitive_data() {
        let error = parse_single_header("My-Header💣: secret")
            .expect_err("Should not allow unicode as key");
        assert!(!error.to_string().contains("secret"));

        let error = parse_single_header("secret").expect_err("Should fail when no `:` given");
        assert!(!error.to_string().contains("secret"));
    }

    #[test]
    fn test_defaults() {
        let opts = parse(&["https://example.com"]);

        assert_eq!(opts.config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(opts.config.max_attempts, 3);
        assert_eq!(opts.config.retry_wait_time, 1);
        assert_eq!(opts.config.format, OutputFormat::Plain);
        assert_eq!(opts.config.log, LogConfig::default());
        assert_eq!(opts.urls().unwrap(), vec!["https://example.com"]);
    }

    #[test]
    fn test_header_parsing_and_merging() {
        let opts = parse(&[
            "--header",
            "Accept: text/html",
            "-H",
            "X-Test: check=this",
            "https://example.com",
        ]);

        let headers = &opts.config.header;
        assert_eq!(headers.len(), 2);

        let header_map: HashMap<String, String> = headers.iter().cloned().collect();
        assert_eq!(header_map["accept"], "text/html");
        assert_eq!(header_map["x-test"], "check=this");
    }

    #[test]
    fn test_log_options() {
        let opts = parse(&[
            "--log-file",
            "logs/batch.log",
            "--no-console-log",
            "--log-format",
            "timestamped",
            "--log-max-bytes",
            "4096",
            "--log-backup-count",
            "2",
            "--format",
            "json",
            "https://example.com",
        ]);

        assert_eq!(opts.config.format, OutputFormat::Json);
        assert_eq!(
            opts.config.log,
            LogConfig {
                file: Some(PathBuf::from("logs/batch.log")),
                no_console: true,
                format: LogFormat::Timestamped,
                max_bytes: 4096,
                backup_count: 2,
            }
        );
    }

    #[test]
    fn test_log_rotation_defaults() {
        let opts = parse(&["https://example.com"]);

        assert_eq!(opts.config.log.max_bytes, 10 * 1024 * 1024);
        assert_eq!(opts.config.log.backup_count, 5);

        let toml: Config = toml::from_str("[log]\nfile = \"batch.log\"\n").unwrap();
        assert_eq!(toml.log.max_bytes, DEFAULT_LOG_MAX_BYTES);
        assert_eq!(toml.log.backup_count, DEFAULT_LOG_BACKUP_COUNT);
    }

    #[test]
    fn test_log_table_is_merged_key_by_key() {
        let toml: Config = toml::from_str(
            r#"
[log]
file = "file.log"
format = "timestamped"
no_console = true
backup_count = 3
"#,
        )
        .unwrap();

        let mut cli = parse(&[
            "--log-file",
            "cli.log",
            "--log-max-bytes",
            "1024",
            "https://example.com",
        ])
        .config;
        cli.merge(toml);

        assert_eq!(
            cli.log,
            LogConfig {
                file: Some(PathBuf::from("cli.log")),
                no_console: true,
                format: LogFormat::Timestamped,
                max_bytes: 1024,
                backup_count: 3,
            }
        );
    }

    #[test]
    fn test_urls_from_arguments_then_files() -> Result<()> {
        let dir = tempdir()?;
        let first = dir.path().join("first.txt");
        let second = dir.path().join("second.txt");
        fs::write(&first, "# mirrors\nhttps://a.test/1\n\nhttps://a.test/2\n")?;
        fs::write(&second, "https://b.test/\n")?;

        let opts = parse(&[
            "-i",
            first.to_str().unwrap(),
            "--input-file",
            second.to_str().unwrap(),
            "https://arg.test/",
        ]);

        assert_eq!(
            opts.urls()?,
            vec![
                "https://arg.test/",
                "https://a.test/1",
                "https://a.test/2",
                "https://b.test/",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_merge_headers_with_config() {
        let toml = Config {
            header: vec![
                ("Accept".to_string(), "text/html".to_string()),
                ("X-Test".to_string(), "check=this".to_string()),
            ],
            ..Default::default()
        };

        // Set X-Test and see if it gets overwritten
        let mut cli = Config {
            header: vec![("X-Test".to_string(), "check=that".to_string())],
            ..Default::default()
        };
        cli.merge(toml);

        assert_eq!(cli.header.len(), 2);

        // Sort vector before assert
        cli.header.sort();

        assert_eq!(
            cli.header,
            vec![
                ("Accept".to_string(), "text/html".to_string()),
                ("X-Test".to_string(), "check=this".to_string()),
            ]
        );
    }

    #[test]
    fn test_cli_values_win_over_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(BATCHFETCH_CONFIG_FILE);
        fs::write(
            &path,
            r#"
concurrency = 8
max_attempts = 5
format = "json"
verbose = "debug"

[log]
file = "batch.log"
format = "timestamped"
"#,
        )?;

        let mut cli = parse(&["-c", "2", "https://example.com"]).config;
        cli.merge(Config::load_from_file(&path)?);

        assert_eq!(cli.concurrency, 2);
        assert_eq!(cli.max_attempts, 5);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.verbose.log_level_filter(), log::LevelFilter::Debug);
        assert_eq!(cli.log.file, Some(PathBuf::from("batch.log")));
        assert_eq!(cli.log.format, LogFormat::Timestamped);
        assert_eq!(cli.user_agent, DEFAULT_USER_AGENT);
        Ok(())
    }

    #[test]
    fn test_unknown_config_key_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(BATCHFETCH_CONFIG_FILE);
        fs::write(&path, "max_retries = 2\n")?;

        assert!(Config::load_from_file(&path).is_err());
        Ok(())
    }
}
