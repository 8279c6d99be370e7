use crate::verbosity::Verbosity;
use anyhow::{Context, Error, Result, anyhow};
use clap::builder::PossibleValuesParser;
use clap::{Parser, builder::TypedValueParser};
use const_format::formatcp;
use hostgate_lib::queue::{PolicyParams, QueueConfig};
use hostgate_lib::{
    CacheParams, DEFAULT_CACHE_EXPIRE, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, QueueParams,
    RequestOptions,
};
use http::{
    HeaderMap, Method,
    header::{HeaderName, HeaderValue},
};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::Path;
use std::{fs, path::PathBuf, str::FromStr, time::Duration};
use strum::{Display, EnumString, VariantNames};
use url::Url;

pub(crate) const HOSTGATE_CONFIG_FILE: &str = "hostgate.toml";

const DEFAULT_METHOD: &str = "GET";
const DEFAULT_REPEAT: usize = 1;

// clap wants `&str` defaults, serde wants functions
const TIMEOUT_STR: &str = "10s";
const EXPIRE_STR: &str = "12h";

// Show the default config file while still telling whether the user set one.
// A missing default file is not an error, a missing explicit one is.
const HELP_MSG_CONFIG_FILE: &str = formatcp!(
    "Configuration file to use\n\n[default: {}]",
    HOSTGATE_CONFIG_FILE,
);

/// How results are printed to stdout
#[derive(Debug, Deserialize, Default, Clone, Display, VariantNames, PartialEq, Eq)]
#[non_exhaustive]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub(crate) enum ResponseFormat {
    /// One line per request
    #[default]
    Compact,
    /// A single JSON document with all responses and errors
    Json,
}

impl FromStr for ResponseFormat {
    type Err = Error;

    fn from_str(format: &str) -> Result<Self, Self::Err> {
        match format.to_lowercase().as_str() {
            "compact" | "string" => Ok(ResponseFormat::Compact),
            "json" => Ok(ResponseFormat::Json),
            _ => Err(anyhow!("Unknown format {format}")),
        }
    }
}

/// Whether output is colored
#[derive(Debug, Deserialize, Default, Clone, Display, EnumString, VariantNames, PartialEq, Eq)]
#[non_exhaustive]
pub(crate) enum OutputMode {
    /// Plain text, for terminals without color support and for piping
    #[serde(rename = "plain")]
    #[strum(serialize = "plain", ascii_case_insensitive)]
    Plain,

    /// Status codes and log levels are colored
    #[serde(rename = "color")]
    #[strum(serialize = "color", ascii_case_insensitive)]
    #[default]
    Color,
}

impl OutputMode {
    pub(crate) const fn is_plain(&self) -> bool {
        matches!(self, OutputMode::Plain)
    }
}

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
    method: String = DEFAULT_METHOD.to_string();
    user_agent: String = DEFAULT_USER_AGENT.to_string();
    timeout: Duration = DEFAULT_TIMEOUT;
    expire: Duration = DEFAULT_CACHE_EXPIRE;
    repeat: usize = DEFAULT_REPEAT;
    verbosity: Verbosity = Verbosity::default();
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
/// This fails if the header does not contain a `:` character or if the
/// header name contains non-ASCII characters. The value is never echoed.
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
                .map_err(|e| anyhow!("Invalid header value for '{name}': {e}"))?;
            header_map.insert(header_name, header_value);
        }
        Ok(header_map)
    }
}

// Headers are a table in TOML
fn deserialize_headers<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    let map = HashMap::<String, String>::deserialize(deserializer)?;
    Ok(map.into_iter().collect())
}

fn parse_json(value: &str) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::from_str(value)
}

/// hostgate fetches URLs politely: every request waits in the queue of its
/// host, which caps how many requests run at once or how fast they start.
/// Responses can be cached, and failures are reported with a curl command
/// for reproducing them.
#[derive(Parser, Debug)]
#[command(version, about, next_display_order = None)]
pub(crate) struct HostgateOptions {
    /// URLs to fetch
    #[arg(name = "urls", required = true)]
    raw_urls: Vec<String>,

    /// Configuration file to use
    #[arg(short, long = "config")]
    #[arg(help = HELP_MSG_CONFIG_FILE)]
    pub(crate) config_file: Option<PathBuf>,

    #[clap(flatten)]
    pub(crate) config: Config,
}

impl HostgateOptions {
    /// Get parsed URLs from options.
    pub(crate) fn urls(&self) -> Result<Vec<Url>> {
        self.raw_urls
            .iter()
            .map(|raw| hostgate_lib::parse_url(raw))
            .collect::<Result<_, _>>()
            .context("Cannot parse URLs from arguments")
    }
}

/// The main configuration for hostgate
#[allow(clippy::struct_excessive_bools)]
#[derive(Parser, Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// Verbose program output
    #[clap(flatten)]
    #[serde(default = "verbosity")]
    pub(crate) verbose: Verbosity,

    /// Set the output display mode
    #[arg(long, default_value = "color", value_parser = PossibleValuesParser::new(OutputMode::VARIANTS).map(|s| s.parse::<OutputMode>().unwrap()))]
    #[serde(default)]
    pub(crate) mode: OutputMode,

    /// Output format of the results
    #[arg(short, long, default_value = "compact", value_parser = PossibleValuesParser::new(ResponseFormat::VARIANTS).map(|s| s.parse::<ResponseFormat>().unwrap()))]
    #[serde(default)]
    pub(crate) format: ResponseFormat,

    /// Request method
    // Using `-X` as a short param similar to curl
    #[arg(short = 'X', long, default_value = DEFAULT_METHOD)]
    #[serde(default = "method")]
    pub(crate) method: String,

    /// Set custom header for requests
    #[arg(
        short = 'H',
        long,
        action = clap::ArgAction::Append,
        value_parser = HeaderParser,
        value_name = "HEADER:VALUE",
        long_help = "Set custom header for requests

Headers are given in the format 'Name: Value', like with curl.
Multiple headers can be specified by using the flag multiple times.
The specified headers are used for ALL requests."
    )]
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_headers")]
    pub(crate) header: Vec<(String, String)>,

    /// Send this text as the request body
    #[arg(short, long, conflicts_with = "json")]
    #[serde(default)]
    pub(crate) data: Option<String>,

    /// Send this JSON document as the request body
    #[arg(long, value_parser = parse_json)]
    #[serde(default)]
    pub(crate) json: Option<serde_json::Value>,

    /// Time allowed per request, from connect to the end of the body
    #[arg(short, long, value_parser = humantime::parse_duration, default_value = TIMEOUT_STR)]
    #[serde(default = "timeout")]
    #[serde(with = "humantime_serde")]
    pub(crate) timeout: Duration,

    /// User agent, for requests without a user-agent header
    #[arg(short, long, default_value = DEFAULT_USER_AGENT)]
    #[serde(default = "user_agent")]
    pub(crate) user_agent: String,

    /// Queue requests under this key instead of their host
    #[arg(long, value_name = "KEY")]
    #[serde(default)]
    pub(crate) queue_by: Option<String>,

    /// Allow at most this many requests per queue at once.
    ///
    /// Only applies to queues created by this run; configured hosts keep
    /// their policy.
    #[arg(long)]
    #[serde(default)]
    pub(crate) concurrency: Option<usize>,

    /// Start at most this many requests per minute and queue
    #[arg(long)]
    #[serde(default)]
    pub(crate) rpm: Option<u32>,

    /// Start at most this many requests per second and queue
    #[arg(long)]
    #[serde(default)]
    pub(crate) rps: Option<u32>,

    /// Send requests right away, without queueing
    #[arg(long)]
    #[serde(default)]
    pub(crate) skip_queue: bool,

    /// Serve repeated requests from an in-memory cache
    #[arg(long)]
    #[serde(default)]
    pub(crate) cache: bool,

    /// Maximum age of cached responses
    #[arg(long, value_parser = humantime::parse_duration, default_value = EXPIRE_STR)]
    #[serde(default = "expire")]
    #[serde(with = "humantime_serde")]
    pub(crate) expire: Duration,

    /// Cache requests by this JSON value instead of by their options
    #[arg(long, value_parser = parse_json, value_name = "JSON")]
    #[serde(default)]
    pub(crate) cache_by: Option<serde_json::Value>,

    /// Fetch every URL this many times, one after the other
    #[arg(long, default_value_t = DEFAULT_REPEAT)]
    #[serde(default = "repeat")]
    pub(crate) repeat: usize,

    /// Show per-queue statistics at the end of the run
    #[arg(long)]
    #[serde(default)]
    pub(crate) queue_stats: bool,

    /// Queue policies: a `[queue.default]` table and `[queue.hosts."<key>"]`
    /// tables. Only available in the configuration file.
    #[arg(skip)]
    #[serde(default)]
    pub(crate) queue: QueueConfig,
}

impl Config {
    /// Special handling for merging headers
    ///
    /// Headers from `other` are added unless `self` already sets them.
    fn merge_headers(&mut self, other: &[(String, String)]) {
        let self_map = self.header.iter().cloned().collect::<HashMap<_, _>>();
        let other_map = other.iter().cloned().collect::<HashMap<_, _>>();

        // Merge the two maps, with `self` taking precedence
        let merged_map: HashMap<_, _> = other_map.into_iter().chain(self_map).collect();
        self.header = merged_map.into_iter().collect();
    }

    /// Load configuration from a file
    pub(crate) fn load_from_file(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).with_context(|| "Failed to parse configuration file")
    }

    /// Merge the configuration from TOML into the CLI configuration
    pub(crate) fn merge(&mut self, toml: Config) {
        self.merge_headers(&toml.header);

        // Queue policies only exist in TOML
        self.queue.merge(toml.queue);

        // NOTE: if you see an error within this macro call, check to make sure that
        // that the fields provided to fold_in! match all the fields of the Config struct.
        fold_in! {
            // Destination and source configs
            self, toml;

            Config {
                // Keys which are handled outside of fold_in
                ..header,
                ..queue,

                // Keys with defaults to assign
                cache: false,
                cache_by: None,
                concurrency: None,
                data: None,
                expire: DEFAULT_CACHE_EXPIRE,
                format: ResponseFormat::default(),
                json: None,
                method: DEFAULT_METHOD,
                mode: OutputMode::Color,
                queue_by: None,
                queue_stats: false,
                repeat: DEFAULT_REPEAT,
                rpm: None,
                rps: None,
                skip_queue: false,
                timeout: DEFAULT_TIMEOUT,
                user_agent: DEFAULT_USER_AGENT,
                verbose: Verbosity::default(),
            }
        }
    }

    /// The request options shared by all requests of this run
    pub(crate) fn request_options(&self) -> Result<RequestOptions> {
        let method = Method::from_bytes(self.method.to_uppercase().as_bytes())
            .with_context(|| format!("Invalid request method `{}`", self.method))?;

        let mut options = RequestOptions::new()
            .method(method)
            .headers(HeaderMap::from_header_pairs(&self.header)?);

        if let Some(json) = &self.json {
            options = options.json(json.clone());
        } else if let Some(data) = &self.data {
            options = options.text(data.clone());
        }
        Ok(options)
    }

    /// Queueing parameters from the command line
    pub(crate) fn queue_params(&self) -> QueueParams {
        let mut params = QueueParams::default()
            .skip_queue(self.skip_queue)
            .policy(PolicyParams {
                concurrency: self.concurrency,
                rpm: self.rpm,
                rps: self.rps,
            });
        if let Some(key) = &self.queue_by {
            params = params.queue_by(key.clone());
        }
        params
    }

    /// Cache parameters, if caching is enabled
    pub(crate) fn cache_params(&self) -> Option<CacheParams> {
        if !self.cache {
            return None;
        }
        let params = CacheParams::default().expire(self.expire);
        Some(match &self.cache_by {
            Some(value) => params.cache_by(value.clone()),
            None => params,
        })
    }
}
