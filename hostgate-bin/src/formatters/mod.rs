pub(crate) mod color;
pub(crate) mod log;
pub(crate) mod queue_stats;
pub(crate) mod response;

use self::response::ResponseFormatter;
use crate::options::{OutputMode, ResponseFormat};
use supports_color::Stream;

/// Detects whether a terminal supports color, and gives details about that
/// support. It takes into account the `NO_COLOR` environment variable.
fn supports_color() -> bool {
    supports_color::on(Stream::Stdout).is_some()
}

/// Create a response formatter based on the given format and mode
pub(crate) fn get_response_formatter(
    format: &ResponseFormat,
    mode: &OutputMode,
) -> Box<dyn ResponseFormatter> {
    match format {
        ResponseFormat::Json => Box::new(response::Json),
        ResponseFormat::Compact => Box::new(response::Compact::new(
            !mode.is_plain() && supports_color(),
        )),
    }
}
