use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

use crate::{formatters, options::OutputMode, verbosity::Verbosity};

/// Initialize the logging system with the given verbosity level.
pub(crate) fn init_logging(verbose: &Verbosity, mode: &OutputMode) {
    // Warn by default; RUST_LOG overrides everything below
    let env = Env::default().filter_or("RUST_LOG", "warn");

    let mut builder = Builder::from_env(env);
    builder
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false);

    if std::env::var("RUST_LOG").is_err() {
        let level_filter = verbose.log_level_filter();

        // Other crates (reqwest, hyper, ...) stay at `warn`
        builder.filter_level(LevelFilter::Warn);
        builder
            .filter_module("hostgate", level_filter)
            .filter_module("hostgate_lib", level_filter);
    }

    if mode.is_plain() {
        builder.format(move |buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()));
    } else {
        builder.format(move |buf, record| {
            let level = record.level();
            let color = formatters::color::color_for_level(level);
            writeln!(
                buf,
                "{} {}",
                color.apply_to(format!("[{level}]")),
                record.args()
            )
        });
    }

    // Tests may initialize logging more than once
    let _ = builder.try_init();
}
