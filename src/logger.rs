//! Logging setup for the pager engine.
//!
//! There is no database file to scope logs to (unlike the teacher, which writes
//! `{db_name}_logs/{db_name}.log` next to an open database): the pager is a library
//! embedded in a host process, so it defaults to stderr via log4rs's console appender
//! and otherwise defers to whatever `log4rs.yaml` the host already loaded.

use log::LevelFilter;

/// Initializes logging from `log4rs.yaml` in the working directory if present,
/// otherwise falls back to a stderr console appender at `Info`.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    if log4rs::init_file("log4rs.yaml", log4rs::config::Deserializers::default()).is_ok() {
        return Ok(());
    }
    init_with_level(LevelFilter::Info)
}

/// Initializes a stderr-only logger at the given level. Useful for embedding
/// applications and tests that don't want to manage a `log4rs.yaml`.
pub fn init_with_level(level: LevelFilter) -> Result<(), Box<dyn std::error::Error>> {
    use log4rs::append::console::ConsoleAppender;
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;

    let encoder = Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}"));
    let console = ConsoleAppender::builder().encoder(encoder).build();
    let config = Config::builder()
        .appender(Appender::builder().build("console", Box::new(console)))
        .build(Root::builder().appender("console").build(level))?;
    log4rs::init_config(config)?;
    Ok(())
}
