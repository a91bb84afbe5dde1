/// Initializes the logging system from the default file `log4rs.yaml` in the
/// working directory. Prefer `init_for_service` for programmatic control.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    log4rs::init_file("log4rs.yaml", log4rs::config::Deserializers::default())?;
    Ok(())
}

/// Initializes logging to a service-scoped folder: `{name}_logs/{name}.log`.
///
/// # Errors
/// Returns an error if the directory cannot be created or the logger fails to
/// initialize.
pub fn init_for_service(name: &str) -> Result<(), Box<dyn std::error::Error>> {
    use log::LevelFilter;
    use log4rs::append::file::FileAppender;
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;
    use std::fs;
    let log_dir = format!("{name}_logs");
    fs::create_dir_all(&log_dir)?;
    let logfile = format!("{log_dir}/{name}.log");
    let encoder = Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}"));
    let file_appender = FileAppender::builder().encoder(encoder).build(logfile)?;
    let config = Config::builder()
        .appender(Appender::builder().build("file", Box::new(file_appender)))
        .build(Root::builder().appender("file").build(LevelFilter::Info))?;
    log4rs::init_config(config)?;
    Ok(())
}
