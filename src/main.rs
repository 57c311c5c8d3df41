//! This module defines the main functionality of ohmscan, a button-triggered
//! resistor reader.

pub mod module;
use crate::module::define;
use crate::module::util::init::resource::init;

// The main function of ohmscan
pub fn main() {
    // Prepare the resources by initializing the property struct
    let property = init();

    // Initialize the logging system with the data directory and the system name
    init_log(
        property.path.dir.data.as_str(),
        define::system::NAME,
        property.conf.system.log_level.as_str(),
    );
    log::info!("Starting ohmscan...");

    // Start the scan thread that waits for triggers and runs the pipeline
    let scan_handler = module::scan::run(property);

    // Wait for the scan thread to finish before exiting the main function
    let _ = scan_handler.join();
}

/// This function initializes the logger system using the log4rs crate.
///
/// # Arguments
/// * `dir` - A string slice that holds the directory where the log file will be stored
/// * `name` - A string slice that holds the name of the logger and the log file
/// * `level` - The log level name from the configuration
///
fn init_log(dir: &str, name: &str, level: &str) {
    use crate::module::util::path::join;
    use log::LevelFilter;
    use log4rs::append::file::FileAppender;
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;

    let level = match level.to_uppercase().as_str() {
        "TRACE" => LevelFilter::Trace,
        "DEBUG" => LevelFilter::Debug,
        "WARN" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        _ => LevelFilter::Info,
    };

    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{h({d} - {l}: {m}{n})}")))
        .build(join(&[
            dir,
            define::path::LOG_DIR,
            &format!("{}.log", name),
        ]))
        .unwrap();

    let config = Config::builder()
        .appender(Appender::builder().build("logfile", Box::new(logfile)))
        .build(Root::builder().appender("logfile").build(level))
        .unwrap();
    log4rs::init_config(config).unwrap();
}
