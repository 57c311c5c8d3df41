//! Prepares the resources needed by the application: directories,
//! configuration and the property bundle handed around at startup.
//!

pub mod resource {
    use super::Property;

    /// Initialize the application resources and return a Property instance
    /// containing paths and configurations.
    ///
    pub fn init() -> Property {
        // Prepare the app data directories
        let paths = crate::module::util::path::dir::create_app_sub_dir();

        // Load the app configuration file
        let conf = crate::module::util::conf::toml::load(&paths.dir.data);

        Property { path: paths, conf }
    }
}

/// Paths and configuration of the app.
///
#[derive(Debug, Clone)]
pub struct Property {
    pub path: crate::module::util::path::OhmscanPath,
    pub conf: crate::module::util::conf::Config,
}
