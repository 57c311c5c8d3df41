//! Module for Constants and Paths Definitions
//!
//! This module defines various constants and paths used throughout the application.

/// System Constants
pub mod system {
    /// Name of the system
    pub const NAME: &str = "ohmscan";
}

/// File Paths
pub mod path {

    // Persistent Data Directory
    pub const PERSISTENT_DIR: &str = "/data/";

    // Ephemeral Data Directory
    pub const EPHEMERAL_DIR: &str = "/run/user/1000/";

    // Log Directory
    pub const LOG_DIR: &str = "log";

    // Debug Artifact Directory
    pub const DEBUG_DIR: &str = "debug";

    // Configuration File
    pub const CONF_FILE: &str = "conf.toml";
}
