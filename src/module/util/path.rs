//! Path Operations Module
//!
//! This module handles path operations for directories and files.

use std::path::PathBuf;

/// Join Paths
///
/// Joins path fragments into a single path string using PathBuf so
/// platform-specific separators are handled for us.
pub fn join(paths: &[&str]) -> String {
    let mut path: PathBuf = PathBuf::new();
    for p in paths {
        path.push(p);
    }
    path.into_os_string().into_string().unwrap()
}

pub mod dir {
    //! Directory Operations Submodule

    use std::fs;
    use std::path::Path;

    use super::{OhmscanDir, OhmscanPath};
    use crate::module::define;

    /// Create Directory from Path List
    ///
    /// Returns `Some(path)` if the directory creation succeeds, or `None` if it fails.
    pub fn create_dir_from_path_list(paths: &[&str]) -> Option<String> {
        let path = super::join(paths);
        match fs::create_dir_all(Path::new(&path)) {
            Ok(_) => Some(path),
            Err(_) => None,
        }
    }

    /// Create Subdirectory in Either Directory
    ///
    /// Uses `dir1` as the parent if it exists, `dir2` otherwise.
    pub fn create_subdir_in_either_dir(dir1: &str, dir2: &str, name: &str) -> Option<String> {
        let exist: bool = Path::new(dir1).is_dir();
        let parent: &str = match exist {
            true => dir1,
            false => dir2,
        };
        create_dir_from_path_list(&[parent, name])
    }

    /// Create Data Directory
    ///
    /// Prefers the persistent parent when it exists, falling back to the
    /// ephemeral one. Panics if neither is writable.
    pub fn create_data_dir() -> String {
        let res = create_subdir_in_either_dir(
            define::path::PERSISTENT_DIR,
            define::path::EPHEMERAL_DIR,
            define::system::NAME,
        );
        match res {
            Some(path) => path,
            None => panic!("Can't Create Data Dir."),
        }
    }

    /// Create Application Subdirectories and Paths
    ///
    /// Creates the data directory with log and debug subdirectories and
    /// returns an `OhmscanPath` bundle pointing at all of them.
    pub fn create_app_sub_dir() -> OhmscanPath {
        let data_dir = create_data_dir();
        let log_dir = create_dir_from_path_list(&[&data_dir, define::path::LOG_DIR]).unwrap();
        let debug_dir = create_dir_from_path_list(&[&data_dir, define::path::DEBUG_DIR]).unwrap();
        OhmscanPath {
            dir: OhmscanDir {
                data: data_dir,
                log: log_dir,
                debug: debug_dir,
            },
        }
    }
}

/// Paths of Resources
#[derive(Debug, Clone)]
pub struct OhmscanPath {
    /// Directories Paths
    pub dir: OhmscanDir,
}

/// Paths of Directories
#[derive(Debug, Clone)]
pub struct OhmscanDir {
    /// Data Directory Path
    pub data: String,
    /// Log Directory Path
    pub log: String,
    /// Debug Artifact Directory Path
    pub debug: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_create_dir_from_path_list() {
        dir::create_dir_from_path_list(&["/tmp", "ohmscantest", "test_create_dir_from_path_list"]);
        assert!(Path::new("/tmp/ohmscantest/test_create_dir_from_path_list").is_dir());
    }

    #[test]
    fn test_create_subdir_in_either_dir() {
        dir::create_subdir_in_either_dir(
            "/tmp/ohmscantest1",
            "/tmp/ohmscantest",
            "test_create_subdir_in_either_dir",
        );
        assert!(Path::new("/tmp/ohmscantest/test_create_subdir_in_either_dir").is_dir());
    }

    #[test]
    fn test_path_join() {
        assert_eq!(join(&["/test/", "test"]), "/test/test");
        assert_eq!(join(&["test", "test", "test"]), "test/test/test");
        assert_eq!(
            join(&["./test/", "test/", "test.txt"]),
            "./test/test/test.txt"
        );
    }
}
