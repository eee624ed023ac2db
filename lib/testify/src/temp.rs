use std::path::PathBuf;

use crate::random::random_string;

/// A path under the system temp dir which does not exist yet.
pub fn temp_file() -> PathBuf {
    std::env::temp_dir().join(random_string(16))
}

/// Creates an empty directory under the system temp dir, the caller is
/// responsible for removing it.
pub fn temp_dir() -> PathBuf {
    let path = temp_file();
    std::fs::create_dir_all(&path).expect("create temp dir");
    path
}
