// SPDX-License-Identifier: MIT

//! File filtering rules shared by the config loader and the daemon's
//! directory watcher (§4.4, P6).

use std::path::Path;

/// True iff `path` is eligible to be treated as a process config file in
/// directory mode: the file name does not start with `.`, ends with
/// `.json`, `.yml`, or `.yaml`, and either does not exist (so deletions
/// remain observable) or is a regular file.
pub fn is_process_config_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') {
        return false;
    }
    let has_extension =
        name.ends_with(".json") || name.ends_with(".yml") || name.ends_with(".yaml");
    if !has_extension {
        return false;
    }
    match path.symlink_metadata() {
        Ok(meta) => meta.is_file(),
        Err(_) => true, // nonexistent path: allow through so deletions are observable
    }
}
