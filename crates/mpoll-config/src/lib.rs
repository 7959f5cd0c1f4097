// SPDX-License-Identifier: MIT

//! Config file discovery and parsing (§1, §6): turns a directory or single
//! file of JSON/YAML documents into `mpoll_core::Server` records.

mod error;
mod filter;
mod parse;
mod types;

pub use error::ConfigError;
pub use filter::is_process_config_file;
pub use parse::{parse_servers, trigger_spec_for};
pub use types::{RawQuery, RawServer, RawWriter};

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn parses_one_file_with_two_servers() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("s.json");
        fs::write(
            &file,
            r#"[
                {"host":"h1","port":9999,"run_period_seconds":60,
                 "writers":[{"type":"file","name":"w1","path":"/tmp/w1.jsonl"}],
                 "queries":[{"object_name":"java.lang:type=Memory","attributes":["Heap"],
                             "writers":[{"type":"file","name":"w1","path":"/tmp/w1.jsonl"}]}]},
                {"host":"h2","port":9999,"run_period_seconds":60,"queries":[]}
            ]"#,
        )
        .unwrap();

        let servers = parse_servers(&file, false).unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].identity(), "h1:9999");
        // The file writer declared at server- and query-level with the same
        // name must resolve to one shared instance.
        assert_eq!(servers[0].all_writers().len(), 1);
    }

    #[test]
    fn bad_file_is_skipped_when_continue_on_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.json"), r#"[{"host":"h1","port":1,"queries":[]}]"#).unwrap();
        fs::write(dir.path().join("bad.json"), "not json").unwrap();

        let servers = parse_servers(dir.path(), true).unwrap();
        assert_eq!(servers.len(), 1);
    }

    #[test]
    fn bad_file_fails_loudly_without_continue_on_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), "not json").unwrap();
        assert!(parse_servers(dir.path(), false).is_err());
    }

    #[test]
    fn missing_path_yields_zero_servers() {
        let servers = parse_servers(std::path::Path::new("/no/such/path.json"), false).unwrap();
        assert!(servers.is_empty());
    }

    #[test]
    fn conflicting_writer_definitions_under_one_name_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("s.json");
        fs::write(
            &file,
            r#"[{"host":"h1","port":1,
                 "writers":[{"type":"file","name":"w1","path":"/tmp/a.jsonl"}],
                 "queries":[{"object_name":"o","attributes":[],
                             "writers":[{"type":"file","name":"w1","path":"/tmp/DIFFERENT.jsonl"}]}]}]"#,
        )
        .unwrap();
        assert!(parse_servers(&file, false).is_err());
    }
}
