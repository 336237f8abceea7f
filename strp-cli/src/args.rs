//! Simple command-line argument parser.
//!
//! No external dependencies. Supports `--flag`, `--key value`,
//! `--key=value`, `-v`/`-q` (counted), and positional arguments.

use std::collections::HashMap;

/// Parsed command-line arguments.
pub struct Args {
    pub flags: HashMap<String, String>,
    pub positional: Vec<String>,
    pub verbosity: u8,
    pub quiet: u8,
}

impl Args {
    /// Parse command-line arguments (skipping argv[0]).
    pub fn parse() -> Self {
        Self::parse_from(std::env::args().skip(1).collect())
    }

    /// Parse from a list of argument strings.
    pub fn parse_from(args: Vec<String>) -> Self {
        let mut flags = HashMap::new();
        let mut positional = Vec::new();
        let mut verbosity: u8 = 0;
        let mut quiet: u8 = 0;
        let mut iter = args.into_iter();

        while let Some(arg) = iter.next() {
            if arg == "--" {
                positional.extend(iter);
                break;
            } else if let Some(key) = arg.strip_prefix("--") {
                if let Some((k, v)) = key.split_once('=') {
                    flags.insert(k.to_string(), v.to_string());
                } else {
                    match key {
                        // Boolean flags that never take values.
                        "version" | "help" | "dump" => {
                            flags.insert(key.to_string(), "true".into());
                        }
                        _ => {
                            if let Some(val) = iter.next() {
                                flags.insert(key.to_string(), val);
                            } else {
                                flags.insert(key.to_string(), "true".into());
                            }
                        }
                    }
                }
            } else if let Some(shorts) = arg.strip_prefix('-') {
                for c in shorts.chars() {
                    match c {
                        'v' => verbosity = verbosity.saturating_add(1),
                        'q' => quiet = quiet.saturating_add(1),
                        'h' => {
                            flags.insert("help".into(), "true".into());
                        }
                        _ => {}
                    }
                }
            } else {
                positional.push(arg);
            }
        }

        Args {
            flags,
            positional,
            verbosity,
            quiet,
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.flags.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.flags.get(key).map(|s| s.as_str())
    }

    pub fn config_path(&self) -> Option<&str> {
        self.get("config")
    }
}
