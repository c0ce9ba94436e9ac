//! Program options and the config-file format.
//!
//! Options can come from CLI arguments, from a config file of
//! `some-option = some-value` lines, or both. File values are applied
//! first; CLI values override them, except `allow`, which accumulates
//! across both sources.

use std::os::fd::RawFd;

use thiserror::Error;

use crate::syscalls;

pub const PROGRAM_NAME: &str = "sealexec";

/// Stderr, the default audit channel.
pub const DEFAULT_STATUS_FD: RawFd = 2;

#[derive(Debug, Clone)]
pub struct Options {
    /// Print debugging information on the status descriptor.
    pub verbose: bool,

    /// Syscall names (or raw numbers) to allow, in the order given.
    pub allow: Vec<String>,

    /// Do not apply the seccomp filter at all.
    pub allow_any_syscalls: bool,

    /// SIGSYS instead of SIGKILL on a disallowed syscall.
    pub trap: bool,

    /// Descriptor for debug and error messages.
    pub status_fd: RawFd,

    /// Print the syscall table and exit; skips validation.
    pub dump_syscalls: bool,

    /// Program (absolute path) and its arguments.
    pub command: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            verbose: false,
            allow: Vec::new(),
            allow_any_syscalls: false,
            trap: false,
            status_fd: DEFAULT_STATUS_FD,
            dump_syscalls: false,
            command: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("command not specified")]
    MissingCommand,

    #[error("program path '{0}' must be absolute, PATH is not searched")]
    RelativeProgramPath(String),

    #[error("using --trap along with --allow-any-syscalls makes no sense")]
    TrapWithoutFilter,

    #[error("status-fd must be a non-negative descriptor, got {0}")]
    InvalidStatusFd(RawFd),

    #[error("unknown syscall name '{0}'")]
    UnknownSyscall(String),
}

/// Config-file errors, always citing the offending line.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("syntax error: {reason} at line {line}")]
    Syntax { line: usize, reason: &'static str },

    #[error("line {line}: unknown option '{key}'")]
    UnknownKey { line: usize, key: String },

    #[error("line {line}: invalid value '{value}' for '{key}'")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
    },
}

impl Options {
    /// Check cross-option consistency. `dump_syscalls` short-circuits:
    /// nothing else matters for a table dump.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.dump_syscalls {
            return Ok(());
        }

        if self.status_fd < 0 {
            return Err(OptionsError::InvalidStatusFd(self.status_fd));
        }

        if self.trap && self.allow_any_syscalls {
            return Err(OptionsError::TrapWithoutFilter);
        }

        if self.command.is_empty() {
            return Err(OptionsError::MissingCommand);
        }

        if !self.command[0].starts_with('/') {
            return Err(OptionsError::RelativeProgramPath(self.command[0].clone()));
        }

        Ok(())
    }

    /// Resolve the `allow` entries into syscall numbers, preserving order.
    /// Entries are names from the table or raw non-negative integers.
    pub fn resolve_allow_list(&self) -> Result<Vec<i64>, OptionsError> {
        let mut numbers = Vec::with_capacity(self.allow.len());
        for entry in &self.allow {
            if let Ok(number) = entry.parse::<i64>() {
                numbers.push(number);
            } else if let Some(number) = syscalls::resolve(entry) {
                numbers.push(number);
            } else {
                return Err(OptionsError::UnknownSyscall(entry.clone()));
            }
        }
        Ok(numbers)
    }

    /// Whether a syscall, given by name, would pass the filter.
    pub fn is_syscall_allowed(&self, name: &str) -> bool {
        self.allow_any_syscalls || self.allow.iter().any(|entry| entry == name)
    }

    /// Apply a config file's contents over these options.
    ///
    /// Lines are `key = value`; `#` and `;` start comments; values may be
    /// wrapped in single or double quotes. `allow` may appear several times.
    pub fn apply_config_file(&mut self, text: &str) -> Result<(), ConfigError> {
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::Syntax {
                    line,
                    reason: "no equal sign",
                });
            };
            let key = key.trim();
            let value = unquote(value.trim());
            if key.is_empty() {
                return Err(ConfigError::Syntax {
                    line,
                    reason: "key is empty",
                });
            }

            match key {
                "verbose" => self.verbose = parse_bool(line, key, value)?,
                "allow" => self.allow.push(value.to_string()),
                "allow-any-syscalls" => self.allow_any_syscalls = parse_bool(line, key, value)?,
                "trap" => self.trap = parse_bool(line, key, value)?,
                "status-fd" => {
                    self.status_fd = value.parse().map_err(|_| ConfigError::InvalidValue {
                        line,
                        key: key.to_string(),
                        value: value.to_string(),
                    })?
                }
                _ => {
                    return Err(ConfigError::UnknownKey {
                        line,
                        key: key.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn parse_bool(line: usize, key: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            line,
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() > 1 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_options() -> Options {
        Options {
            allow: vec!["read".to_string(), "write".to_string()],
            command: vec!["/bin/true".to_string()],
            ..Options::default()
        }
    }

    #[test]
    fn test_defaults() {
        let opt = Options::default();
        assert_eq!(opt.status_fd, 2);
        assert!(!opt.verbose);
        assert!(!opt.trap);
        assert!(opt.allow.is_empty());
    }

    #[test]
    fn test_validate_accepts_sane_options() {
        assert!(valid_options().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_command() {
        let mut opt = valid_options();
        opt.command.clear();
        assert!(matches!(
            opt.validate(),
            Err(OptionsError::MissingCommand)
        ));
    }

    #[test]
    fn test_validate_requires_absolute_program_path() {
        let mut opt = valid_options();
        opt.command = vec!["true".to_string()];
        assert!(matches!(
            opt.validate(),
            Err(OptionsError::RelativeProgramPath(_))
        ));
    }

    #[test]
    fn test_validate_rejects_trap_with_allow_any() {
        let mut opt = valid_options();
        opt.trap = true;
        opt.allow_any_syscalls = true;
        assert!(matches!(
            opt.validate(),
            Err(OptionsError::TrapWithoutFilter)
        ));
    }

    #[test]
    fn test_validate_rejects_negative_status_fd() {
        let mut opt = valid_options();
        opt.status_fd = -1;
        assert!(matches!(
            opt.validate(),
            Err(OptionsError::InvalidStatusFd(-1))
        ));
    }

    #[test]
    fn test_dump_syscalls_skips_validation() {
        let opt = Options {
            dump_syscalls: true,
            ..Options::default()
        };
        assert!(opt.validate().is_ok());
    }

    #[test]
    fn test_resolve_allow_list_names_and_numbers() {
        let opt = Options {
            allow: vec!["write".to_string(), "59".to_string()],
            ..Options::default()
        };
        let numbers = opt.resolve_allow_list().unwrap();
        assert_eq!(numbers, vec![libc::SYS_write as i64, 59]);
    }

    #[test]
    fn test_resolve_allow_list_unknown_name() {
        let opt = Options {
            allow: vec!["frobnicate".to_string()],
            ..Options::default()
        };
        assert!(matches!(
            opt.resolve_allow_list(),
            Err(OptionsError::UnknownSyscall(name)) if name == "frobnicate"
        ));
    }

    #[test]
    fn test_is_syscall_allowed() {
        let opt = valid_options();
        assert!(opt.is_syscall_allowed("read"));
        assert!(!opt.is_syscall_allowed("execve"));

        let any = Options {
            allow_any_syscalls: true,
            ..Options::default()
        };
        assert!(any.is_syscall_allowed("execve"));
    }

    #[test]
    fn test_config_file_basic() {
        let mut opt = Options::default();
        opt.apply_config_file(
            "# a comment\n\
             ; another comment\n\
             \n\
             verbose = true\n\
             allow = read\n\
             allow = \"write\"\n\
             allow = 'execve'\n\
             status-fd = 5\n",
        )
        .unwrap();

        assert!(opt.verbose);
        assert_eq!(opt.allow, vec!["read", "write", "execve"]);
        assert_eq!(opt.status_fd, 5);
    }

    #[test]
    fn test_config_file_missing_equal_sign_cites_line() {
        let mut opt = Options::default();
        let err = opt.apply_config_file("verbose = true\nnonsense\n").unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { line: 2, .. }));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_config_file_empty_key() {
        let mut opt = Options::default();
        let err = opt.apply_config_file(" = value\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Syntax {
                line: 1,
                reason: "key is empty"
            }
        ));
    }

    #[test]
    fn test_config_file_unknown_key() {
        let mut opt = Options::default();
        let err = opt.apply_config_file("chroot-path = /jail\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey { line: 1, .. }));
    }

    #[test]
    fn test_config_file_bad_bool() {
        let mut opt = Options::default();
        let err = opt.apply_config_file("trap = maybe\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_unquote_leaves_bare_and_mismatched_values() {
        assert_eq!(unquote("plain"), "plain");
        assert_eq!(unquote("\"quoted\""), "quoted");
        assert_eq!(unquote("'quoted'"), "quoted");
        assert_eq!(unquote("\"mismatched'"), "\"mismatched'");
        assert_eq!(unquote("\""), "\"");
    }
}
