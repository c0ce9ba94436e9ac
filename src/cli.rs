//! Command-line surface.
//!
//! Flags map one-to-one onto [`Options`]; `--config-file` merges a file in
//! first so explicit CLI flags win (and `--allow` accumulates).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::options::{Options, PROGRAM_NAME};

const ABOUT: &str = "Execute a program while restricting the set of system calls \
it is allowed to make.";

const LONG_ABOUT: &str = "\
Execute a program while restricting the set of system calls it is allowed \
to make.

The restriction uses seccomp(2) with SECCOMP_SET_MODE_FILTER, so the kernel \
must support it. On an attempt to make a call not on the allow-list the \
kernel sends SIGKILL (or SIGSYS with --trap) to the program.

The executable is not searched for in PATH; give an absolute path.";

#[derive(Debug, Parser)]
#[command(name = PROGRAM_NAME)]
#[command(version, about = ABOUT, long_about = LONG_ABOUT)]
pub struct Cli {
    /// Print debugging information
    #[arg(short, long)]
    pub verbose: bool,

    /// Read options from this config file ('some-option = some-value' lines)
    #[arg(long, value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Name or number of a system call to allow; may be used several times
    #[arg(long = "allow", value_name = "SYSCALL")]
    pub allow: Vec<String>,

    /// Do not apply the seccomp syscall filter
    #[arg(long)]
    pub allow_any_syscalls: bool,

    /// Send SIGSYS instead of SIGKILL on a disallowed syscall; useful for
    /// debugging
    #[arg(long)]
    pub trap: bool,

    /// File descriptor for debug and error messages, default is stderr (2)
    #[arg(long, value_name = "FD")]
    pub status_fd: Option<i32>,

    /// Print available syscall names and numbers for this system
    #[arg(long)]
    pub dump_syscalls: bool,

    /// Program to execute (absolute path) and its arguments
    #[arg(value_name = "COMMAND", trailing_var_arg = true)]
    pub command: Vec<String>,
}

impl Cli {
    /// Fold the config file (if any) and the CLI flags into [`Options`].
    pub fn into_options(self) -> Result<Options> {
        let mut options = Options::default();

        if let Some(path) = &self.config_file {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read config file '{}'", path.display()))?;
            options
                .apply_config_file(&text)
                .with_context(|| format!("error in config file '{}'", path.display()))?;
        }

        // CLI flags override file values; allow entries accumulate.
        if self.verbose {
            options.verbose = true;
        }
        if self.allow_any_syscalls {
            options.allow_any_syscalls = true;
        }
        if self.trap {
            options.trap = true;
        }
        if self.dump_syscalls {
            options.dump_syscalls = true;
        }
        if let Some(fd) = self.status_fd {
            options.status_fd = fd;
        }
        options.allow.extend(self.allow);
        if !self.command.is_empty() {
            options.command = self.command;
        }

        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_flags_and_trailing_command() {
        let cli = Cli::try_parse_from([
            "sealexec",
            "--verbose",
            "--allow",
            "read",
            "--allow",
            "write",
            "--trap",
            "--",
            "/bin/echo",
            "hello",
        ])
        .unwrap();

        let options = cli.into_options().unwrap();
        assert!(options.verbose);
        assert!(options.trap);
        assert_eq!(options.allow, vec!["read", "write"]);
        assert_eq!(options.command, vec!["/bin/echo", "hello"]);
        assert_eq!(options.status_fd, 2);
    }

    #[test]
    fn test_config_file_merges_under_cli_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "allow = read").unwrap();
        writeln!(file, "status-fd = 7").unwrap();
        file.flush().unwrap();

        let cli = Cli::try_parse_from([
            "sealexec",
            "--config-file",
            file.path().to_str().unwrap(),
            "--allow",
            "write",
            "--status-fd",
            "3",
            "/bin/true",
        ])
        .unwrap();

        let options = cli.into_options().unwrap();
        // File allow first, then CLI allow; CLI status-fd wins.
        assert_eq!(options.allow, vec!["read", "write"]);
        assert_eq!(options.status_fd, 3);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = Cli::try_parse_from([
            "sealexec",
            "--config-file",
            "/nonexistent/sealexec.conf",
            "/bin/true",
        ])
        .unwrap();
        assert!(cli.into_options().is_err());
    }
}
