//! Secure launcher: applies the syscall policy and replaces the process
//! image with the target program.
//!
//! [`launch`] is the point of no return for the whole crate: on success the
//! calling process image no longer exists, so the function only ever returns
//! an error (the same convention as
//! [`std::os::unix::process::CommandExt::exec`]). Everything that can fail
//! is ordered so that failures happen before the policy is loaded, except
//! the `execve` itself.

use std::convert::Infallible;
use std::ffi::{CString, OsString};
use std::os::fd::{AsRawFd, BorrowedFd};
use std::os::unix::ffi::OsStrExt;

use nix::errno::Errno;
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use nix::unistd;
use thiserror::Error;

use crate::filter::{self, EscalationMode, FilterError};

/// Everything needed for one launch attempt. Borrowed, read-only inputs;
/// the request outlives nothing.
pub struct LaunchRequest<'a> {
    /// Argument vector. `argv[0]` is the program path, handed to `execve`
    /// verbatim; PATH is not searched.
    pub argv: &'a [String],

    /// Environment for the target, passed explicitly rather than read from
    /// process state. The caller usually forwards `std::env::vars_os()`.
    pub env: &'a [(OsString, OsString)],

    /// Pre-opened descriptor for audit lines, opened for append by the
    /// caller. Borrowed: the launcher never closes it.
    pub log_fd: BorrowedFd<'a>,

    /// Prefix for every audit line.
    pub tag: &'a str,

    /// Emit the pre-handoff audit lines.
    pub verbose: bool,

    /// Skip the policy builder entirely and exec unfiltered.
    pub allow_any_syscalls: bool,

    /// Syscall allow-list, explicit length.
    pub allow: &'a [i64],

    pub mode: EscalationMode,
}

/// Launch failures. Every variant renders a non-empty message with the
/// platform diagnostic; there is no success variant because a successful
/// launch does not return.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The logging descriptor could not be acquired. Checked first, before
    /// anything irreversible, so a requested audit trail is guaranteed to
    /// exist by the time the policy loads.
    #[error("cannot acquire logging stream on fd {fd}: {desc}")]
    LoggerAcquisition { fd: i32, desc: String },

    /// The request carried no argument vector at all.
    #[error("argument vector is empty")]
    EmptyArgv,

    /// The policy builder failed; the launch was aborted before handoff.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// `execve` returned, which it only does on failure.
    #[error("execve() of {program} failed with code {code}: {desc}")]
    Exec {
        program: String,
        code: i32,
        desc: &'static str,
    },
}

/// Shared write-only view over the caller's logging descriptor.
///
/// The descriptor stays open for the caller's own bookkeeping; this type
/// holds a borrow, never the descriptor itself, and writes are best-effort.
pub struct AuditLog<'a> {
    fd: BorrowedFd<'a>,
    tag: &'a str,
    verbose: bool,
}

impl<'a> AuditLog<'a> {
    /// Validate the descriptor and take a write view over it.
    ///
    /// Fails when the descriptor is dead or not open for writing. This is
    /// the launcher's first fallible step.
    pub fn acquire(
        fd: BorrowedFd<'a>,
        tag: &'a str,
        verbose: bool,
    ) -> Result<Self, LaunchError> {
        let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(|errno| {
            LaunchError::LoggerAcquisition {
                fd: fd.as_raw_fd(),
                desc: format!("error {}: {}", errno as i32, errno.desc()),
            }
        })?;

        let accmode = OFlag::from_bits_truncate(flags) & OFlag::O_ACCMODE;
        if accmode != OFlag::O_WRONLY && accmode != OFlag::O_RDWR {
            return Err(LaunchError::LoggerAcquisition {
                fd: fd.as_raw_fd(),
                desc: "descriptor is not open for writing".to_string(),
            });
        }

        Ok(Self { fd, tag, verbose })
    }

    /// Write a tagged line regardless of verbosity.
    pub fn error(&self, message: &str) {
        self.write_line(message);
    }

    /// Write a tagged line when verbose.
    pub fn info(&self, message: &str) {
        if self.verbose {
            self.write_line(message);
        }
    }

    fn write_line(&self, message: &str) {
        let line = format!("{}: {}\n", self.tag, message);
        let mut buf = line.as_bytes();
        while !buf.is_empty() {
            match unistd::write(self.fd, buf) {
                Ok(0) => break,
                Ok(n) => buf = &buf[n..],
                Err(Errno::EINTR) => continue,
                Err(_) => break,
            }
        }
    }
}

/// Apply the syscall policy and replace this process with the target.
///
/// Strictly ordered: acquire the audit view, validate the request, build and
/// activate the filter (unless bypassed), emit the two verbose audit lines,
/// `execve`. On success this never returns; the returned value is always the
/// reason the handoff did not happen.
pub fn launch(request: &LaunchRequest<'_>) -> LaunchError {
    match try_launch(request) {
        Ok(never) => match never {},
        Err(err) => err,
    }
}

fn try_launch(request: &LaunchRequest<'_>) -> Result<Infallible, LaunchError> {
    let log = AuditLog::acquire(request.log_fd, request.tag, request.verbose)?;

    // A doomed exec is caught here, while the policy can still not happen.
    if request.argv.is_empty() {
        return Err(LaunchError::EmptyArgv);
    }

    if !request.allow_any_syscalls {
        filter::build_and_activate(request.allow, request.mode)?;
    }

    // From here on this process itself runs under the policy; write and
    // execve must be on the allow-list for the handoff to survive.
    if request.allow_any_syscalls {
        log.info("Skipped seccomp policy (all syscalls allowed)");
    } else {
        log.info("Applied seccomp policy");
    }
    log.info(&format!("Executing command [{}]", request.argv.join(" ")));

    let err = exec_program(request.argv, request.env);
    log.error(&err.to_string());
    Err(err)
}

/// Invoke `execve(2)`. Only returns on failure.
fn exec_program(argv: &[String], env: &[(OsString, OsString)]) -> LaunchError {
    let program = argv[0].clone();

    // Interior NUL bytes cannot cross the syscall boundary; report them the
    // way the kernel would reject a malformed argument.
    let invalid = |program: String| LaunchError::Exec {
        program,
        code: Errno::EINVAL as i32,
        desc: Errno::EINVAL.desc(),
    };

    let mut argv_c = Vec::with_capacity(argv.len());
    for arg in argv {
        match CString::new(arg.as_bytes()) {
            Ok(c) => argv_c.push(c),
            Err(_) => return invalid(program),
        }
    }

    let mut env_c = Vec::with_capacity(env.len());
    for (key, value) in env {
        let mut entry = Vec::with_capacity(key.len() + value.len() + 1);
        entry.extend_from_slice(key.as_bytes());
        entry.push(b'=');
        entry.extend_from_slice(value.as_bytes());
        match CString::new(entry) {
            Ok(c) => env_c.push(c),
            Err(_) => return invalid(program),
        }
    }

    let errno = match unistd::execve(&argv_c[0], &argv_c, &env_c) {
        Ok(never) => match never {},
        Err(errno) => errno,
    };

    LaunchError::Exec {
        program,
        code: errno as i32,
        desc: errno.desc(),
    }
}
