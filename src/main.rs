use std::ffi::OsString;
use std::os::fd::BorrowedFd;

use anyhow::Result;
use clap::Parser;

use sealexec::cli::Cli;
use sealexec::filter::EscalationMode;
use sealexec::launch::{self, LaunchRequest};
use sealexec::options::{Options, PROGRAM_NAME};
use sealexec::syscalls;

/// Syscalls even a minimal dynamically linked program needs. Missing ones
/// are worth a warning before the handoff.
const REQUIRED_SYSCALLS: &[&str] = &["execve", "brk", "mmap", "write"];

fn main() {
    if let Err(err) = run() {
        eprintln!("{PROGRAM_NAME}: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = Cli::parse().into_options()?;

    let log_level = if options.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if options.dump_syscalls {
        dump_syscalls();
        return Ok(());
    }

    options.validate()?;
    let allow = options.resolve_allow_list()?;

    // Keep the audit channel out of the target program's fd table.
    if options.status_fd > 2 {
        mark_close_on_exec(options.status_fd)?;
    }

    for name in REQUIRED_SYSCALLS {
        if !options.is_syscall_allowed(name) {
            tracing::warn!("syscall {} is not allowed, program might fail", name);
        }
    }

    let env: Vec<(OsString, OsString)> = std::env::vars_os().collect();

    // The descriptor comes from the caller's environment and outlives this
    // function; validity beyond that is checked by the launcher.
    let log_fd = unsafe { BorrowedFd::borrow_raw(options.status_fd) };

    let request = LaunchRequest {
        argv: &options.command,
        env: &env,
        log_fd,
        tag: PROGRAM_NAME,
        verbose: options.verbose,
        allow_any_syscalls: options.allow_any_syscalls,
        allow: &allow,
        mode: escalation_mode(&options),
    };

    // Only returns on failure; on success the process image is gone.
    let err = launch::launch(&request);
    Err(err.into())
}

fn escalation_mode(options: &Options) -> EscalationMode {
    if options.trap {
        EscalationMode::Trap
    } else {
        EscalationMode::Kill
    }
}

fn dump_syscalls() {
    let table = syscalls::numbered();
    println!("# arch {}, {} known syscalls", std::env::consts::ARCH, table.len());
    for (number, name) in table {
        println!("{number:4} {name}");
    }
}

fn mark_close_on_exec(fd: i32) -> Result<()> {
    use nix::fcntl::{FcntlArg, FdFlag, fcntl};

    let fd = unsafe { BorrowedFd::borrow_raw(fd) };
    fcntl(fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
        .map_err(|errno| anyhow::anyhow!("cannot mark status fd close-on-exec: {errno}"))?;
    Ok(())
}
