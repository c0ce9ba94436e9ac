//! Syscall name resolution for the native architecture.
//!
//! The kernel-facing layers work on raw syscall numbers; this table lets the
//! CLI accept the usual names. Numbers come from `libc::SYS_*`, so the table
//! is correct for whatever target it was compiled for. It is deliberately
//! not exhaustive: it covers the calls a small dynamically linked program
//! needs plus common file, process, and network calls. Anything else can be
//! given numerically.

use libc::c_long;

/// Syscalls present on every Linux architecture this crate supports.
const COMMON: &[(&str, c_long)] = &[
    ("read", libc::SYS_read),
    ("write", libc::SYS_write),
    ("readv", libc::SYS_readv),
    ("writev", libc::SYS_writev),
    ("pread64", libc::SYS_pread64),
    ("pwrite64", libc::SYS_pwrite64),
    ("close", libc::SYS_close),
    ("openat", libc::SYS_openat),
    ("fstat", libc::SYS_fstat),
    ("newfstatat", libc::SYS_newfstatat),
    ("lseek", libc::SYS_lseek),
    ("fcntl", libc::SYS_fcntl),
    ("ioctl", libc::SYS_ioctl),
    ("dup", libc::SYS_dup),
    ("dup3", libc::SYS_dup3),
    ("pipe2", libc::SYS_pipe2),
    ("flock", libc::SYS_flock),
    ("fsync", libc::SYS_fsync),
    ("fdatasync", libc::SYS_fdatasync),
    ("ftruncate", libc::SYS_ftruncate),
    ("getdents64", libc::SYS_getdents64),
    ("getcwd", libc::SYS_getcwd),
    ("chdir", libc::SYS_chdir),
    ("fchdir", libc::SYS_fchdir),
    ("mkdirat", libc::SYS_mkdirat),
    ("unlinkat", libc::SYS_unlinkat),
    ("renameat", libc::SYS_renameat),
    ("readlinkat", libc::SYS_readlinkat),
    ("faccessat", libc::SYS_faccessat),
    ("fchmod", libc::SYS_fchmod),
    ("fchown", libc::SYS_fchown),
    ("umask", libc::SYS_umask),
    ("statfs", libc::SYS_statfs),
    ("mmap", libc::SYS_mmap),
    ("mprotect", libc::SYS_mprotect),
    ("munmap", libc::SYS_munmap),
    ("mremap", libc::SYS_mremap),
    ("madvise", libc::SYS_madvise),
    ("brk", libc::SYS_brk),
    ("rt_sigaction", libc::SYS_rt_sigaction),
    ("rt_sigprocmask", libc::SYS_rt_sigprocmask),
    ("rt_sigreturn", libc::SYS_rt_sigreturn),
    ("sigaltstack", libc::SYS_sigaltstack),
    ("kill", libc::SYS_kill),
    ("tgkill", libc::SYS_tgkill),
    ("execve", libc::SYS_execve),
    ("execveat", libc::SYS_execveat),
    ("exit", libc::SYS_exit),
    ("exit_group", libc::SYS_exit_group),
    ("wait4", libc::SYS_wait4),
    ("clone", libc::SYS_clone),
    ("getpid", libc::SYS_getpid),
    ("gettid", libc::SYS_gettid),
    ("getppid", libc::SYS_getppid),
    ("getuid", libc::SYS_getuid),
    ("geteuid", libc::SYS_geteuid),
    ("getgid", libc::SYS_getgid),
    ("getegid", libc::SYS_getegid),
    ("setresuid", libc::SYS_setresuid),
    ("setresgid", libc::SYS_setresgid),
    ("prctl", libc::SYS_prctl),
    ("prlimit64", libc::SYS_prlimit64),
    ("getrlimit", libc::SYS_getrlimit),
    ("uname", libc::SYS_uname),
    ("futex", libc::SYS_futex),
    ("set_tid_address", libc::SYS_set_tid_address),
    ("set_robust_list", libc::SYS_set_robust_list),
    ("sched_yield", libc::SYS_sched_yield),
    ("sched_getaffinity", libc::SYS_sched_getaffinity),
    ("nanosleep", libc::SYS_nanosleep),
    ("clock_gettime", libc::SYS_clock_gettime),
    ("clock_nanosleep", libc::SYS_clock_nanosleep),
    ("gettimeofday", libc::SYS_gettimeofday),
    ("getrandom", libc::SYS_getrandom),
    ("epoll_create1", libc::SYS_epoll_create1),
    ("epoll_ctl", libc::SYS_epoll_ctl),
    ("epoll_pwait", libc::SYS_epoll_pwait),
    ("ppoll", libc::SYS_ppoll),
    ("pselect6", libc::SYS_pselect6),
    ("eventfd2", libc::SYS_eventfd2),
    ("socket", libc::SYS_socket),
    ("connect", libc::SYS_connect),
    ("accept4", libc::SYS_accept4),
    ("bind", libc::SYS_bind),
    ("listen", libc::SYS_listen),
    ("sendto", libc::SYS_sendto),
    ("sendmsg", libc::SYS_sendmsg),
    ("recvfrom", libc::SYS_recvfrom),
    ("recvmsg", libc::SYS_recvmsg),
    ("shutdown", libc::SYS_shutdown),
    ("getsockname", libc::SYS_getsockname),
    ("getpeername", libc::SYS_getpeername),
    ("setsockopt", libc::SYS_setsockopt),
    ("getsockopt", libc::SYS_getsockopt),
    ("seccomp", libc::SYS_seccomp),
];

/// Legacy calls that exist on x86-64 but were never wired up on aarch64.
#[cfg(target_arch = "x86_64")]
const LEGACY: &[(&str, c_long)] = &[
    ("open", libc::SYS_open),
    ("creat", libc::SYS_creat),
    ("stat", libc::SYS_stat),
    ("lstat", libc::SYS_lstat),
    ("access", libc::SYS_access),
    ("pipe", libc::SYS_pipe),
    ("dup2", libc::SYS_dup2),
    ("select", libc::SYS_select),
    ("poll", libc::SYS_poll),
    ("fork", libc::SYS_fork),
    ("vfork", libc::SYS_vfork),
    ("unlink", libc::SYS_unlink),
    ("mkdir", libc::SYS_mkdir),
    ("rmdir", libc::SYS_rmdir),
    ("rename", libc::SYS_rename),
    ("readlink", libc::SYS_readlink),
    ("chmod", libc::SYS_chmod),
    ("chown", libc::SYS_chown),
    ("getdents", libc::SYS_getdents),
    ("epoll_wait", libc::SYS_epoll_wait),
    ("arch_prctl", libc::SYS_arch_prctl),
    ("time", libc::SYS_time),
    ("alarm", libc::SYS_alarm),
];

#[cfg(not(target_arch = "x86_64"))]
const LEGACY: &[(&str, c_long)] = &[];

/// Look up a syscall number by name.
pub fn resolve(name: &str) -> Option<i64> {
    COMMON
        .iter()
        .chain(LEGACY.iter())
        .find(|(n, _)| *n == name)
        .map(|&(_, number)| number as i64)
}

/// All known (number, name) pairs, sorted by number.
pub fn numbered() -> Vec<(i64, &'static str)> {
    let mut all: Vec<(i64, &'static str)> = COMMON
        .iter()
        .chain(LEGACY.iter())
        .map(|&(name, number)| (number as i64, name))
        .collect();
    all.sort_unstable();
    all
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_names() {
        assert_eq!(resolve("write"), Some(libc::SYS_write as i64));
        assert_eq!(resolve("execve"), Some(libc::SYS_execve as i64));
        assert_eq!(resolve("brk"), Some(libc::SYS_brk as i64));
    }

    #[test]
    fn test_resolve_unknown_name() {
        assert_eq!(resolve("definitely_not_a_syscall"), None);
    }

    #[test]
    fn test_numbered_is_sorted_and_deduplicated() {
        let all = numbered();
        assert!(all.len() >= COMMON.len());
        for pair in all.windows(2) {
            assert!(pair[0].0 < pair[1].0, "duplicate or unsorted: {pair:?}");
        }
    }

    #[test]
    fn test_table_has_no_duplicate_names() {
        let mut names: Vec<&str> = COMMON
            .iter()
            .chain(LEGACY.iter())
            .map(|&(name, _)| name)
            .collect();
        let before = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), before);
    }
}
