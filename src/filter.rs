//! Seccomp policy builder: default-deny syscall filter assembly and
//! irreversible activation.
//!
//! The filter allows exactly the syscalls on an explicit allow-list and
//! applies the escalation action to everything else. Once
//! [`FilterPolicy::activate`] loads the filter, the kernel enforces it for
//! the rest of this process's life; nothing in this crate can remove or
//! relax it.

use std::collections::BTreeMap;

use seccompiler::{BpfProgram, SeccompAction, SeccompFilter, SeccompRule, TargetArch};
use thiserror::Error;

/// Action taken when the program makes a syscall outside the allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationMode {
    /// Terminate the process immediately.
    Kill,
    /// Deliver SIGSYS instead, so a debugger or signal handler can inspect
    /// the violation.
    Trap,
}

impl EscalationMode {
    /// The seccomp action applied to an out-of-policy syscall.
    ///
    /// An architecture mismatch is not governed by this: the compiled BPF
    /// prologue kills the process on a foreign syscall ABI under both modes.
    fn action(self) -> SeccompAction {
        match self {
            EscalationMode::Kill => SeccompAction::KillProcess,
            EscalationMode::Trap => SeccompAction::Trap,
        }
    }
}

/// Errors from policy assembly and activation. Each message names the
/// failing step and carries the platform diagnostic for it.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The native architecture has no seccomp backend.
    #[error("seccomp does not support the native architecture '{arch}': {reason}")]
    BadArch { arch: &'static str, reason: String },

    /// An allow-list entry was rejected before it reached the kernel.
    #[error("cannot add allow rule for syscall {syscall}: negative syscall identifier")]
    RuleAdd { syscall: i64 },

    /// The filter context could not be constructed.
    #[error("seccomp filter creation failed: {reason}")]
    Init { reason: String },

    /// The no-new-privileges control could not be set.
    #[error("prctl(PR_SET_NO_NEW_PRIVS) failed with code {code}: {desc}")]
    NoNewPrivs { code: i32, desc: String },

    /// BPF compilation or the kernel load itself failed.
    #[error("seccomp filter load failed: {reason}")]
    Load { reason: String },
}

/// An assembled, not-yet-loaded syscall policy.
///
/// The value owns the whole in-process filter state; dropping it on any
/// error path releases everything without touching the kernel. Only
/// [`activate`](Self::activate) has a kernel-visible effect.
#[derive(Debug)]
pub struct FilterPolicy {
    mode: EscalationMode,
    rules: BTreeMap<i64, Vec<SeccompRule>>,
}

impl FilterPolicy {
    /// Assemble a policy from an explicit-length allow-list.
    ///
    /// Every identifier gets one unconditional allow rule; duplicates
    /// collapse. Identifiers are validated locally: a negative id fails
    /// fast with the offending value, and entries after the first invalid
    /// one are not inspected. Syscall 0 (`read` on x86-64) is a legitimate
    /// entry. Positive ids unknown to the kernel are left alone; an allow
    /// rule for a nonexistent syscall is inert.
    pub fn assemble(allow: &[i64], mode: EscalationMode) -> Result<Self, FilterError> {
        let mut rules: BTreeMap<i64, Vec<SeccompRule>> = BTreeMap::new();
        for &syscall in allow {
            if syscall < 0 {
                return Err(FilterError::RuleAdd { syscall });
            }
            // An empty rule vector is seccompiler's unconditional match.
            rules.insert(syscall, Vec::new());
        }
        Ok(Self { mode, rules })
    }

    /// Number of distinct syscalls the policy will allow.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn mode(&self) -> EscalationMode {
        self.mode
    }

    /// Compile the policy to a loadable BPF program. Pure computation, no
    /// kernel interaction.
    fn compile(self) -> Result<BpfProgram, FilterError> {
        let arch: TargetArch = std::env::consts::ARCH.try_into().map_err(
            |e: seccompiler::BackendError| FilterError::BadArch {
                arch: std::env::consts::ARCH,
                reason: e.to_string(),
            },
        )?;

        let filter = SeccompFilter::new(self.rules, self.mode.action(), SeccompAction::Allow, arch)
            .map_err(|e| FilterError::Init {
                reason: e.to_string(),
            })?;

        filter
            .try_into()
            .map_err(|e: seccompiler::BackendError| FilterError::Load {
                reason: e.to_string(),
            })
    }

    /// Load the policy into the kernel for this process.
    ///
    /// Sets PR_SET_NO_NEW_PRIVS first; this is unconditional, so a set-uid
    /// binary executed after the handoff cannot re-escalate. Not reversible:
    /// after a successful return every thread of this process runs under the
    /// filter until exit. On failure nothing was loaded and the process's
    /// syscall surface is unchanged.
    pub fn activate(self) -> Result<(), FilterError> {
        let bpf = self.compile()?;

        set_no_new_privs()?;

        seccompiler::apply_filter(&bpf).map_err(|e| FilterError::Load {
            reason: e.to_string(),
        })
    }
}

/// Assemble and activate in one step. This is what the launcher calls.
pub fn build_and_activate(allow: &[i64], mode: EscalationMode) -> Result<(), FilterError> {
    FilterPolicy::assemble(allow, mode)?.activate()
}

fn set_no_new_privs() -> Result<(), FilterError> {
    // prctl(PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0)
    let ret = unsafe { libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(FilterError::NoNewPrivs {
            code: err.raw_os_error().unwrap_or(-1),
            desc: err.to_string(),
        });
    }
    Ok(())
}
