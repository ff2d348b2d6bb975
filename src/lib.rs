/*!
 * This crate runs an untrusted child process under strict resource and
 * isolation limits, mediating its standard streams through a
 * pseudo-terminal, and returns a structured exit code describing whatever
 * misbehavior (if any) was observed.
 *
 * # Platform support
 * The isolation primitives this crate relies on (namespaces, chroot,
 * pseudo-terminals, `setrlimit`) are Linux-specific; there is no other
 * backend.
 */
pub mod exit;
mod limits;

pub mod cli;

#[cfg(target_os = "linux")]
pub mod linux;

mod check;
pub use check::{check, CheckResult};

pub use exit::{classify, WaitOutcome, APP_FAILURE_BASE, IHS_ERROR};
pub use limits::Limits;

#[cfg(target_os = "linux")]
pub use crate::linux::{run, Error};
