//! Parses the legacy glued-short-flag argument grammar into a [`Limits`]
//! plus the child's argv.
//!
//! This grammar doesn't fit a declarative argument parser: flags have no
//! long form, take their value glued onto the same token (`-T10000`, not
//! `-T 10000` or `-T=10000`), and `-i` is unusual in that it is valid both
//! bare (meaning -1) and with a glued value. Tokens are scanned while they
//! start with `-`, dispatched on the second character, consuming the
//! remainder of that same token as the value.

use crate::limits::MAX_MOUNTS;
use crate::Limits;

/// Parsed command line: the limits to run under, plus the child's program
/// and its own arguments (`argv[0]` is the program to exec).
#[derive(Debug, Clone)]
pub struct ParsedArgs {
    pub limits: Limits,
    pub child_argv: Vec<String>,
}

/// Scans `args` (not including the program name). Stops at the first
/// token that doesn't start with `-`; that token and everything after it
/// becomes `child_argv`.
pub fn parse<I, S>(args: I) -> ParsedArgs
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut limits = Limits::default();
    let mut child_argv = Vec::new();
    let mut iter = args.into_iter().map(|s| s.as_ref().to_string()).peekable();

    while let Some(tok) = iter.peek() {
        if !tok.starts_with('-') || tok.len() < 2 {
            break;
        }
        let tok = iter.next().unwrap();
        let flag = tok.as_bytes()[1] as char;
        let rest = &tok[2..];
        match flag {
            'p' => limits.max_procs = rest.parse().unwrap_or(limits.max_procs),
            'o' => limits.max_output_bytes = rest.parse().unwrap_or(limits.max_output_bytes),
            'T' => limits.max_wallclock_ms = rest.parse().unwrap_or(limits.max_wallclock_ms),
            't' => limits.max_cpu_ms = rest.parse().unwrap_or(limits.max_cpu_ms),
            's' => {
                limits.max_address_space_bytes =
                    rest.parse().unwrap_or(limits.max_address_space_bytes)
            }
            'f' => limits.allow_files = rest.parse::<i64>().unwrap_or(0) > 0,
            'r' => limits.chroot_jail = true,
            'n' => limits.unshare_network = true,
            'u' => limits.sandbox_user = rest.to_string(),
            'd' => {
                if limits.mount_sources.len() < MAX_MOUNTS {
                    limits.mount_sources.push(rest.to_string());
                }
            }
            'i' => {
                limits.unread_input_allowed = if rest.is_empty() {
                    -1
                } else {
                    rest.parse().unwrap_or(-1)
                };
            }
            'b' => limits.binary_input = true,
            'm' => limits.stdout_errors = true,
            'q' => limits.quiet = true,
            'x' => limits.user_mutex = true,
            _ => {}
        }
    }

    child_argv.extend(iter);
    limits.clamp();
    ParsedArgs {
        limits,
        child_argv,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn hello_uses_defaults() {
        let p = parse(args("echo hi"));
        assert_eq!(p.limits, Limits::default());
        assert_eq!(p.child_argv, vec!["echo", "hi"]);
    }

    #[test]
    fn glued_numeric_flags() {
        let p = parse(args("-T500 -o10 sleep 5"));
        assert_eq!(p.limits.max_wallclock_ms, 500);
        assert_eq!(p.limits.max_output_bytes, 10);
        assert_eq!(p.child_argv, vec!["sleep", "5"]);
    }

    #[test]
    fn bare_i_means_any() {
        let p = parse(args("-i head -c0"));
        assert_eq!(p.limits.unread_input_allowed, -1);
        assert_eq!(p.child_argv, vec!["head", "-c0"]);
    }

    #[test]
    fn i_with_value() {
        let p = parse(args("-i0 head -c0"));
        assert_eq!(p.limits.unread_input_allowed, 0);
        let p = parse(args("-i5 head -c0"));
        assert_eq!(p.limits.unread_input_allowed, 5);
    }

    #[test]
    fn repeated_mount_flags_append_in_order() {
        let p = parse(args("-d/a -d/b -d/c true"));
        assert_eq!(p.limits.mount_sources, vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn mount_flags_beyond_cap_are_dropped() {
        let mut a = Vec::new();
        for i in 0..20 {
            a.push(format!("-d/m{}", i));
        }
        a.push("true".to_string());
        let p = parse(a);
        assert_eq!(p.limits.mount_sources.len(), MAX_MOUNTS);
    }

    #[test]
    fn boolean_flags() {
        let p = parse(args("-r -n -b -m -q -x true"));
        assert!(p.limits.chroot_jail);
        assert!(p.limits.unshare_network);
        assert!(p.limits.binary_input);
        assert!(p.limits.stdout_errors);
        assert!(p.limits.quiet);
        assert!(p.limits.user_mutex);
    }

    #[test]
    fn sandbox_user_flag() {
        let p = parse(args("-unobody true"));
        assert_eq!(p.limits.sandbox_user, "nobody");
    }

    #[test]
    fn max_procs_is_clamped_during_parse() {
        let p = parse(args("-p0 true"));
        assert_eq!(p.limits.max_procs, 1);
        let p = parse(args("-p1000 true"));
        assert_eq!(p.limits.max_procs, 100);
    }

    #[test]
    fn child_argv_starting_with_dash_is_never_consumed_as_a_flag_value() {
        // once a non-flag token is seen, everything after it (even
        // dash-prefixed) belongs to the child.
        let p = parse(args("-T500 head -c0"));
        assert_eq!(p.child_argv, vec!["head", "-c0"]);
    }
}
