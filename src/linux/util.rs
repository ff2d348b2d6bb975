use libc::c_char;
use std::ffi::{CString, OsStr};
use std::os::unix::ffi::OsStrExt;

pub fn cvt_error(n: nix::Error) -> std::io::Error {
    match n.as_errno() {
        Some(errno) => std::io::Error::from_raw_os_error(errno as i32),
        None => std::io::Error::new(std::io::ErrorKind::Other, n),
    }
}

/// Duplicates a Rust string into a heap-allocated, NUL-terminated C string,
/// for building an argv/envp array to hand to `execvp`.
pub fn duplicate_string(arg: &OsStr) -> *mut c_char {
    unsafe {
        let cstr = CString::new(arg.as_bytes()).expect("argument contains an interior NUL");
        libc::strdup(cstr.as_ptr())
    }
}
