use std::{
    ffi::{c_char, c_int},
    panic::AssertUnwindSafe,
};

use common_error::LocatorResult;

use super::strings::new_cstr;

/// Run a fallible closure, catching panics and converting to a C-style
/// return code. On error or panic, writes a message to `*errmsg`.
///
/// # Safety
///
/// `errmsg` must be null or valid for writes.
#[rustfmt::skip]
pub unsafe fn trampoline(
    errmsg: *mut *mut c_char,
    panic_msg: &str,
    f: impl FnOnce() -> LocatorResult<()>,
) -> c_int {
    let message = match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => return 0,
        Ok(Err(e)) => e.to_string(),
        Err(_)     => panic_msg.to_string(),
    };
    if !errmsg.is_null() {
        unsafe { *errmsg = new_cstr(message) };
    }
    1
}
