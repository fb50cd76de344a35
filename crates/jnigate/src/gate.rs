//! Exception gate
//!
//! The pending-exception flag is sticky per environment, and almost every JNI
//! function is undefined while it is set. This module is the only code that
//! queries, raises or clears it. Every gated call runs the same sequence:
//!
//! 1. [`check`] before the call: a pending exception rejects the call without
//!    issuing it.
//! 2. The raw call.
//! 3. [`check`] after the call: a pending exception discards the raw result
//!    and fails with [`JniError::ForeignException`].
//! 4. The raw result is normalized: primitives pass through unchanged, a
//!    null object becomes `None`.
//!
//! The exception is never cleared implicitly; callers decide whether to
//! inspect it, clear it, or return to Java and let it propagate.

use std::ptr::NonNull;

use crate::env::{modified_utf8, Env};
use crate::error::{JniError, JniResult};
use crate::macros::jni_entry;
use crate::refs::{Class, Reference, Throwable};
use crate::sys;

// ============================================================================
// Gate primitives
// ============================================================================

/// Query the pending flag
pub(crate) fn pending(env: &Env<'_>) -> JniResult<bool> {
    let exception_check = jni_entry!(env.as_raw(), ExceptionCheck)?;
    Ok(unsafe { exception_check(env.as_raw()) } != sys::JNI_FALSE)
}

/// Fail with `ForeignException` if an exception is pending
pub(crate) fn check(env: &Env<'_>, call: &'static str) -> JniResult<()> {
    if pending(env)? {
        Err(JniError::ForeignException { call })
    } else {
        Ok(())
    }
}

/// Pass a primitive result through once no exception is pending
#[inline]
pub(crate) fn check_value<T>(env: &Env<'_>, call: &'static str, raw: T) -> JniResult<T> {
    check(env, call)?;
    Ok(raw)
}

/// Gate an object result; null is valid data
pub(crate) fn check_object<'a, T: Reference>(
    env: &Env<'a>,
    call: &'static str,
    raw: sys::jobject,
) -> JniResult<Option<&'a T>> {
    check(env, call)?;
    Ok(unsafe { T::from_raw(raw) })
}

/// Gate a result where null means the runtime could not allocate
pub(crate) fn check_allocated(
    env: &Env<'_>,
    call: &'static str,
    raw: sys::jobject,
) -> JniResult<NonNull<sys::_jobject>> {
    check(env, call)?;
    NonNull::new(raw).ok_or(JniError::OutOfResources { call })
}

/// Gate a resolution result where null means "not found", exception or not.
/// The runtime's own `NoSuchMethodError` and friends stay pending.
pub(crate) fn check_resolved<T>(
    raw: *mut T,
    fail: impl FnOnce(bool) -> JniError,
) -> JniResult<NonNull<T>> {
    NonNull::new(raw).ok_or_else(|| fail(false))
}

/// Refuse a resolution call while an exception is pending; `fail(true)`
/// marks the lookup as preempted.
pub(crate) fn ensure_resolvable(
    env: &Env<'_>,
    fail: impl FnOnce(bool) -> JniError,
) -> JniResult<()> {
    if pending(env)? {
        Err(fail(true))
    } else {
        Ok(())
    }
}

// ============================================================================
// Explicit exception operations
// ============================================================================

impl<'a> Env<'a> {
    /// True if an exception is pending on this environment
    pub fn exception_check(&self) -> JniResult<bool> {
        pending(self)
    }

    /// The pending exception, if any, as a local reference
    pub fn exception_occurred(&self) -> JniResult<Option<&'a Throwable>> {
        let exception_occurred = jni_entry!(self.as_raw(), ExceptionOccurred)?;
        let raw = unsafe { exception_occurred(self.as_raw()) };
        Ok(unsafe { Throwable::from_raw(raw) })
    }

    /// Clear the pending exception
    pub fn exception_clear(&self) -> JniResult<()> {
        let exception_clear = jni_entry!(self.as_raw(), ExceptionClear)?;
        unsafe { exception_clear(self.as_raw()) };
        Ok(())
    }

    /// Print the pending exception and its backtrace to the VM's error
    /// stream. Clears the exception as a side effect.
    pub fn exception_describe(&self) -> JniResult<()> {
        let exception_describe = jni_entry!(self.as_raw(), ExceptionDescribe)?;
        unsafe { exception_describe(self.as_raw()) };
        Ok(())
    }

    /// Take the pending exception: returns it and clears the flag.
    pub fn exception_take(&self) -> JniResult<Option<&'a Throwable>> {
        let throwable = self.exception_occurred()?;
        if throwable.is_some() {
            self.exception_clear()?;
        }
        Ok(throwable)
    }

    /// Raise `throwable` in the calling Java frame
    pub fn throw(&self, throwable: &Throwable) -> JniResult<()> {
        check(self, "Throw")?;
        let throw = jni_entry!(self.as_raw(), Throw)?;
        let code = unsafe { throw(self.as_raw(), throwable.as_raw()) };
        if code != sys::JNI_OK {
            return Err(JniError::Call { call: "Throw", code });
        }
        Ok(())
    }

    /// Construct and raise a new exception of `class` with `message`
    pub fn throw_new(&self, class: &Class, message: &str) -> JniResult<()> {
        check(self, "ThrowNew")?;
        let message = modified_utf8(message, "ThrowNew")?;
        let throw_new = jni_entry!(self.as_raw(), ThrowNew)?;
        let code = unsafe { throw_new(self.as_raw(), class.as_raw(), message.as_ptr()) };
        if code != sys::JNI_OK {
            return Err(JniError::Call {
                call: "ThrowNew",
                code,
            });
        }
        Ok(())
    }
}
