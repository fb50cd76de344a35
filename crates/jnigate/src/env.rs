//! Env: the thread-scoped capability for calling into the VM
//!
//! An [`Env`] wraps the raw `JNIEnv*` of the current thread. It is neither
//! `Send` nor `Sync`: the raw pointer is only valid on the thread that
//! obtained it, and the type system keeps it there. The lifetime `'a` is the
//! extent of the local reference frame; every local reference handed out by
//! an `Env<'a>` borrows for `'a`.
//!
//! Most operations live next to the component they belong to:
//! - resolution (`find_class`, `get_method_id`, ...) in `resolve`
//! - dispatch (`call_method`, `call_int_method`, `new_object`, ...) in `dispatch`
//! - field access in `field`
//! - exception inspection and clearing in `gate`
//! - promotion to global references in `global_ref`

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use crate::error::{JniError, JniResult};
use crate::gate;
use crate::macros::jni_entry;
use crate::refs::{JString, Reference};
use crate::sys;
use crate::vm::JavaVm;

/// Thread-affine handle for issuing calls into the VM.
pub struct Env<'a> {
    raw: NonNull<sys::JNIEnv>,
    _frame: PhantomData<&'a ()>,
}

impl<'a> Env<'a> {
    /// Wrap the raw environment pointer a native method received.
    ///
    /// # Safety
    /// `raw` must be the `JNIEnv*` of the current thread, and the thread must
    /// stay attached for `'a`.
    pub unsafe fn from_raw(raw: *mut sys::JNIEnv) -> JniResult<Self> {
        let raw = NonNull::new(raw).ok_or(JniError::NullHandle("JNIEnv"))?;
        if (*raw.as_ptr()).is_null() {
            return Err(JniError::NullHandle("JNINativeInterface"));
        }
        Ok(Env {
            raw,
            _frame: PhantomData,
        })
    }

    /// Wrap a pointer already known to be a live environment of this thread
    pub(crate) unsafe fn from_non_null(raw: NonNull<sys::JNIEnv>) -> Self {
        Env {
            raw,
            _frame: PhantomData,
        }
    }

    /// The raw `JNIEnv*`
    #[inline]
    pub fn as_raw(&self) -> *mut sys::JNIEnv {
        self.raw.as_ptr()
    }

    #[inline]
    pub(crate) fn as_non_null(&self) -> NonNull<sys::JNIEnv> {
        self.raw
    }

    /// Interface version reported by the VM
    pub fn version(&self) -> JniResult<sys::jint> {
        let get_version = jni_entry!(self.as_raw(), GetVersion)?;
        Ok(unsafe { get_version(self.as_raw()) })
    }

    /// The VM this environment belongs to
    pub fn java_vm(&self) -> JniResult<JavaVm> {
        let get_java_vm = jni_entry!(self.as_raw(), GetJavaVM)?;
        let mut vm: *mut sys::JavaVM = ptr::null_mut();
        let code = unsafe { get_java_vm(self.as_raw(), &mut vm) };
        if code != sys::JNI_OK {
            return Err(JniError::Call {
                call: "GetJavaVM",
                code,
            });
        }
        unsafe { JavaVm::from_raw(vm) }
    }

    // ========================================================================
    // Strings
    // ========================================================================

    /// Create a `java.lang.String` from UTF-8 text.
    ///
    /// The text is re-encoded as the VM's modified UTF-8, so NUL and
    /// supplementary characters survive the trip.
    pub fn new_string(&self, text: &str) -> JniResult<&'a JString> {
        let text = modified_utf8(text, "NewStringUTF")?;

        gate::check(self, "NewStringUTF")?;
        let new_string_utf = jni_entry!(self.as_raw(), NewStringUTF)?;
        let raw = unsafe { new_string_utf(self.as_raw(), text.as_ptr()) };
        let raw = gate::check_allocated(self, "NewStringUTF", raw)?;
        Ok(unsafe { &*(raw.as_ptr() as *const JString) })
    }

    /// Copy the contents of a `java.lang.String`
    pub fn get_string(&self, string: &JString) -> JniResult<String> {
        gate::check(self, "GetStringUTFChars")?;
        let get_chars = jni_entry!(self.as_raw(), GetStringUTFChars)?;
        let release_chars = jni_entry!(self.as_raw(), ReleaseStringUTFChars)?;

        let chars = unsafe { get_chars(self.as_raw(), string.as_raw(), ptr::null_mut()) };
        let text = if chars.is_null() {
            None
        } else {
            let bytes = unsafe { CStr::from_ptr(chars) }.to_bytes();
            let text = cesu8::from_java_cesu8(bytes).map(|text| text.into_owned());
            // The buffer goes back even when an exception is pending
            unsafe { release_chars(self.as_raw(), string.as_raw(), chars) };
            Some(text)
        };

        gate::check(self, "GetStringUTFChars")?;
        match text {
            Some(Ok(text)) => Ok(text),
            Some(Err(_)) => Err(JniError::Encoding {
                call: "GetStringUTFChars",
            }),
            None => Err(JniError::OutOfResources {
                call: "GetStringUTFChars",
            }),
        }
    }
}

/// Encode `text` as a NUL-terminated modified UTF-8 string
pub(crate) fn modified_utf8(text: &str, call: &'static str) -> JniResult<CString> {
    // Modified UTF-8 encodes U+0000 as C0 80, so no interior NUL remains
    CString::new(cesu8::to_java_cesu8(text).into_owned()).map_err(|_| JniError::Encoding { call })
}

impl std::fmt::Debug for Env<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Env({:p})", self.raw.as_ptr())
    }
}
