//! JavaVm: the process-wide handle to a running VM
//!
//! Unlike [`Env`], a [`JavaVm`] may be copied freely and shared across
//! threads. It is the only thing a background thread needs to get its own
//! environment, either ambiently ([`JavaVm::get_env`]) or by attaching
//! ([`JavaVm::attach_current_thread`]).
//!
//! A library loaded by the VM usually records the VM once in `JNI_OnLoad`;
//! [`on_load`] does exactly that and [`installed`] hands it back later.

use std::ffi::c_void;
use std::ptr::{self, NonNull};

use once_cell::sync::OnceCell;

use crate::attach::{AttachGuard, AttachOptions};
use crate::env::Env;
use crate::error::{JniError, JniResult};
use crate::macros::vm_entry;
use crate::sys;

/// JNI interface version requested when none is given
pub const DEFAULT_VERSION: sys::jint = sys::JNI_VERSION_1_6;

/// Handle to a Java VM
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct JavaVm {
    raw: NonNull<sys::JavaVM>,
}

// SAFETY: the invocation interface is documented as callable from any thread.
unsafe impl Send for JavaVm {}
unsafe impl Sync for JavaVm {}

impl JavaVm {
    /// Wrap a raw `JavaVM*`.
    ///
    /// # Safety
    /// `raw` must point to a VM that outlives every use of the handle.
    pub unsafe fn from_raw(raw: *mut sys::JavaVM) -> JniResult<Self> {
        let raw = NonNull::new(raw).ok_or(JniError::NullHandle("JavaVM"))?;
        if (*raw.as_ptr()).is_null() {
            return Err(JniError::NullHandle("JNIInvokeInterface"));
        }
        Ok(JavaVm { raw })
    }

    /// The raw `JavaVM*`
    #[inline]
    pub fn as_raw(&self) -> *mut sys::JavaVM {
        self.raw.as_ptr()
    }

    /// The current thread's environment if the thread is attached.
    ///
    /// `Ok(None)` means the thread is detached. The returned [`Env`] is not
    /// tied to the attachment; prefer
    /// [`attach_current_thread`](Self::attach_current_thread), which hands
    /// an already attached thread an ambient guard that keeps the borrow
    /// honest:
    ///
    /// ```compile_fail
    /// fn escape(vm: jnigate::JavaVm) -> jnigate::JniResult<()> {
    ///     let guard = vm.attach_current_thread()?;
    ///     let env = guard.env();
    ///     drop(guard);
    ///     env.version()?;
    ///     Ok(())
    /// }
    /// ```
    ///
    /// # Safety
    /// The returned environment must not be used after the current thread
    /// detaches, which includes dropping the last [`AttachGuard`] of this
    /// thread.
    pub unsafe fn get_env(&self) -> JniResult<Option<Env<'_>>> {
        self.get_env_version(DEFAULT_VERSION)
    }

    /// True if the current thread is attached to this VM
    pub fn is_current_thread_attached(&self) -> JniResult<bool> {
        self.get_env_version(DEFAULT_VERSION).map(|env| env.is_some())
    }

    /// Environment lookup at a given interface version.
    ///
    /// Callers keep the returned env within the attachment that produced it.
    pub(crate) fn get_env_version(&self, version: sys::jint) -> JniResult<Option<Env<'_>>> {
        let get_env = vm_entry!(self.as_raw(), GetEnv)?;
        let mut env: *mut c_void = ptr::null_mut();
        let code = unsafe { get_env(self.as_raw(), &mut env, version) };
        match code {
            sys::JNI_OK => unsafe { Env::from_raw(env as *mut sys::JNIEnv) }.map(Some),
            sys::JNI_EDETACHED => Ok(None),
            sys::JNI_EVERSION => Err(JniError::UnsupportedVersion(version)),
            code => Err(JniError::Call {
                call: "GetEnv",
                code,
            }),
        }
    }

    /// Like [`get_env`](Self::get_env) but a detached thread is an error
    ///
    /// # Safety
    /// Same contract as [`get_env`](Self::get_env).
    pub unsafe fn require_env(&self) -> JniResult<Env<'_>> {
        self.get_env()?.ok_or(JniError::Detached)
    }

    /// Attach the current thread with default options.
    pub fn attach_current_thread(&self) -> JniResult<AttachGuard> {
        AttachGuard::attach(*self, &AttachOptions::default())
    }

    /// Attach the current thread, naming it or making it a daemon.
    pub fn attach_current_thread_with(&self, options: &AttachOptions) -> JniResult<AttachGuard> {
        AttachGuard::attach(*self, options)
    }

    /// Run `f` with an environment for the current thread, attaching for
    /// the duration of the call if needed.
    pub fn with_attached<F, T>(&self, f: F) -> JniResult<T>
    where
        F: FnOnce(&Env<'_>) -> JniResult<T>,
    {
        let guard = self.attach_current_thread()?;
        let result = f(&guard.env());
        drop(guard);
        result
    }
}

// ============================================================================
// Process-wide VM
// ============================================================================

static JAVA_VM: OnceCell<JavaVm> = OnceCell::new();

/// Record `vm` as the process VM. Installing the same VM again is a no-op.
pub fn install(vm: JavaVm) -> JniResult<()> {
    let current = JAVA_VM.get_or_init(|| {
        log::debug!("Installed Java VM {:p}", vm.as_raw());
        vm
    });
    if *current == vm {
        Ok(())
    } else {
        Err(JniError::VmAlreadyInstalled)
    }
}

/// The VM recorded by [`install`] or [`on_load`]
pub fn installed() -> Option<JavaVm> {
    JAVA_VM.get().copied()
}

/// Body of a library's `JNI_OnLoad`:
///
/// ```ignore
/// #[no_mangle]
/// pub unsafe extern "system" fn JNI_OnLoad(vm: *mut sys::JavaVM, _: *mut c_void) -> sys::jint {
///     jnigate::vm::on_load(vm)
/// }
/// ```
///
/// Returns the JNI version the library needs, or `JNI_ERR`.
///
/// # Safety
/// `raw` must be the VM pointer passed to `JNI_OnLoad`.
pub unsafe fn on_load(raw: *mut sys::JavaVM) -> sys::jint {
    let installed = JavaVm::from_raw(raw).and_then(install);
    match installed {
        Ok(()) => DEFAULT_VERSION,
        Err(err) => {
            log::error!("JNI_OnLoad failed: {err}");
            sys::JNI_ERR
        }
    }
}
