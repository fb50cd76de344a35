//! Thread attachment
//!
//! A thread the VM did not create has no environment until it attaches.
//! [`AttachGuard`] owns one attachment. Guards are reference counted per
//! thread and per VM: nesting them is fine, every guard yields a working
//! environment, and only the last one to go away detaches. A thread that was
//! already attached by someone else (the VM's own threads, or native code
//! not using this crate) gets an ambient guard which never detaches.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use rustc_hash::FxHashMap;

use crate::env::{modified_utf8, Env};
use crate::error::{JniError, JniResult};
use crate::macros::vm_entry;
use crate::sys;
use crate::vm::{JavaVm, DEFAULT_VERSION};

/// Options for attaching the current thread
#[derive(Debug, Clone)]
pub struct AttachOptions {
    /// Requested interface version
    pub version: sys::jint,
    /// Name the thread will have inside the VM
    pub thread_name: Option<String>,
    /// Attach as a daemon thread, which does not keep the VM alive
    pub daemon: bool,
}

impl Default for AttachOptions {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION,
            thread_name: None,
            daemon: false,
        }
    }
}

impl AttachOptions {
    /// Default options with a thread name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            thread_name: Some(name.into()),
            ..Self::default()
        }
    }
}

thread_local! {
    /// Live guards on this thread, keyed by VM address
    static ATTACHED: RefCell<FxHashMap<usize, usize>> = RefCell::new(FxHashMap::default());
}

fn vm_key(vm: &JavaVm) -> usize {
    vm.as_raw() as usize
}

fn guard_count(vm: &JavaVm) -> usize {
    ATTACHED.with(|map| map.borrow().get(&vm_key(vm)).copied().unwrap_or(0))
}

fn set_guard_count(vm: &JavaVm, count: usize) {
    ATTACHED.with(|map| {
        let mut map = map.borrow_mut();
        if count == 0 {
            map.remove(&vm_key(vm));
        } else {
            map.insert(vm_key(vm), count);
        }
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Counted attachment made by this crate
    Owned,
    /// Thread was attached before any guard existed
    Ambient,
}

/// An attachment of the current thread to a VM.
///
/// Not `Send`: the attachment belongs to the thread that made it.
#[derive(Debug)]
pub struct AttachGuard {
    vm: JavaVm,
    env: NonNull<sys::JNIEnv>,
    mode: Mode,
    _not_send: PhantomData<*mut ()>,
}

impl AttachGuard {
    pub(crate) fn attach(vm: JavaVm, options: &AttachOptions) -> JniResult<Self> {
        let count = guard_count(&vm);
        if count > 0 {
            let env = vm
                .get_env_version(options.version)?
                .ok_or(JniError::Detached)?
                .as_non_null();
            set_guard_count(&vm, count + 1);
            return Ok(Self::new(vm, env, Mode::Owned));
        }

        if let Some(env) = vm.get_env_version(options.version)? {
            log::trace!("Thread already attached to {:p}, using ambient env", vm.as_raw());
            return Ok(Self::new(vm, env.as_non_null(), Mode::Ambient));
        }

        let env = raw_attach(&vm, options)?;
        set_guard_count(&vm, 1);
        log::debug!(
            "Attached thread {:?} to Java VM {:p}{}",
            options.thread_name,
            vm.as_raw(),
            if options.daemon { " as daemon" } else { "" }
        );
        Ok(Self::new(vm, env, Mode::Owned))
    }

    fn new(vm: JavaVm, env: NonNull<sys::JNIEnv>, mode: Mode) -> Self {
        Self {
            vm,
            env,
            mode,
            _not_send: PhantomData,
        }
    }

    /// Environment of the attached thread
    pub fn env(&self) -> Env<'_> {
        // SAFETY: `env` came from a successful attach or GetEnv on this
        // thread and stays valid while the guard lives.
        unsafe { Env::from_non_null(self.env) }
    }

    /// The VM this guard is attached to
    pub fn vm(&self) -> JavaVm {
        self.vm
    }

    /// True if the thread was already attached and this guard will never
    /// detach it
    pub fn is_ambient(&self) -> bool {
        self.mode == Mode::Ambient
    }

    /// Release the guard, reporting a failed detach.
    pub fn detach(self) -> JniResult<()> {
        let this = std::mem::ManuallyDrop::new(self);
        this.release()
    }

    fn release(&self) -> JniResult<()> {
        if self.mode == Mode::Ambient {
            return Ok(());
        }
        let count = guard_count(&self.vm).saturating_sub(1);
        set_guard_count(&self.vm, count);
        if count > 0 {
            return Ok(());
        }

        let detach = vm_entry!(self.vm.as_raw(), DetachCurrentThread)?;
        let code = unsafe { detach(self.vm.as_raw()) };
        if code != sys::JNI_OK {
            return Err(JniError::Call {
                call: "DetachCurrentThread",
                code,
            });
        }
        log::debug!("Detached thread from Java VM {:p}", self.vm.as_raw());
        Ok(())
    }
}

impl Drop for AttachGuard {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            log::error!("Failed to detach thread: {err}");
        }
    }
}

fn raw_attach(vm: &JavaVm, options: &AttachOptions) -> JniResult<NonNull<sys::JNIEnv>> {
    let name = options
        .thread_name
        .as_deref()
        .map(|name| modified_utf8(name, "AttachCurrentThread"))
        .transpose()?;
    let mut args = sys::JavaVMAttachArgs {
        version: options.version,
        name: name.as_ref().map_or(ptr::null_mut(), |n| n.as_ptr() as *mut _),
        group: ptr::null_mut(),
    };
    let args_ptr = &mut args as *mut sys::JavaVMAttachArgs as *mut std::ffi::c_void;

    let mut env: *mut std::ffi::c_void = ptr::null_mut();
    let (call, code) = if options.daemon {
        let attach = vm_entry!(vm.as_raw(), AttachCurrentThreadAsDaemon)?;
        ("AttachCurrentThreadAsDaemon", unsafe {
            attach(vm.as_raw(), &mut env, args_ptr)
        })
    } else {
        let attach = vm_entry!(vm.as_raw(), AttachCurrentThread)?;
        ("AttachCurrentThread", unsafe {
            attach(vm.as_raw(), &mut env, args_ptr)
        })
    };

    match code {
        sys::JNI_OK => NonNull::new(env as *mut sys::JNIEnv).ok_or(JniError::NullHandle("JNIEnv")),
        sys::JNI_EVERSION => Err(JniError::UnsupportedVersion(options.version)),
        code => Err(JniError::Call { call, code }),
    }
}
