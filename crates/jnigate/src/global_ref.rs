//! Global references
//!
//! A [`GlobalRef`] keeps a Java object alive past the local frame it came
//! from and can be moved to or shared with other threads. It deletes its
//! handle exactly once, when it is dropped or explicitly released.
//!
//! The deleter remembers the VM that created the reference. Dropping on a
//! thread that is attached to that VM uses the ambient environment; on a
//! detached thread the drop attaches for the duration of the delete.

use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::NonNull;

use crate::attach::AttachOptions;
use crate::env::Env;
use crate::error::JniResult;
use crate::gate;
use crate::macros::jni_entry;
use crate::refs::{Object, Reference};
use crate::sys;
use crate::vm::JavaVm;

/// Deletes a global handle in the VM it was created in
#[derive(Debug, Clone, Copy)]
struct GlobalRefDeleter {
    vm: JavaVm,
    /// Interface version the creating env reported
    version: sys::jint,
}

impl GlobalRefDeleter {
    fn delete_with(&self, env: &Env<'_>, raw: sys::jobject) -> JniResult<()> {
        let delete = jni_entry!(env.as_raw(), DeleteGlobalRef)?;
        unsafe { delete(env.as_raw(), raw) };
        log::trace!("Deleted global ref {:p}", raw);
        Ok(())
    }

    fn delete(&self, raw: sys::jobject) -> JniResult<()> {
        if let Some(env) = self.vm.get_env_version(self.version)? {
            return self.delete_with(&env, raw);
        }
        // Detached thread: attach just long enough to delete
        let options = AttachOptions {
            version: self.version,
            ..AttachOptions::default()
        };
        let guard = self.vm.attach_current_thread_with(&options)?;
        let result = self.delete_with(&guard.env(), raw);
        guard.detach()?;
        result
    }
}

/// An owned global reference to a Java object of type `T`.
pub struct GlobalRef<T: Reference = Object> {
    raw: NonNull<T>,
    deleter: GlobalRefDeleter,
    _owns: PhantomData<T>,
}

// SAFETY: global handles are valid on every thread of their VM, and the
// deleter only carries the process-wide VM handle.
unsafe impl<T: Reference> Send for GlobalRef<T> {}
unsafe impl<T: Reference> Sync for GlobalRef<T> {}

impl<T: Reference> GlobalRef<T> {
    /// Borrow the referenced object for as long as the reference lives
    pub fn as_obj(&self) -> &T {
        unsafe { self.raw.as_ref() }
    }

    /// The raw global handle
    pub fn as_raw(&self) -> sys::jobject {
        self.raw.as_ptr() as sys::jobject
    }

    /// VM the reference was created in
    pub fn vm(&self) -> JavaVm {
        self.deleter.vm
    }

    /// Reinterpret as a reference to `U`. The deleter moves over unchanged.
    ///
    /// # Safety
    /// The object's runtime class must be compatible with `U`.
    pub unsafe fn cast<U: Reference>(self) -> GlobalRef<U> {
        let this = ManuallyDrop::new(self);
        GlobalRef {
            raw: this.raw.cast(),
            deleter: this.deleter,
            _owns: PhantomData,
        }
    }

    /// Delete the reference now, through `env`.
    ///
    /// `env` should belong to the VM that created the reference. If it does
    /// not, the reference is deleted in its own VM instead. Releasing is
    /// allowed while an exception is pending.
    pub fn release(self, env: &Env<'_>) -> JniResult<()> {
        let this = ManuallyDrop::new(self);
        let raw = this.as_raw();
        // GetEnv is safe while an exception is pending, GetJavaVM is not
        let own_env = this.deleter.vm.get_env_version(this.deleter.version)?;
        match own_env {
            Some(own) if own.as_raw() == env.as_raw() => this.deleter.delete_with(env, raw),
            _ => {
                log::warn!(
                    "Global ref {:p} released through an env of a different VM, deleting in its own VM",
                    raw
                );
                this.deleter.delete(raw)
            }
        }
    }

    /// Give up ownership without deleting. The caller becomes responsible
    /// for calling `DeleteGlobalRef`.
    pub fn into_raw(self) -> sys::jobject {
        let this = ManuallyDrop::new(self);
        this.as_raw()
    }
}

impl<T: Reference> Deref for GlobalRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.as_obj()
    }
}

impl<T: Reference> Drop for GlobalRef<T> {
    fn drop(&mut self) {
        if let Err(err) = self.deleter.delete(self.as_raw()) {
            log::error!("Failed to delete global ref {:p}: {err}", self.as_raw());
        }
    }
}

impl<T: Reference> fmt::Debug for GlobalRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalRef")
            .field("raw", &self.raw)
            .field("vm", &self.deleter.vm)
            .finish()
    }
}

impl<'a> Env<'a> {
    /// Promote a local reference to a global one.
    pub fn new_global_ref<T: Reference>(&self, obj: &T) -> JniResult<GlobalRef<T>> {
        gate::check(self, "NewGlobalRef")?;
        let vm = self.java_vm()?;
        let version = self.version()?;
        let new_global_ref = jni_entry!(self.as_raw(), NewGlobalRef)?;
        let raw = unsafe { new_global_ref(self.as_raw(), obj.as_raw()) };
        let raw = gate::check_allocated(self, "NewGlobalRef", raw)?;
        log::trace!("Created global ref {:p}", raw);
        Ok(GlobalRef {
            raw: raw.cast(),
            deleter: GlobalRefDeleter { vm, version },
            _owns: PhantomData,
        })
    }
}
