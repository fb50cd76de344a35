//! The VM function table (`JNIInvokeInterface_`)

#![allow(non_snake_case)]

use std::ffi::{c_void, CStr};
use std::mem;
use std::thread;

use jni_sys::*;

use crate::Shared;

/// Layout of the object a `JavaVM*` points to
#[repr(C)]
pub(crate) struct VmSlot {
    pub(crate) table: *const JNIInvokeInterface_,
    pub(crate) shared: *const Shared,
}

unsafe fn shared<'s>(vm: *mut JavaVM) -> &'s Shared {
    let slot = &*(vm as *const VmSlot);
    &*slot.shared
}

unsafe extern "system" fn DestroyJavaVM(_vm: *mut JavaVM) -> jint {
    JNI_ERR
}

unsafe fn attach(vm: *mut JavaVM, penv: *mut *mut c_void, args: *mut c_void, daemon: bool) -> jint {
    let shared = shared(vm);
    let mut state = shared.state.lock();
    let id = thread::current().id();

    let args = args as *const JavaVMAttachArgs;
    if !args.is_null() && (*args).version > state.config.version {
        return JNI_EVERSION;
    }

    state.stats.attach_calls += 1;
    if daemon {
        state.stats.daemon_attaches += 1;
    }
    if !args.is_null() && !(*args).name.is_null() {
        let name = crate::native::decode_modified_utf8(CStr::from_ptr((*args).name).to_bytes());
        state.stats.thread_names.push(name);
    }

    // Attaching an attached thread is a no-op that hands back its env
    state.thread(id).attached = true;
    *penv = state.env_ptr(id);
    JNI_OK
}

unsafe extern "system" fn AttachCurrentThread(
    vm: *mut JavaVM,
    penv: *mut *mut c_void,
    args: *mut c_void,
) -> jint {
    attach(vm, penv, args, false)
}

unsafe extern "system" fn AttachCurrentThreadAsDaemon(
    vm: *mut JavaVM,
    penv: *mut *mut c_void,
    args: *mut c_void,
) -> jint {
    attach(vm, penv, args, true)
}

unsafe extern "system" fn DetachCurrentThread(vm: *mut JavaVM) -> jint {
    let shared = shared(vm);
    let mut state = shared.state.lock();
    let id = thread::current().id();

    let thread = state.thread(id);
    if !thread.attached {
        return JNI_EDETACHED;
    }
    if thread.runtime_owned {
        state.stats.illegal_detaches += 1;
        return JNI_ERR;
    }
    thread.attached = false;
    thread.pending = None;
    state.stats.detach_calls += 1;
    JNI_OK
}

unsafe extern "system" fn GetEnv(vm: *mut JavaVM, penv: *mut *mut c_void, version: jint) -> jint {
    let shared = shared(vm);
    let mut state = shared.state.lock();
    let id = thread::current().id();

    if !state.is_attached(id) {
        *penv = std::ptr::null_mut();
        return JNI_EDETACHED;
    }
    if version > state.config.version {
        *penv = std::ptr::null_mut();
        return JNI_EVERSION;
    }
    *penv = state.env_ptr(id);
    JNI_OK
}

pub(crate) fn table() -> Box<JNIInvokeInterface_> {
    // SAFETY: reserved fields are raw pointers, the rest `Option`s of
    // function pointers; all-zero is valid for both.
    let mut table: Box<JNIInvokeInterface_> = Box::new(unsafe { mem::zeroed() });
    table.DestroyJavaVM = Some(DestroyJavaVM);
    table.AttachCurrentThread = Some(AttachCurrentThread);
    table.DetachCurrentThread = Some(DetachCurrentThread);
    table.GetEnv = Some(GetEnv);
    table.AttachCurrentThreadAsDaemon = Some(AttachCurrentThreadAsDaemon);
    table
}
