//! The per-thread function table (`JNINativeInterface_`)
//!
//! Only the entries the wrapper uses are filled in; every other slot is
//! `None`. Each function follows the JNI contract on pending exceptions:
//! unless it is one of the exception-safe functions, calling it while an
//! exception is pending is recorded as a violation and returns zero without
//! doing anything.

#![allow(non_snake_case)]

use std::ffi::{CStr, CString};
use std::mem;
use std::os::raw::c_char;
use std::ptr;
use std::thread::ThreadId;

use jni_sys::*;

use crate::class::{CallContext, Outcome, Slot};
use crate::state::{obj_to_slot, slot_to_obj, Delete, EnvSlot, State, INCIDENTAL};
use crate::Shared;

/// Run `f` with the VM state behind `env`. `exception_safe` functions run
/// even while an exception is pending; the rest return `default`.
unsafe fn with_state<R>(
    env: *mut JNIEnv,
    exception_safe: bool,
    default: R,
    f: impl FnOnce(&mut State, ThreadId) -> R,
) -> R {
    let slot = &*(env as *const EnvSlot);
    let shared: &Shared = &*slot.shared;
    let mut state = shared.state.lock();
    if state.enter(slot.thread, exception_safe) {
        f(&mut state, slot.thread)
    } else {
        default
    }
}

unsafe fn c_str(text: *const c_char) -> String {
    if text.is_null() {
        String::new()
    } else {
        decode_modified_utf8(CStr::from_ptr(text).to_bytes())
    }
}

/// Decode modified UTF-8 the way the VM does; plain UTF-8 is accepted too
pub(crate) fn decode_modified_utf8(bytes: &[u8]) -> String {
    match cesu8::from_java_cesu8(bytes) {
        Ok(text) => text.into_owned(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

// ============================================================================
// Version, VM
// ============================================================================

unsafe extern "system" fn GetVersion(env: *mut JNIEnv) -> jint {
    with_state(env, false, 0, |state, _| state.config.version)
}

unsafe extern "system" fn GetJavaVM(env: *mut JNIEnv, vm: *mut *mut JavaVM) -> jint {
    let slot = &*(env as *const EnvSlot);
    let shared: &Shared = &*slot.shared;
    with_state(env, false, JNI_ERR, |_, _| {
        *vm = shared.vm_ptr();
        JNI_OK
    })
}

// ============================================================================
// Resolution
// ============================================================================

unsafe extern "system" fn FindClass(env: *mut JNIEnv, name: *const c_char) -> jclass {
    let name = c_str(name);
    with_state(env, false, ptr::null_mut(), |state, thread| {
        match state.class_by_name(&name) {
            Some(class) => {
                let mirror = state.mirror(class);
                state.new_local(Some(mirror))
            }
            None => {
                if state.config.raise_on_missing {
                    state.raise(thread, "java/lang/NoClassDefFoundError", &name);
                }
                ptr::null_mut()
            }
        }
    })
}

unsafe fn lookup_member<T>(
    env: *mut JNIEnv,
    class: jclass,
    name: *const c_char,
    sig: *const c_char,
    error: &str,
    find: impl FnOnce(&State, usize, &str, &str) -> Option<*mut T>,
) -> *mut T {
    let (name, sig) = (c_str(name), c_str(sig));
    with_state(env, false, ptr::null_mut(), |state, thread| {
        let class = state
            .deref_handle(class)
            .and_then(|mirror| state.class_of_mirror(mirror));
        match class.and_then(|class| find(state, class, &name, &sig)) {
            Some(id) => id,
            None => {
                if state.config.raise_on_missing {
                    state.raise(thread, error, &format!("{name} {sig}"));
                }
                ptr::null_mut()
            }
        }
    })
}

unsafe extern "system" fn GetMethodID(
    env: *mut JNIEnv,
    class: jclass,
    name: *const c_char,
    sig: *const c_char,
) -> jmethodID {
    lookup_member(env, class, name, sig, "java/lang/NoSuchMethodError", |s, c, n, g| {
        s.find_method(c, n, g, false)
    })
}

unsafe extern "system" fn GetStaticMethodID(
    env: *mut JNIEnv,
    class: jclass,
    name: *const c_char,
    sig: *const c_char,
) -> jmethodID {
    lookup_member(env, class, name, sig, "java/lang/NoSuchMethodError", |s, c, n, g| {
        s.find_method(c, n, g, true)
    })
}

unsafe extern "system" fn GetFieldID(
    env: *mut JNIEnv,
    class: jclass,
    name: *const c_char,
    sig: *const c_char,
) -> jfieldID {
    lookup_member(env, class, name, sig, "java/lang/NoSuchFieldError", |s, c, n, g| {
        s.find_field(c, n, g, false)
    })
}

unsafe extern "system" fn GetStaticFieldID(
    env: *mut JNIEnv,
    class: jclass,
    name: *const c_char,
    sig: *const c_char,
) -> jfieldID {
    lookup_member(env, class, name, sig, "java/lang/NoSuchFieldError", |s, c, n, g| {
        s.find_field(c, n, g, true)
    })
}

// ============================================================================
// Calls
// ============================================================================

enum Returned {
    Bits(u64),
    Object(jobject),
    Threw,
}

impl Returned {
    fn bits(&self) -> u64 {
        match self {
            Returned::Bits(bits) => *bits,
            Returned::Object(_) => 0,
            Returned::Threw => INCIDENTAL,
        }
    }

    fn object(&self) -> jobject {
        match self {
            Returned::Object(obj) => *obj,
            Returned::Bits(_) => ptr::null_mut(),
            Returned::Threw => INCIDENTAL as usize as jobject,
        }
    }
}

/// Run a method behavior. `receiver` is the instance, or null for statics.
fn run(
    state: &mut State,
    thread: ThreadId,
    receiver: jobject,
    method: jmethodID,
    args: *const jvalue,
) -> Returned {
    let (behavior, params) = match state.method(method) {
        Some(def) => (def.behavior.clone(), def.params),
        None => {
            state.raise(thread, "java/lang/NoSuchMethodError", "invalid method id");
            return Returned::Threw;
        }
    };

    let args = if args.is_null() {
        Vec::new()
    } else {
        (0..params).map(|i| unsafe { *args.add(i) }).collect()
    };
    let this = state.deref_handle(receiver);

    let outcome = behavior(&mut CallContext {
        state: &mut *state,
        this,
        args,
    });
    match outcome {
        Outcome::Void => Returned::Bits(0),
        Outcome::Value(bits) => Returned::Bits(bits),
        Outcome::Object(obj) => Returned::Object(state.new_local(obj)),
        Outcome::Throw { class, message } => {
            state.raise(thread, &class, &message);
            state.stats.incidental_returns += 1;
            Returned::Threw
        }
    }
}

unsafe fn call(env: *mut JNIEnv, receiver: jobject, method: jmethodID, args: *const jvalue) -> Returned {
    with_state(env, false, Returned::Bits(0), |state, thread| {
        run(state, thread, receiver, method, args)
    })
}

macro_rules! call_entries {
    ($($inst:ident, $stat:ident -> $ty:ty, |$r:ident| $conv:expr;)*) => {
        $(
            unsafe extern "system" fn $inst(
                env: *mut JNIEnv,
                obj: jobject,
                method: jmethodID,
                args: *const jvalue,
            ) -> $ty {
                let $r = call(env, obj, method, args);
                $conv
            }

            unsafe extern "system" fn $stat(
                env: *mut JNIEnv,
                _class: jclass,
                method: jmethodID,
                args: *const jvalue,
            ) -> $ty {
                let $r = call(env, ptr::null_mut(), method, args);
                $conv
            }
        )*

        fn install_calls(table: &mut JNINativeInterface_) {
            $(
                table.$inst = Some($inst);
                table.$stat = Some($stat);
            )*
        }
    };
}

call_entries! {
    CallVoidMethodA, CallStaticVoidMethodA -> (), |r| drop(r);
    CallBooleanMethodA, CallStaticBooleanMethodA -> jboolean, |r| jboolean::from_slot(r.bits());
    CallByteMethodA, CallStaticByteMethodA -> jbyte, |r| jbyte::from_slot(r.bits());
    CallCharMethodA, CallStaticCharMethodA -> jchar, |r| jchar::from_slot(r.bits());
    CallShortMethodA, CallStaticShortMethodA -> jshort, |r| jshort::from_slot(r.bits());
    CallIntMethodA, CallStaticIntMethodA -> jint, |r| jint::from_slot(r.bits());
    CallLongMethodA, CallStaticLongMethodA -> jlong, |r| jlong::from_slot(r.bits());
    CallFloatMethodA, CallStaticFloatMethodA -> jfloat, |r| jfloat::from_slot(r.bits());
    CallDoubleMethodA, CallStaticDoubleMethodA -> jdouble, |r| jdouble::from_slot(r.bits());
    CallObjectMethodA, CallStaticObjectMethodA -> jobject, |r| r.object();
}

unsafe extern "system" fn NewObjectA(
    env: *mut JNIEnv,
    class: jclass,
    ctor: jmethodID,
    args: *const jvalue,
) -> jobject {
    with_state(env, false, ptr::null_mut(), |state, thread| {
        let Some(class) = state
            .deref_handle(class)
            .and_then(|mirror| state.class_of_mirror(mirror))
        else {
            return ptr::null_mut();
        };
        let obj = state.alloc_instance(class);
        let receiver = state.new_local(Some(obj));
        match run(state, thread, receiver, ctor, args) {
            Returned::Threw => ptr::null_mut(),
            _ => receiver,
        }
    })
}

// ============================================================================
// Fields
// ============================================================================

macro_rules! field_entries {
    ($($get:ident, $set:ident, $sget:ident, $sset:ident: $ty:ty;)*) => {
        $(
            unsafe extern "system" fn $get(env: *mut JNIEnv, obj: jobject, field: jfieldID) -> $ty {
                with_state(env, false, 0 as $ty, |state, _| {
                    let bits = state
                        .deref_handle(obj)
                        .and_then(|obj| state.field_slot(obj, field).copied())
                        .unwrap_or(0);
                    <$ty>::from_slot(bits)
                })
            }

            unsafe extern "system" fn $set(env: *mut JNIEnv, obj: jobject, field: jfieldID, value: $ty) {
                with_state(env, false, (), |state, _| {
                    if let Some(slot) = state.deref_handle(obj).and_then(|obj| state.field_slot(obj, field)) {
                        *slot = value.into_slot();
                    }
                })
            }

            unsafe extern "system" fn $sget(env: *mut JNIEnv, _class: jclass, field: jfieldID) -> $ty {
                with_state(env, false, 0 as $ty, |state, _| {
                    <$ty>::from_slot(state.static_slot(field).copied().unwrap_or(0))
                })
            }

            unsafe extern "system" fn $sset(env: *mut JNIEnv, _class: jclass, field: jfieldID, value: $ty) {
                with_state(env, false, (), |state, _| {
                    if let Some(slot) = state.static_slot(field) {
                        *slot = value.into_slot();
                    }
                })
            }
        )*

        fn install_fields(table: &mut JNINativeInterface_) {
            $(
                table.$get = Some($get);
                table.$set = Some($set);
                table.$sget = Some($sget);
                table.$sset = Some($sset);
            )*
        }
    };
}

field_entries! {
    GetBooleanField, SetBooleanField, GetStaticBooleanField, SetStaticBooleanField: jboolean;
    GetByteField, SetByteField, GetStaticByteField, SetStaticByteField: jbyte;
    GetCharField, SetCharField, GetStaticCharField, SetStaticCharField: jchar;
    GetShortField, SetShortField, GetStaticShortField, SetStaticShortField: jshort;
    GetIntField, SetIntField, GetStaticIntField, SetStaticIntField: jint;
    GetLongField, SetLongField, GetStaticLongField, SetStaticLongField: jlong;
    GetFloatField, SetFloatField, GetStaticFloatField, SetStaticFloatField: jfloat;
    GetDoubleField, SetDoubleField, GetStaticDoubleField, SetStaticDoubleField: jdouble;
}

unsafe extern "system" fn GetObjectField(env: *mut JNIEnv, obj: jobject, field: jfieldID) -> jobject {
    with_state(env, false, ptr::null_mut(), |state, _| {
        let bits = state
            .deref_handle(obj)
            .and_then(|obj| state.field_slot(obj, field).copied())
            .unwrap_or(0);
        state.new_local(slot_to_obj(bits))
    })
}

unsafe extern "system" fn SetObjectField(env: *mut JNIEnv, obj: jobject, field: jfieldID, value: jobject) {
    with_state(env, false, (), |state, _| {
        let value = obj_to_slot(state.deref_handle(value));
        if let Some(slot) = state.deref_handle(obj).and_then(|obj| state.field_slot(obj, field)) {
            *slot = value;
        }
    })
}

unsafe extern "system" fn GetStaticObjectField(env: *mut JNIEnv, _class: jclass, field: jfieldID) -> jobject {
    with_state(env, false, ptr::null_mut(), |state, _| {
        let bits = state.static_slot(field).copied().unwrap_or(0);
        state.new_local(slot_to_obj(bits))
    })
}

unsafe extern "system" fn SetStaticObjectField(env: *mut JNIEnv, _class: jclass, field: jfieldID, value: jobject) {
    with_state(env, false, (), |state, _| {
        let value = obj_to_slot(state.deref_handle(value));
        if let Some(slot) = state.static_slot(field) {
            *slot = value;
        }
    })
}

// ============================================================================
// Strings
// ============================================================================

unsafe extern "system" fn NewStringUTF(env: *mut JNIEnv, utf: *const c_char) -> jstring {
    let text = c_str(utf);
    with_state(env, false, ptr::null_mut(), |state, _| {
        let obj = state.new_string(&text);
        state.new_local(Some(obj))
    })
}

unsafe extern "system" fn GetStringUTFChars(
    env: *mut JNIEnv,
    string: jstring,
    is_copy: *mut jboolean,
) -> *const c_char {
    with_state(env, false, ptr::null(), |state, thread| {
        let Some(text) = state.deref_handle(string).and_then(|s| state.string(s)) else {
            return ptr::null();
        };
        if !is_copy.is_null() {
            *is_copy = JNI_TRUE;
        }
        let chars = CString::new(cesu8::to_java_cesu8(text).into_owned())
            .map_or(ptr::null(), |c| c.into_raw() as *const c_char);
        if !chars.is_null() {
            state.stats.string_chars_acquired += 1;
        }
        if std::mem::take(&mut state.raise_on_string_chars) {
            state.raise(thread, "java/lang/OutOfMemoryError", "string chars");
        }
        chars
    })
}

unsafe extern "system" fn ReleaseStringUTFChars(env: *mut JNIEnv, _string: jstring, chars: *const c_char) {
    with_state(env, true, (), |state, _| {
        if !chars.is_null() {
            state.stats.string_chars_released += 1;
            drop(CString::from_raw(chars as *mut c_char));
        }
    })
}

// ============================================================================
// Exceptions
// ============================================================================

unsafe extern "system" fn ExceptionCheck(env: *mut JNIEnv) -> jboolean {
    with_state(env, true, JNI_FALSE, |state, thread| {
        if state.pending(thread).is_some() {
            JNI_TRUE
        } else {
            JNI_FALSE
        }
    })
}

unsafe extern "system" fn ExceptionOccurred(env: *mut JNIEnv) -> jthrowable {
    with_state(env, true, ptr::null_mut(), |state, thread| {
        let pending = state.pending(thread);
        state.new_local(pending)
    })
}

unsafe extern "system" fn ExceptionClear(env: *mut JNIEnv) {
    with_state(env, true, (), |state, thread| {
        if state.pending(thread).is_some() {
            state.stats.exceptions_cleared += 1;
        }
        state.set_pending(thread, None);
    })
}

unsafe extern "system" fn ExceptionDescribe(env: *mut JNIEnv) {
    with_state(env, true, (), |state, thread| {
        let Some(exception) = state.pending(thread) else {
            return;
        };
        let message = state
            .named_field(exception, "detailMessage")
            .and_then(slot_to_obj)
            .and_then(|m| state.string(m))
            .unwrap_or("")
            .to_string();
        eprintln!(
            "Exception in mock thread: {}: {}",
            state.class_name_of(exception).replace('/', "."),
            message
        );
        state.stats.exceptions_described += 1;
        state.set_pending(thread, None);
    })
}

unsafe extern "system" fn Throw(env: *mut JNIEnv, obj: jthrowable) -> jint {
    with_state(env, false, JNI_ERR, |state, thread| match state.deref_handle(obj) {
        Some(exception) => {
            state.set_pending(thread, Some(exception));
            JNI_OK
        }
        None => JNI_ERR,
    })
}

unsafe extern "system" fn ThrowNew(env: *mut JNIEnv, class: jclass, msg: *const c_char) -> jint {
    let message = c_str(msg);
    with_state(env, false, JNI_ERR, |state, thread| {
        let Some(class) = state
            .deref_handle(class)
            .and_then(|mirror| state.class_of_mirror(mirror))
        else {
            return JNI_ERR;
        };
        let name = state.class(class).name.clone();
        state.raise(thread, &name, &message);
        JNI_OK
    })
}

// ============================================================================
// Global references
// ============================================================================

unsafe extern "system" fn NewGlobalRef(env: *mut JNIEnv, obj: jobject) -> jobject {
    with_state(env, false, ptr::null_mut(), |state, _| {
        if state.fail_global_refs > 0 {
            state.fail_global_refs -= 1;
            return ptr::null_mut();
        }
        match state.deref_handle(obj) {
            Some(obj) => state.new_global(obj),
            None => ptr::null_mut(),
        }
    })
}

unsafe extern "system" fn DeleteGlobalRef(env: *mut JNIEnv, global: jobject) {
    with_state(env, true, (), |state, _| {
        if global.is_null() {
            return;
        }
        match state.delete_global(global) {
            Delete::Deleted => state.stats.global_refs_deleted += 1,
            Delete::Double => state.stats.double_deletes += 1,
            Delete::Foreign => state.stats.foreign_deletes += 1,
            Delete::NotGlobal => state.stats.double_deletes += 1,
        }
    })
}

/// Build the function table shared by every env of one VM
pub(crate) fn table() -> Box<JNINativeInterface_> {
    // SAFETY: every field is either a raw pointer or an `Option` of a
    // function pointer, for which all-zero is null / `None`.
    let mut table: Box<JNINativeInterface_> = Box::new(unsafe { mem::zeroed() });

    table.GetVersion = Some(GetVersion);
    table.GetJavaVM = Some(GetJavaVM);
    table.FindClass = Some(FindClass);
    table.GetMethodID = Some(GetMethodID);
    table.GetStaticMethodID = Some(GetStaticMethodID);
    table.GetFieldID = Some(GetFieldID);
    table.GetStaticFieldID = Some(GetStaticFieldID);
    table.NewObjectA = Some(NewObjectA);
    table.GetObjectField = Some(GetObjectField);
    table.SetObjectField = Some(SetObjectField);
    table.GetStaticObjectField = Some(GetStaticObjectField);
    table.SetStaticObjectField = Some(SetStaticObjectField);
    table.NewStringUTF = Some(NewStringUTF);
    table.GetStringUTFChars = Some(GetStringUTFChars);
    table.ReleaseStringUTFChars = Some(ReleaseStringUTFChars);
    table.ExceptionCheck = Some(ExceptionCheck);
    table.ExceptionOccurred = Some(ExceptionOccurred);
    table.ExceptionClear = Some(ExceptionClear);
    table.ExceptionDescribe = Some(ExceptionDescribe);
    table.Throw = Some(Throw);
    table.ThrowNew = Some(ThrowNew);
    table.NewGlobalRef = Some(NewGlobalRef);
    table.DeleteGlobalRef = Some(DeleteGlobalRef);
    install_calls(&mut table);
    install_fields(&mut table);
    table
}
