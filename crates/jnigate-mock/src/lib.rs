//! In-process fake Java VM for testing JNI code
//!
//! [`MockVm`] implements the raw `JavaVM` and `JNIEnv` function tables in
//! Rust, with a tiny object heap and a few `java.lang` classes (`String`,
//! `Integer`, `Math`, `System`, `Throwable` and common exceptions). Tests can
//! add their own classes with [`ClassBuilder`].
//!
//! The mock is strict where a real VM would be undefined: calling a
//! non-exception-safe function while an exception is pending, using an env
//! after its thread detached, deleting a global reference twice or in the
//! wrong VM are all counted in [`MockStats`] instead of crashing, so tests
//! can assert they never happen.
//!
//! ```ignore
//! let mock = MockVm::new();
//! let env = unsafe { Env::from_raw(mock.runtime_env()) }?;
//! // ...
//! assert_eq!(mock.stats().calls_with_pending_exception, 0);
//! ```

mod builtins;
mod class;
mod invoke;
mod native;
mod state;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use jni_sys::{jint, JNIEnv, JNIInvokeInterface_, JNINativeInterface_, JavaVM, JNI_VERSION_1_6};
use parking_lot::Mutex;

pub use class::{Behavior, CallContext, ClassBuilder, ObjId, Outcome, Slot};

use invoke::VmSlot;
use state::State;

/// Serials start at 1 so that no handle is ever null
static NEXT_SERIAL: AtomicUsize = AtomicUsize::new(1);

/// Mock VM configuration
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Raise `NoClassDefFoundError` / `NoSuchMethodError` / `NoSuchFieldError`
    /// when a lookup fails, as a real VM does. When false, lookups just
    /// return null.
    pub raise_on_missing: bool,
    /// Highest interface version the mock accepts, and what `GetVersion`
    /// reports
    pub version: jint,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            raise_on_missing: true,
            version: JNI_VERSION_1_6,
        }
    }
}

/// Counters of what the code under test did to the VM
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockStats {
    pub attach_calls: usize,
    pub daemon_attaches: usize,
    pub detach_calls: usize,
    /// Detach of a thread the VM owns
    pub illegal_detaches: usize,
    pub global_refs_created: usize,
    pub global_refs_deleted: usize,
    /// Deletes of an already deleted (or non-global) reference
    pub double_deletes: usize,
    /// Deletes of a reference created by another VM
    pub foreign_deletes: usize,
    /// Non-exception-safe calls issued while an exception was pending
    pub calls_with_pending_exception: usize,
    /// Env calls on a thread that is not attached
    pub calls_after_detach: usize,
    pub exceptions_cleared: usize,
    pub exceptions_described: usize,
    /// Calls that threw and left junk in their return slot
    pub incidental_returns: usize,
    /// `GetStringUTFChars` buffers handed out
    pub string_chars_acquired: usize,
    /// `GetStringUTFChars` buffers given back
    pub string_chars_released: usize,
    /// Names passed in attach arguments, in order
    pub thread_names: Vec<String>,
}

pub(crate) struct Shared {
    // Owned here so the pointers in `vm_slot` and every env slot stay valid
    _env_table: Box<JNINativeInterface_>,
    _vm_table: Box<JNIInvokeInterface_>,
    vm_slot: Box<VmSlot>,
    pub(crate) state: Mutex<State>,
}

// SAFETY: the tables and slots are immutable after construction, all mutable
// state is behind the mutex.
unsafe impl Send for Shared {}
unsafe impl Sync for Shared {}

impl Shared {
    pub(crate) fn vm_ptr(&self) -> *mut JavaVM {
        &*self.vm_slot as *const VmSlot as *mut JavaVM
    }
}

/// A fake Java VM
pub struct MockVm {
    shared: Arc<Shared>,
}

impl MockVm {
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    pub fn with_config(config: MockConfig) -> Self {
        let serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
        let env_table = native::table();
        let vm_table = invoke::table();

        let shared = Arc::new_cyclic(|weak| {
            let ptr = weak.as_ptr();
            let mut state = State::new(config, serial, &*env_table, ptr);
            builtins::install(&mut state);
            Shared {
                vm_slot: Box::new(VmSlot {
                    table: &*vm_table,
                    shared: ptr,
                }),
                _env_table: env_table,
                _vm_table: vm_table,
                state: Mutex::new(state),
            }
        });
        Self { shared }
    }

    /// The `JavaVM*` of this mock
    pub fn raw(&self) -> *mut JavaVM {
        self.shared.vm_ptr()
    }

    /// Keep the VM alive for the rest of the process and return its pointer
    pub fn leak(self) -> *mut JavaVM {
        let raw = self.raw();
        std::mem::forget(self.shared);
        raw
    }

    /// Env of the current thread as if the VM had created the thread: it is
    /// attached, and detaching it is illegal.
    pub fn runtime_env(&self) -> *mut JNIEnv {
        let mut state = self.shared.state.lock();
        let id = thread::current().id();
        let thread = state.thread(id);
        thread.attached = true;
        thread.runtime_owned = true;
        state.env_ptr(id) as *mut JNIEnv
    }

    /// Add (or replace) a class
    pub fn define_class(&self, class: ClassBuilder) {
        self.shared.state.lock().define(class);
    }

    pub fn stats(&self) -> MockStats {
        self.shared.state.lock().stats.clone()
    }

    /// Global references created and not yet deleted
    pub fn live_global_refs(&self) -> usize {
        self.shared.state.lock().live_globals()
    }

    /// True if the current thread is attached
    pub fn is_attached(&self) -> bool {
        self.shared.state.lock().is_attached(thread::current().id())
    }

    /// Make the next `GetStringUTFChars` hand out its buffer and then raise
    /// `OutOfMemoryError`
    pub fn raise_on_next_string_chars(&self) {
        self.shared.state.lock().raise_on_string_chars = true;
    }

    /// Make the next `count` calls to `NewGlobalRef` return null
    pub fn fail_next_global_refs(&self, count: usize) {
        self.shared.state.lock().fail_global_refs = count;
    }
}

impl Default for MockVm {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockVm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockVm").field("raw", &self.raw()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jni_sys::*;
    use std::ptr;

    unsafe fn env_fn<F>(env: *mut JNIEnv, get: impl FnOnce(&JNINativeInterface_) -> Option<F>) -> F {
        get(&**env).unwrap()
    }

    #[test]
    fn test_env_and_vm_pointers() {
        let mock = MockVm::new();
        let env = mock.runtime_env();
        unsafe {
            let get_java_vm = env_fn(env, |t| t.GetJavaVM);
            let mut vm: *mut JavaVM = ptr::null_mut();
            assert_eq!(get_java_vm(env, &mut vm), JNI_OK);
            assert_eq!(vm, mock.raw());

            let get_version = env_fn(env, |t| t.GetVersion);
            assert_eq!(get_version(env), JNI_VERSION_1_6);
        }
        // Same pointer every time for the same thread
        assert_eq!(mock.runtime_env(), env);
    }

    #[test]
    fn test_violation_counting() {
        let mock = MockVm::new();
        let env = mock.runtime_env();
        unsafe {
            let find_class = env_fn(env, |t| t.FindClass);
            let missing = find_class(env, b"no/Such\0".as_ptr() as *const _);
            assert!(missing.is_null());

            // NoClassDefFoundError is pending; FindClass is not allowed now
            let string = find_class(env, b"java/lang/String\0".as_ptr() as *const _);
            assert!(string.is_null());
            assert_eq!(mock.stats().calls_with_pending_exception, 1);

            let clear = env_fn(env, |t| t.ExceptionClear);
            clear(env);
            let string = find_class(env, b"java/lang/String\0".as_ptr() as *const _);
            assert!(!string.is_null());
        }
        assert_eq!(mock.stats().exceptions_cleared, 1);
    }

    #[test]
    fn test_global_ref_accounting() {
        let first = MockVm::new();
        let second = MockVm::new();
        let env = first.runtime_env();
        let other_env = second.runtime_env();
        unsafe {
            let new_string = env_fn(env, |t| t.NewStringUTF);
            let new_global = env_fn(env, |t| t.NewGlobalRef);
            let delete_global = env_fn(env, |t| t.DeleteGlobalRef);

            let local = new_string(env, b"x\0".as_ptr() as *const _);
            let global = new_global(env, local);
            assert_eq!(first.live_global_refs(), 1);

            delete_global(other_env, global);
            assert_eq!(second.stats().foreign_deletes, 1);

            delete_global(env, global);
            delete_global(env, global);
            let stats = first.stats();
            assert_eq!(stats.global_refs_deleted, 1);
            assert_eq!(stats.double_deletes, 1);
        }
    }

    #[test]
    fn test_runtime_thread_cannot_detach() {
        let mock = MockVm::new();
        mock.runtime_env();
        unsafe {
            let detach = (**mock.raw()).DetachCurrentThread.unwrap();
            assert_eq!(detach(mock.raw()), JNI_ERR);
        }
        assert_eq!(mock.stats().illegal_detaches, 1);
        assert!(mock.is_attached());
    }

    #[test]
    fn test_define_class() {
        let mock = MockVm::new();
        mock.define_class(
            ClassBuilder::new("demo/Counter")
                .field("count", "I")
                .method("increment", "()I", |ctx| {
                    let this = ctx.this().unwrap();
                    let next = ctx.field(this, "count") as i32 + 1;
                    ctx.set_field(this, "count", next);
                    Outcome::int(next)
                }),
        );
        let env = mock.runtime_env();
        unsafe {
            let find_class = env_fn(env, |t| t.FindClass);
            let class = find_class(env, b"demo/Counter\0".as_ptr() as *const _);
            assert!(!class.is_null());
        }
    }
}
