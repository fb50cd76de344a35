//! Safe, exception-gated access to the Java Native Interface
//!
//! This crate wraps the raw JNI function tables with:
//! - Scoped lifetimes for local references (`&'a Object` cannot outlive the
//!   [`Env`] frame it came from)
//! - Owned global references that are deleted exactly once ([`GlobalRef`])
//! - Reference-counted thread attachment ([`AttachGuard`])
//! - One generic, typed dispatch routine instead of twenty call variants
//! - An exception gate around every call
//!
//! # Pending exceptions
//!
//! When Java code throws, the exception stays pending on the thread's
//! environment, and almost every JNI function is undefined behavior until it
//! is cleared. Every call in this crate checks the flag before and after
//! issuing the raw call and returns [`JniError::ForeignException`] instead of
//! touching the VM while it is set. Nothing clears the exception for you:
//! inspect it with [`Env::exception_occurred`], clear it with
//! [`Env::exception_clear`], or return to Java and let it propagate.
//!
//! # Example
//!
//! ```ignore
//! use jnigate::{jargs, Env, JniResult};
//!
//! fn string_length(env: &Env<'_>, text: &str) -> JniResult<i32> {
//!     let class = env.find_class("java/lang/String")?;
//!     let length = env.get_method_id(class, "length", "()I")?;
//!     let s = env.new_string(text)?;
//!     env.call_int_method(s, length, &jargs![])
//! }
//! ```

pub use jni_sys as sys;

mod macros;

pub mod attach;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod field;
mod gate;
pub mod global_ref;
pub mod refs;
mod resolve;
pub mod value;
pub mod vm;

pub use attach::{AttachGuard, AttachOptions};
pub use dispatch::{JavaReturn, Target};
pub use env::Env;
pub use error::{JniError, JniResult, MemberKind};
pub use field::JavaField;
pub use global_ref::GlobalRef;
pub use refs::{Class, FieldId, JString, MethodId, Object, Reference, Throwable};
pub use value::{Kind, Value};
pub use vm::{JavaVm, DEFAULT_VERSION};
