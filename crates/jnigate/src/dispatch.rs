//! Method dispatch
//!
//! The raw interface has one vectorized entry point per (return kind,
//! instance/static) pair: twenty near-identical call paths, each of which
//! needs an exception check afterwards. Here they collapse into a single
//! routine, [`Env::call_method`] / [`Env::call_static_method`], generic over
//! the return type. The [`JavaReturn`] impls pick the entry point and the
//! gate; the named `call_*_method` functions are thin aliases.
//!
//! Arguments must match the method's declared parameter list in order and
//! kind. That is not checked here, exactly as it is not checked by the VM.

use crate::env::Env;
use crate::error::JniResult;
use crate::gate;
use crate::macros::jni_entry;
use crate::refs::{Class, MethodId, Object, Reference};
use crate::sys;
use crate::value::{Kind, Value};

mod private {
    pub trait Sealed {}
}

/// What a call is issued against
#[derive(Debug, Clone, Copy)]
pub enum Target<'t> {
    /// A receiver object, dispatched virtually
    Instance(&'t Object),
    /// A class, for static methods
    Static(&'t Class),
}

/// Return types a Java method call can produce.
///
/// Implemented for `()`, `bool`, `i8`, `u16` (Java `char`), `i16`, `i32`,
/// `i64`, `f32`, `f64` and `Option<&T>` for every reference type `T`.
pub trait JavaReturn<'a>: private::Sealed + Sized {
    /// Kind of the returned value
    const KIND: Kind;

    #[doc(hidden)]
    const INSTANCE_CALL: &'static str;

    #[doc(hidden)]
    const STATIC_CALL: &'static str;

    #[doc(hidden)]
    type Raw;

    #[doc(hidden)]
    unsafe fn call_raw(
        env: *mut sys::JNIEnv,
        target: Target<'_>,
        method: sys::jmethodID,
        args: *const sys::jvalue,
    ) -> JniResult<Self::Raw>;

    #[doc(hidden)]
    fn from_gated(env: &Env<'a>, call: &'static str, raw: Self::Raw) -> JniResult<Self>;
}

macro_rules! java_return {
    ($ty:ty, $raw:ty, $kind:ident, $inst:ident, $stat:ident, |$v:ident| $conv:expr) => {
        impl private::Sealed for $ty {}

        impl<'a> JavaReturn<'a> for $ty {
            const KIND: Kind = Kind::$kind;
            const INSTANCE_CALL: &'static str = stringify!($inst);
            const STATIC_CALL: &'static str = stringify!($stat);
            type Raw = $raw;

            unsafe fn call_raw(
                env: *mut sys::JNIEnv,
                target: Target<'_>,
                method: sys::jmethodID,
                args: *const sys::jvalue,
            ) -> JniResult<$raw> {
                Ok(match target {
                    Target::Instance(obj) => {
                        jni_entry!(env, $inst)?(env, obj.as_raw(), method, args)
                    }
                    Target::Static(class) => {
                        jni_entry!(env, $stat)?(env, class.as_raw(), method, args)
                    }
                })
            }

            fn from_gated(env: &Env<'a>, call: &'static str, raw: $raw) -> JniResult<Self> {
                let $v = gate::check_value(env, call, raw)?;
                Ok($conv)
            }
        }
    };
}

java_return!((), (), Void, CallVoidMethodA, CallStaticVoidMethodA, |v| v);
java_return!(bool, sys::jboolean, Boolean, CallBooleanMethodA, CallStaticBooleanMethodA,
    |v| v != sys::JNI_FALSE);
java_return!(i8, sys::jbyte, Byte, CallByteMethodA, CallStaticByteMethodA, |v| v);
java_return!(u16, sys::jchar, Char, CallCharMethodA, CallStaticCharMethodA, |v| v);
java_return!(i16, sys::jshort, Short, CallShortMethodA, CallStaticShortMethodA, |v| v);
java_return!(i32, sys::jint, Int, CallIntMethodA, CallStaticIntMethodA, |v| v);
java_return!(i64, sys::jlong, Long, CallLongMethodA, CallStaticLongMethodA, |v| v);
java_return!(f32, sys::jfloat, Float, CallFloatMethodA, CallStaticFloatMethodA, |v| v);
java_return!(f64, sys::jdouble, Double, CallDoubleMethodA, CallStaticDoubleMethodA, |v| v);

impl<'a, T: Reference> private::Sealed for Option<&'a T> {}

impl<'a, T: Reference + 'a> JavaReturn<'a> for Option<&'a T> {
    const KIND: Kind = Kind::Object;
    const INSTANCE_CALL: &'static str = "CallObjectMethodA";
    const STATIC_CALL: &'static str = "CallStaticObjectMethodA";
    type Raw = sys::jobject;

    unsafe fn call_raw(
        env: *mut sys::JNIEnv,
        target: Target<'_>,
        method: sys::jmethodID,
        args: *const sys::jvalue,
    ) -> JniResult<sys::jobject> {
        Ok(match target {
            Target::Instance(obj) => {
                jni_entry!(env, CallObjectMethodA)?(env, obj.as_raw(), method, args)
            }
            Target::Static(class) => {
                jni_entry!(env, CallStaticObjectMethodA)?(env, class.as_raw(), method, args)
            }
        })
    }

    fn from_gated(env: &Env<'a>, call: &'static str, raw: sys::jobject) -> JniResult<Self> {
        gate::check_object(env, call, raw)
    }
}

// ============================================================================
// Generic dispatch
// ============================================================================

impl<'a> Env<'a> {
    /// The one call path every dispatch goes through: box, reject if an
    /// exception is already pending, call, gate.
    fn dispatch<R: JavaReturn<'a>>(
        &self,
        target: Target<'_>,
        method: &MethodId,
        args: &[Value<'_>],
    ) -> JniResult<R> {
        let call = match target {
            Target::Instance(_) => R::INSTANCE_CALL,
            Target::Static(_) => R::STATIC_CALL,
        };

        gate::check(self, call)?;
        // `Value` is a transparent `jvalue`
        let args = args.as_ptr() as *const sys::jvalue;
        let raw = unsafe { R::call_raw(self.as_raw(), target, method.as_raw(), args)? };
        R::from_gated(self, call, raw)
    }

    /// Call an instance method, choosing the entry point from `R`.
    ///
    /// ```ignore
    /// let len: i32 = env.call_method(s, length, &jargs![])?;
    /// let parent: Option<&Object> = env.call_method(node, get_parent, &jargs![])?;
    /// ```
    pub fn call_method<R: JavaReturn<'a>>(
        &self,
        obj: &Object,
        method: &MethodId,
        args: &[Value<'_>],
    ) -> JniResult<R> {
        self.dispatch(Target::Instance(obj), method, args)
    }

    /// Call a static method, choosing the entry point from `R`.
    pub fn call_static_method<R: JavaReturn<'a>>(
        &self,
        class: &Class,
        method: &MethodId,
        args: &[Value<'_>],
    ) -> JniResult<R> {
        self.dispatch(Target::Static(class), method, args)
    }

    /// Allocate an object and run the constructor `ctor` (a `<init>` method
    /// id) on it. A null result without a pending exception means the VM
    /// could not allocate.
    pub fn new_object(
        &self,
        class: &Class,
        ctor: &MethodId,
        args: &[Value<'_>],
    ) -> JniResult<&'a Object> {
        gate::check(self, "NewObjectA")?;
        let new_object = jni_entry!(self.as_raw(), NewObjectA)?;
        let raw = unsafe {
            new_object(
                self.as_raw(),
                class.as_raw(),
                ctor.as_raw(),
                args.as_ptr() as *const sys::jvalue,
            )
        };
        let obj = gate::check_allocated(self, "NewObjectA", raw)?;
        Ok(unsafe { &*(obj.as_ptr() as *const Object) })
    }
}

// ============================================================================
// Named call operations
// ============================================================================

macro_rules! named_calls {
    ($lt:lifetime; $($inst:ident, $stat:ident => $ty:ty;)*) => {
        impl<$lt> Env<$lt> {
            $(
                #[doc = concat!("Instance call returning `", stringify!($ty), "`")]
                #[inline]
                pub fn $inst(
                    &self,
                    obj: &Object,
                    method: &MethodId,
                    args: &[Value<'_>],
                ) -> JniResult<$ty> {
                    self.call_method(obj, method, args)
                }

                #[doc = concat!("Static call returning `", stringify!($ty), "`")]
                #[inline]
                pub fn $stat(
                    &self,
                    class: &Class,
                    method: &MethodId,
                    args: &[Value<'_>],
                ) -> JniResult<$ty> {
                    self.call_static_method(class, method, args)
                }
            )*
        }
    };
}

named_calls! {
    'a;
    call_void_method, call_static_void_method => ();
    call_boolean_method, call_static_boolean_method => bool;
    call_byte_method, call_static_byte_method => i8;
    call_char_method, call_static_char_method => u16;
    call_short_method, call_static_short_method => i16;
    call_int_method, call_static_int_method => i32;
    call_long_method, call_static_long_method => i64;
    call_float_method, call_static_float_method => f32;
    call_double_method, call_static_double_method => f64;
    call_object_method, call_static_object_method => Option<&'a Object>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JniError;
    use crate::jargs;
    use jnigate_mock::MockVm;

    #[test]
    fn test_static_primitive_kinds() {
        let mock = MockVm::new();
        let env = unsafe { Env::from_raw(mock.runtime_env()) }.unwrap();
        let math = env.find_class("java/lang/Math").unwrap();

        let max = env.get_static_method_id(math, "max", "(II)I").unwrap();
        assert_eq!(env.call_static_int_method(math, max, &jargs![3, 9]).unwrap(), 9);

        let max_long = env.get_static_method_id(math, "max", "(JJ)J").unwrap();
        let big = env
            .call_static_long_method(math, max_long, &jargs![i64::MIN, 1i64 << 40])
            .unwrap();
        assert_eq!(big, 1 << 40);

        let abs = env.get_static_method_id(math, "abs", "(D)D").unwrap();
        assert_eq!(env.call_static_double_method(math, abs, &jargs![-2.5f64]).unwrap(), 2.5);

        let absf = env.get_static_method_id(math, "abs", "(F)F").unwrap();
        assert_eq!(env.call_static_float_method(math, absf, &jargs![-0.25f32]).unwrap(), 0.25);
    }

    #[test]
    fn test_instance_kinds() {
        let mock = MockVm::new();
        let env = unsafe { Env::from_raw(mock.runtime_env()) }.unwrap();
        let string = env.find_class("java/lang/String").unwrap();
        let s = env.new_string("hello").unwrap();

        let length = env.get_method_id(string, "length", "()I").unwrap();
        assert_eq!(env.call_int_method(s, length, &[]).unwrap(), 5);

        let is_empty = env.get_method_id(string, "isEmpty", "()Z").unwrap();
        assert!(!env.call_boolean_method(s, is_empty, &[]).unwrap());

        let char_at = env.get_method_id(string, "charAt", "(I)C").unwrap();
        assert_eq!(env.call_char_method(s, char_at, &jargs![1]).unwrap(), b'e' as u16);

        let to_upper = env
            .get_method_id(string, "toUpperCase", "()Ljava/lang/String;")
            .unwrap();
        let upper: Option<&crate::JString> = env.call_method(s, to_upper, &[]).unwrap();
        assert_eq!(env.get_string(upper.unwrap()).unwrap(), "HELLO");
    }

    #[test]
    fn test_narrow_integer_kinds() {
        let mock = MockVm::new();
        let env = unsafe { Env::from_raw(mock.runtime_env()) }.unwrap();
        let integer = env.find_class("java/lang/Integer").unwrap();
        let value_of = env
            .get_static_method_id(integer, "valueOf", "(I)Ljava/lang/Integer;")
            .unwrap();
        let boxed = env
            .call_static_object_method(integer, value_of, &jargs![300])
            .unwrap()
            .unwrap();

        let byte_value = env.get_method_id(integer, "byteValue", "()B").unwrap();
        assert_eq!(env.call_byte_method(boxed, byte_value, &[]).unwrap(), 300i32 as i8);

        let short_value = env.get_method_id(integer, "shortValue", "()S").unwrap();
        assert_eq!(env.call_short_method(boxed, short_value, &[]).unwrap(), 300);
    }

    #[test]
    fn test_null_object_result_is_not_an_error() {
        let mock = MockVm::new();
        let env = unsafe { Env::from_raw(mock.runtime_env()) }.unwrap();
        let system = env.find_class("java/lang/System").unwrap();
        let get_property = env
            .get_static_method_id(system, "getProperty", "(Ljava/lang/String;)Ljava/lang/String;")
            .unwrap();

        let key = env.new_string("no.such.property").unwrap();
        let result = env.call_static_object_method(system, get_property, &jargs![key]);
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_void_call_is_gated() {
        let mock = MockVm::new();
        let env = unsafe { Env::from_raw(mock.runtime_env()) }.unwrap();
        let system = env.find_class("java/lang/System").unwrap();
        let gc = env.get_static_method_id(system, "gc", "()V").unwrap();
        env.call_static_void_method(system, gc, &[]).unwrap();

        let exit = env.get_static_method_id(system, "exit", "(I)V").unwrap();
        let err = env.call_static_void_method(system, exit, &jargs![1]).unwrap_err();
        assert_eq!(
            err,
            JniError::ForeignException {
                call: "CallStaticVoidMethodA"
            }
        );
    }

    #[test]
    fn test_exception_discards_incidental_return_data() {
        let mock = MockVm::new();
        let env = unsafe { Env::from_raw(mock.runtime_env()) }.unwrap();
        let integer = env.find_class("java/lang/Integer").unwrap();
        let parse = env
            .get_static_method_id(integer, "parseInt", "(Ljava/lang/String;)I")
            .unwrap();

        let bad = env.new_string("not a number").unwrap();
        let result = env.call_static_int_method(integer, parse, &jargs![bad]);
        assert!(result.unwrap_err().is_foreign_exception());
        // The mock filled the return slot with junk; the gate must not leak it
        assert!(mock.stats().incidental_returns > 0);
    }

    #[test]
    fn test_pending_exception_rejects_next_call() {
        let mock = MockVm::new();
        let env = unsafe { Env::from_raw(mock.runtime_env()) }.unwrap();
        let string = env.find_class("java/lang/String").unwrap();
        let s = env.new_string("abc").unwrap();
        let char_at = env.get_method_id(string, "charAt", "(I)C").unwrap();
        let length = env.get_method_id(string, "length", "()I").unwrap();

        assert!(env.call_char_method(s, char_at, &jargs![10]).is_err());

        let err = env.call_int_method(s, length, &[]).unwrap_err();
        assert_eq!(err, JniError::ForeignException { call: "CallIntMethodA" });
        assert_eq!(mock.stats().calls_with_pending_exception, 0);

        env.exception_clear().unwrap();
        assert_eq!(env.call_int_method(s, length, &[]).unwrap(), 3);
    }

    #[test]
    fn test_new_object() {
        let mock = MockVm::new();
        let env = unsafe { Env::from_raw(mock.runtime_env()) }.unwrap();
        let integer = env.find_class("java/lang/Integer").unwrap();
        let ctor = env.get_method_id(integer, "<init>", "(I)V").unwrap();
        let obj = env.new_object(integer, ctor, &jargs![42]).unwrap();

        let int_value = env.get_method_id(integer, "intValue", "()I").unwrap();
        assert_eq!(env.call_int_method(obj, int_value, &[]).unwrap(), 42);
    }

    #[test]
    fn test_new_object_constructor_throws() {
        let mock = MockVm::new();
        let env = unsafe { Env::from_raw(mock.runtime_env()) }.unwrap();
        let integer = env.find_class("java/lang/Integer").unwrap();
        let ctor = env
            .get_method_id(integer, "<init>", "(Ljava/lang/String;)V")
            .unwrap();
        let bad = env.new_string("x").unwrap();
        let err = env.new_object(integer, ctor, &jargs![bad]).unwrap_err();
        assert_eq!(err, JniError::ForeignException { call: "NewObjectA" });
    }

    #[test]
    fn test_return_kinds() {
        assert_eq!(<i32 as JavaReturn<'_>>::KIND, Kind::Int);
        assert_eq!(<() as JavaReturn<'_>>::KIND, Kind::Void);
        assert_eq!(<Option<&Object> as JavaReturn<'_>>::KIND, Kind::Object);
        assert_eq!(<u16 as JavaReturn<'_>>::INSTANCE_CALL, "CallCharMethodA");
        assert_eq!(<f64 as JavaReturn<'_>>::STATIC_CALL, "CallStaticDoubleMethodA");
    }
}
