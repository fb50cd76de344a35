//! Field access
//!
//! Same shape as dispatch: one sealed trait per value kind picks the raw
//! Get/Set entry points, and every access runs through the exception gate.

use crate::env::Env;
use crate::error::JniResult;
use crate::gate;
use crate::macros::jni_entry;
use crate::refs::{Class, FieldId, Object, Reference};
use crate::sys;
use crate::value::Kind;

mod private {
    pub trait Sealed {}
}

/// Types that can be read from or written to a Java field.
pub trait JavaField<'a>: private::Sealed + Sized {
    /// Kind of the field
    const KIND: Kind;

    #[doc(hidden)]
    const GET: &'static str;
    #[doc(hidden)]
    const SET: &'static str;
    #[doc(hidden)]
    const GET_STATIC: &'static str;
    #[doc(hidden)]
    const SET_STATIC: &'static str;

    #[doc(hidden)]
    unsafe fn get_raw(env: *mut sys::JNIEnv, obj: sys::jobject, field: sys::jfieldID)
        -> JniResult<Self::Raw>;

    #[doc(hidden)]
    unsafe fn get_static_raw(env: *mut sys::JNIEnv, class: sys::jclass, field: sys::jfieldID)
        -> JniResult<Self::Raw>;

    #[doc(hidden)]
    unsafe fn set_raw(self, env: *mut sys::JNIEnv, obj: sys::jobject, field: sys::jfieldID)
        -> JniResult<()>;

    #[doc(hidden)]
    unsafe fn set_static_raw(self, env: *mut sys::JNIEnv, class: sys::jclass, field: sys::jfieldID)
        -> JniResult<()>;

    #[doc(hidden)]
    type Raw;

    #[doc(hidden)]
    fn from_gated(env: &Env<'a>, call: &'static str, raw: Self::Raw) -> JniResult<Self>;
}

macro_rules! java_field {
    ($ty:ty, $raw:ty, $kind:ident, $get:ident, $set:ident, $sget:ident, $sset:ident,
     into: |$i:ident| $into:expr, from: |$f:ident| $from:expr) => {
        impl private::Sealed for $ty {}

        impl<'a> JavaField<'a> for $ty {
            const KIND: Kind = Kind::$kind;
            const GET: &'static str = stringify!($get);
            const SET: &'static str = stringify!($set);
            const GET_STATIC: &'static str = stringify!($sget);
            const SET_STATIC: &'static str = stringify!($sset);
            type Raw = $raw;

            unsafe fn get_raw(env: *mut sys::JNIEnv, obj: sys::jobject, field: sys::jfieldID)
                -> JniResult<$raw> {
                Ok(jni_entry!(env, $get)?(env, obj, field))
            }

            unsafe fn get_static_raw(env: *mut sys::JNIEnv, class: sys::jclass, field: sys::jfieldID)
                -> JniResult<$raw> {
                Ok(jni_entry!(env, $sget)?(env, class, field))
            }

            unsafe fn set_raw(self, env: *mut sys::JNIEnv, obj: sys::jobject, field: sys::jfieldID)
                -> JniResult<()> {
                let $i = self;
                jni_entry!(env, $set)?(env, obj, field, $into);
                Ok(())
            }

            unsafe fn set_static_raw(self, env: *mut sys::JNIEnv, class: sys::jclass, field: sys::jfieldID)
                -> JniResult<()> {
                let $i = self;
                jni_entry!(env, $sset)?(env, class, field, $into);
                Ok(())
            }

            fn from_gated(env: &Env<'a>, call: &'static str, raw: $raw) -> JniResult<Self> {
                let $f = gate::check_value(env, call, raw)?;
                Ok($from)
            }
        }
    };
}

java_field!(bool, sys::jboolean, Boolean,
    GetBooleanField, SetBooleanField, GetStaticBooleanField, SetStaticBooleanField,
    into: |v| if v { sys::JNI_TRUE } else { sys::JNI_FALSE }, from: |v| v != sys::JNI_FALSE);
java_field!(i8, sys::jbyte, Byte,
    GetByteField, SetByteField, GetStaticByteField, SetStaticByteField,
    into: |v| v, from: |v| v);
java_field!(u16, sys::jchar, Char,
    GetCharField, SetCharField, GetStaticCharField, SetStaticCharField,
    into: |v| v, from: |v| v);
java_field!(i16, sys::jshort, Short,
    GetShortField, SetShortField, GetStaticShortField, SetStaticShortField,
    into: |v| v, from: |v| v);
java_field!(i32, sys::jint, Int,
    GetIntField, SetIntField, GetStaticIntField, SetStaticIntField,
    into: |v| v, from: |v| v);
java_field!(i64, sys::jlong, Long,
    GetLongField, SetLongField, GetStaticLongField, SetStaticLongField,
    into: |v| v, from: |v| v);
java_field!(f32, sys::jfloat, Float,
    GetFloatField, SetFloatField, GetStaticFloatField, SetStaticFloatField,
    into: |v| v, from: |v| v);
java_field!(f64, sys::jdouble, Double,
    GetDoubleField, SetDoubleField, GetStaticDoubleField, SetStaticDoubleField,
    into: |v| v, from: |v| v);

impl<'a, T: Reference> private::Sealed for Option<&'a T> {}

impl<'a, T: Reference + 'a> JavaField<'a> for Option<&'a T> {
    const KIND: Kind = Kind::Object;
    const GET: &'static str = "GetObjectField";
    const SET: &'static str = "SetObjectField";
    const GET_STATIC: &'static str = "GetStaticObjectField";
    const SET_STATIC: &'static str = "SetStaticObjectField";
    type Raw = sys::jobject;

    unsafe fn get_raw(env: *mut sys::JNIEnv, obj: sys::jobject, field: sys::jfieldID)
        -> JniResult<sys::jobject> {
        Ok(jni_entry!(env, GetObjectField)?(env, obj, field))
    }

    unsafe fn get_static_raw(env: *mut sys::JNIEnv, class: sys::jclass, field: sys::jfieldID)
        -> JniResult<sys::jobject> {
        Ok(jni_entry!(env, GetStaticObjectField)?(env, class, field))
    }

    unsafe fn set_raw(self, env: *mut sys::JNIEnv, obj: sys::jobject, field: sys::jfieldID)
        -> JniResult<()> {
        let value = self.map_or(std::ptr::null_mut(), |v| v.as_raw());
        jni_entry!(env, SetObjectField)?(env, obj, field, value);
        Ok(())
    }

    unsafe fn set_static_raw(self, env: *mut sys::JNIEnv, class: sys::jclass, field: sys::jfieldID)
        -> JniResult<()> {
        let value = self.map_or(std::ptr::null_mut(), |v| v.as_raw());
        jni_entry!(env, SetStaticObjectField)?(env, class, field, value);
        Ok(())
    }

    fn from_gated(env: &Env<'a>, call: &'static str, raw: sys::jobject) -> JniResult<Self> {
        gate::check_object(env, call, raw)
    }
}

impl<'a> Env<'a> {
    /// Read an instance field
    pub fn get_field<F: JavaField<'a>>(&self, obj: &Object, field: &FieldId) -> JniResult<F> {
        gate::check(self, F::GET)?;
        let raw = unsafe { F::get_raw(self.as_raw(), obj.as_raw(), field.as_raw())? };
        F::from_gated(self, F::GET, raw)
    }

    /// Write an instance field
    pub fn set_field<F: JavaField<'a>>(
        &self,
        obj: &Object,
        field: &FieldId,
        value: F,
    ) -> JniResult<()> {
        gate::check(self, F::SET)?;
        unsafe { value.set_raw(self.as_raw(), obj.as_raw(), field.as_raw())? };
        gate::check(self, F::SET)
    }

    /// Read a static field
    pub fn get_static_field<F: JavaField<'a>>(
        &self,
        class: &Class,
        field: &FieldId,
    ) -> JniResult<F> {
        gate::check(self, F::GET_STATIC)?;
        let raw = unsafe { F::get_static_raw(self.as_raw(), class.as_raw(), field.as_raw())? };
        F::from_gated(self, F::GET_STATIC, raw)
    }

    /// Write a static field
    pub fn set_static_field<F: JavaField<'a>>(
        &self,
        class: &Class,
        field: &FieldId,
        value: F,
    ) -> JniResult<()> {
        gate::check(self, F::SET_STATIC)?;
        unsafe { value.set_static_raw(self.as_raw(), class.as_raw(), field.as_raw())? };
        gate::check(self, F::SET_STATIC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JniError;
    use crate::jargs;
    use jnigate_mock::MockVm;

    #[test]
    fn test_instance_int_field() {
        let mock = MockVm::new();
        let env = unsafe { Env::from_raw(mock.runtime_env()) }.unwrap();
        let integer = env.find_class("java/lang/Integer").unwrap();
        let ctor = env.get_method_id(integer, "<init>", "(I)V").unwrap();
        let obj = env.new_object(integer, ctor, &jargs![7]).unwrap();
        let value = env.get_field_id(integer, "value", "I").unwrap();

        assert_eq!(env.get_field::<i32>(obj, value).unwrap(), 7);
        env.set_field(obj, value, 99i32).unwrap();
        assert_eq!(env.get_field::<i32>(obj, value).unwrap(), 99);

        let int_value = env.get_method_id(integer, "intValue", "()I").unwrap();
        assert_eq!(env.call_int_method(obj, int_value, &[]).unwrap(), 99);
    }

    #[test]
    fn test_static_field() {
        let mock = MockVm::new();
        let env = unsafe { Env::from_raw(mock.runtime_env()) }.unwrap();
        let integer = env.find_class("java/lang/Integer").unwrap();
        let max = env.get_static_field_id(integer, "MAX_VALUE", "I").unwrap();
        assert_eq!(env.get_static_field::<i32>(integer, max).unwrap(), i32::MAX);
    }

    #[test]
    fn test_object_field_null_and_set() {
        let mock = MockVm::new();
        let env = unsafe { Env::from_raw(mock.runtime_env()) }.unwrap();
        let throwable = env.find_class("java/lang/Throwable").unwrap();
        let ctor = env.get_method_id(throwable, "<init>", "()V").unwrap();
        let obj = env.new_object(throwable, ctor, &[]).unwrap();
        let message = env
            .get_field_id(throwable, "detailMessage", "Ljava/lang/String;")
            .unwrap();

        let none: Option<&crate::JString> = env.get_field(obj, message).unwrap();
        assert!(none.is_none());

        let text = env.new_string("set directly").unwrap();
        env.set_field(obj, message, Some(text)).unwrap();
        let got: Option<&crate::JString> = env.get_field(obj, message).unwrap();
        assert_eq!(env.get_string(got.unwrap()).unwrap(), "set directly");
    }

    #[test]
    fn test_field_access_rejected_while_pending() {
        let mock = MockVm::new();
        let env = unsafe { Env::from_raw(mock.runtime_env()) }.unwrap();
        let integer = env.find_class("java/lang/Integer").unwrap();
        let max = env.get_static_field_id(integer, "MAX_VALUE", "I").unwrap();

        let class = env.find_class("java/lang/RuntimeException").unwrap();
        env.throw_new(class, "pending").unwrap();

        let err = env.get_static_field::<i32>(integer, max).unwrap_err();
        assert_eq!(err, JniError::ForeignException { call: "GetStaticIntField" });
        assert_eq!(mock.stats().calls_with_pending_exception, 0);
        env.exception_clear().unwrap();
    }

    #[test]
    fn test_rejection_names_the_entry_point() {
        let mock = MockVm::new();
        let env = unsafe { Env::from_raw(mock.runtime_env()) }.unwrap();
        let throwable = env.find_class("java/lang/Throwable").unwrap();
        let ctor = env.get_method_id(throwable, "<init>", "()V").unwrap();
        let obj = env.new_object(throwable, ctor, &[]).unwrap();
        let message = env
            .get_field_id(throwable, "detailMessage", "Ljava/lang/String;")
            .unwrap();
        let integer = env.find_class("java/lang/Integer").unwrap();
        let max = env.get_static_field_id(integer, "MAX_VALUE", "I").unwrap();

        let class = env.find_class("java/lang/RuntimeException").unwrap();
        env.throw_new(class, "pending").unwrap();

        let err = env.get_field::<Option<&crate::JString>>(obj, message).unwrap_err();
        assert_eq!(err, JniError::ForeignException { call: "GetObjectField" });
        let err = env.set_field(obj, message, None::<&crate::JString>).unwrap_err();
        assert_eq!(err, JniError::ForeignException { call: "SetObjectField" });
        let err = env.set_static_field(integer, max, 0i32).unwrap_err();
        assert_eq!(err, JniError::ForeignException { call: "SetStaticIntField" });
        assert_eq!(mock.stats().calls_with_pending_exception, 0);
        env.exception_clear().unwrap();
    }

    #[test]
    fn test_field_kinds() {
        assert_eq!(<bool as JavaField<'_>>::KIND, Kind::Boolean);
        assert_eq!(<Option<&Object> as JavaField<'_>>::KIND, Kind::Object);
    }
}
