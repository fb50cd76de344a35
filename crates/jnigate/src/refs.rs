//! Opaque reference types
//!
//! The raw interface models objects, classes and member ids as pointer-sized
//! values that are freely copied. Here each category is an opaque type that
//! can never be constructed, moved or copied by value: it only exists behind
//! a reference (`&'a Object`) whose lifetime is bounded by whoever handed it
//! out. Local references therefore cannot escape the environment frame that
//! issued them, and anything that must outlive it has to be promoted to a
//! [`GlobalRef`](crate::GlobalRef).

use std::marker::{PhantomData, PhantomPinned};
use std::ops::Deref;

use crate::sys;

mod private {
    pub trait Sealed {}
}

macro_rules! opaque {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[repr(C)]
        pub struct $name {
            _opaque: [u8; 0],
            _marker: PhantomData<(*mut u8, PhantomPinned)>,
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({:p})", stringify!($name), self as *const Self)
            }
        }
    };
}

opaque!(
    /// A Java object (`jobject`)
    Object
);
opaque!(
    /// A Java class object (`jclass`)
    Class
);
opaque!(
    /// A Java throwable (`jthrowable`)
    Throwable
);
opaque!(
    /// A `java.lang.String` instance (`jstring`)
    JString
);
opaque!(
    /// A resolved method identifier (`jmethodID`)
    MethodId
);
opaque!(
    /// A resolved field identifier (`jfieldID`)
    FieldId
);

// ============================================================================
// Object references
// ============================================================================

/// Implemented by every opaque type that is a Java object reference.
///
/// Conversions between reference types are reinterpretations: they do not
/// check the runtime class, exactly like the raw interface.
pub trait Reference: private::Sealed + Sized {
    /// Borrow as the raw handle
    fn as_raw(&self) -> sys::jobject {
        self as *const Self as *mut sys::_jobject
    }

    /// View as a plain object
    fn as_object(&self) -> &Object {
        // SAFETY: all reference types share the zero-sized opaque layout.
        unsafe { &*(self as *const Self as *const Object) }
    }

    /// Wrap a raw handle
    ///
    /// # Safety
    /// `raw` must be null or a reference handle valid for `'a` whose runtime
    /// class is compatible with `Self`.
    unsafe fn from_raw<'a>(raw: sys::jobject) -> Option<&'a Self> {
        (raw as *const Self).as_ref()
    }
}

impl private::Sealed for Object {}
impl Reference for Object {}

impl Object {
    /// Reinterpret this object as another reference type.
    ///
    /// # Safety
    /// The runtime class of the object must be compatible with `T`.
    pub unsafe fn cast_unchecked<T: Reference>(&self) -> &T {
        &*(self as *const Object as *const T)
    }
}

macro_rules! object_subtype {
    ($($name:ident),*) => {$(
        impl private::Sealed for $name {}
        impl Reference for $name {}

        impl Deref for $name {
            type Target = Object;

            fn deref(&self) -> &Object {
                self.as_object()
            }
        }

        impl AsRef<Object> for $name {
            fn as_ref(&self) -> &Object {
                self.as_object()
            }
        }
    )*};
}

object_subtype!(Class, Throwable, JString);

// ============================================================================
// Member identifiers
// ============================================================================

impl MethodId {
    /// Borrow as the raw identifier
    pub fn as_raw(&self) -> sys::jmethodID {
        self as *const Self as *mut sys::_jmethodID
    }

    /// Wrap a raw identifier, e.g. one cached by the caller.
    ///
    /// # Safety
    /// `raw` must be null or an identifier resolved from a class that stays
    /// loaded for `'a`.
    pub unsafe fn from_raw<'a>(raw: sys::jmethodID) -> Option<&'a MethodId> {
        (raw as *const MethodId).as_ref()
    }
}

impl FieldId {
    /// Borrow as the raw identifier
    pub fn as_raw(&self) -> sys::jfieldID {
        self as *const Self as *mut sys::_jfieldID
    }

    /// Wrap a raw identifier, e.g. one cached by the caller.
    ///
    /// # Safety
    /// `raw` must be null or an identifier resolved from a class that stays
    /// loaded for `'a`.
    pub unsafe fn from_raw<'a>(raw: sys::jfieldID) -> Option<&'a FieldId> {
        (raw as *const FieldId).as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake(addr: usize) -> sys::jobject {
        addr as sys::jobject
    }

    #[test]
    fn test_from_raw_null() {
        let obj = unsafe { Object::from_raw(std::ptr::null_mut()) };
        assert!(obj.is_none());
        let method = unsafe { MethodId::from_raw(std::ptr::null_mut()) };
        assert!(method.is_none());
    }

    #[test]
    fn test_raw_round_trip_keeps_address() {
        let class: &Class = unsafe { Class::from_raw(fake(0x1000)) }.unwrap();
        assert_eq!(class.as_raw() as usize, 0x1000);
        assert_eq!(class.as_object().as_raw() as usize, 0x1000);

        let string: &JString = unsafe { class.as_object().cast_unchecked() };
        assert_eq!(string.as_raw() as usize, 0x1000);
    }

    #[test]
    fn test_ids_keep_address() {
        let field = unsafe { FieldId::from_raw(0x2000 as sys::jfieldID) }.unwrap();
        assert_eq!(field.as_raw() as usize, 0x2000);
        let method = unsafe { MethodId::from_raw(0x3000 as sys::jmethodID) }.unwrap();
        assert_eq!(method.as_raw() as usize, 0x3000);
    }
}
