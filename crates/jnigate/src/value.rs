//! Value: typed construction of `jvalue` call arguments
//!
//! The vectorized ("A") entry points take their arguments as one contiguous
//! `jvalue` array. [`Value`] is a transparent wrapper over that union: the
//! active arm is decided by the constructor that built it and is not stored
//! anywhere, so a `&[Value]` can be handed to the runtime as-is.
//!
//! Every constructor zeroes all eight bytes before writing its arm. Reading a
//! different arm afterwards yields unspecified bits but never touches
//! uninitialized memory.

use std::fmt;
use std::marker::PhantomData;

use crate::refs::{Object, Reference};
use crate::sys;

/// The nine value kinds plus `void`, with their signature characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Object,
    Void,
}

impl Kind {
    /// Type descriptor character used in member signatures
    pub const fn descriptor(self) -> char {
        match self {
            Kind::Boolean => 'Z',
            Kind::Byte => 'B',
            Kind::Char => 'C',
            Kind::Short => 'S',
            Kind::Int => 'I',
            Kind::Long => 'J',
            Kind::Float => 'F',
            Kind::Double => 'D',
            Kind::Object => 'L',
            Kind::Void => 'V',
        }
    }
}

/// A single call argument.
///
/// Object arguments borrow the referenced handle for `'a`.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct Value<'a> {
    raw: sys::jvalue,
    _ref: PhantomData<&'a Object>,
}

impl<'a> Value<'a> {
    #[inline]
    fn zeroed() -> sys::jvalue {
        sys::jvalue { j: 0 }
    }

    #[inline]
    fn wrap(raw: sys::jvalue) -> Self {
        Value {
            raw,
            _ref: PhantomData,
        }
    }

    // ========================================================================
    // Constructors
    // ========================================================================

    /// Box a `boolean`
    #[inline]
    pub fn boolean(z: bool) -> Self {
        let mut raw = Self::zeroed();
        raw.z = if z { sys::JNI_TRUE } else { sys::JNI_FALSE };
        Self::wrap(raw)
    }

    /// Box a `byte`
    #[inline]
    pub fn byte(b: i8) -> Self {
        let mut raw = Self::zeroed();
        raw.b = b;
        Self::wrap(raw)
    }

    /// Box a `char` (a UTF-16 code unit)
    #[inline]
    pub fn char(c: u16) -> Self {
        let mut raw = Self::zeroed();
        raw.c = c;
        Self::wrap(raw)
    }

    /// Box a `short`
    #[inline]
    pub fn short(s: i16) -> Self {
        let mut raw = Self::zeroed();
        raw.s = s;
        Self::wrap(raw)
    }

    /// Box an `int`
    #[inline]
    pub fn int(i: i32) -> Self {
        let mut raw = Self::zeroed();
        raw.i = i;
        Self::wrap(raw)
    }

    /// Box a `long`
    #[inline]
    pub fn long(j: i64) -> Self {
        let mut raw = Self::zeroed();
        raw.j = j;
        Self::wrap(raw)
    }

    /// Box a `float`
    #[inline]
    pub fn float(f: f32) -> Self {
        let mut raw = Self::zeroed();
        raw.f = f;
        Self::wrap(raw)
    }

    /// Box a `double`
    #[inline]
    pub fn double(d: f64) -> Self {
        let mut raw = Self::zeroed();
        raw.d = d;
        Self::wrap(raw)
    }

    /// Box an object reference. Stores the handle address, not a copy.
    #[inline]
    pub fn object<T: Reference>(obj: &'a T) -> Self {
        let mut raw = Self::zeroed();
        raw.l = obj.as_raw();
        Self::wrap(raw)
    }

    /// Box a Java `null`
    #[inline]
    pub fn null() -> Self {
        let mut raw = Self::zeroed();
        raw.l = std::ptr::null_mut();
        Self::wrap(raw)
    }

    // ========================================================================
    // Extractors
    //
    // Reading an arm other than the one written returns unspecified bits.
    // ========================================================================

    /// Read the `boolean` arm
    #[inline]
    pub fn as_boolean(&self) -> bool {
        // SAFETY: all eight bytes are initialized by construction.
        unsafe { self.raw.z != sys::JNI_FALSE }
    }

    /// Read the `byte` arm
    #[inline]
    pub fn as_byte(&self) -> i8 {
        unsafe { self.raw.b }
    }

    /// Read the `char` arm
    #[inline]
    pub fn as_char(&self) -> u16 {
        unsafe { self.raw.c }
    }

    /// Read the `short` arm
    #[inline]
    pub fn as_short(&self) -> i16 {
        unsafe { self.raw.s }
    }

    /// Read the `int` arm
    #[inline]
    pub fn as_int(&self) -> i32 {
        unsafe { self.raw.i }
    }

    /// Read the `long` arm
    #[inline]
    pub fn as_long(&self) -> i64 {
        unsafe { self.raw.j }
    }

    /// Read the `float` arm
    #[inline]
    pub fn as_float(&self) -> f32 {
        unsafe { self.raw.f }
    }

    /// Read the `double` arm
    #[inline]
    pub fn as_double(&self) -> f64 {
        unsafe { self.raw.d }
    }

    /// Read the object arm. `None` for a boxed `null`.
    #[inline]
    pub fn as_object(&self) -> Option<&'a Object> {
        unsafe { Object::from_raw(self.raw.l) }
    }

    /// The raw union, e.g. for a hand-written raw call
    #[inline]
    pub fn as_raw(&self) -> sys::jvalue {
        self.raw
    }

    /// All eight bytes of the union
    #[inline]
    pub fn to_bits(&self) -> u64 {
        self.as_long() as u64
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({:#018x})", self.to_bits())
    }
}

// ============================================================================
// Conversions
// ============================================================================

macro_rules! value_from {
    ($($ty:ty => $ctor:ident),* $(,)?) => {$(
        impl From<$ty> for Value<'_> {
            #[inline]
            fn from(v: $ty) -> Self {
                Value::$ctor(v)
            }
        }
    )*};
}

value_from! {
    bool => boolean,
    i8 => byte,
    u16 => char,
    i16 => short,
    i32 => int,
    i64 => long,
    f32 => float,
    f64 => double,
}

impl<'a, T: Reference> From<&'a T> for Value<'a> {
    #[inline]
    fn from(obj: &'a T) -> Self {
        Value::object(obj)
    }
}

impl<'a, T: Reference> From<Option<&'a T>> for Value<'a> {
    #[inline]
    fn from(obj: Option<&'a T>) -> Self {
        match obj {
            Some(obj) => Value::object(obj),
            None => Value::null(),
        }
    }
}

/// Box call arguments into a contiguous array, in declaration order.
///
/// ```ignore
/// let len = env.call_int_method(s, length, &jargs![])?;
/// let max = env.call_static_int_method(math, max, &jargs![3, 7])?;
/// ```
#[macro_export]
macro_rules! jargs {
    ($($arg:expr),* $(,)?) => {
        [$($crate::Value::from($arg)),*]
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refs::JString;

    #[test]
    fn test_primitive_round_trip_is_bit_equal() {
        assert!(Value::boolean(true).as_boolean());
        assert!(!Value::boolean(false).as_boolean());
        assert_eq!(Value::byte(-128).as_byte(), -128);
        assert_eq!(Value::char(0xFFFF).as_char(), 0xFFFF);
        assert_eq!(Value::short(i16::MIN).as_short(), i16::MIN);
        assert_eq!(Value::int(-42).as_int(), -42);
        assert_eq!(Value::long(i64::MAX).as_long(), i64::MAX);

        let nan = f32::from_bits(0x7FC0_1234);
        assert_eq!(Value::float(nan).as_float().to_bits(), 0x7FC0_1234);
        assert_eq!(Value::float(-0.0).as_float().to_bits(), (-0.0f32).to_bits());

        let weird = f64::from_bits(0xFFF8_0000_DEAD_BEEF);
        assert_eq!(Value::double(weird).as_double().to_bits(), 0xFFF8_0000_DEAD_BEEF);
    }

    #[test]
    fn test_object_stores_handle_address() {
        let obj: &Object = unsafe { Object::from_raw(0x40 as sys::jobject) }.unwrap();
        let v = Value::object(obj);
        assert_eq!(v.as_object().unwrap().as_raw() as usize, 0x40);

        let s: &JString = unsafe { JString::from_raw(0x80 as sys::jobject) }.unwrap();
        assert_eq!(Value::from(s).as_object().unwrap().as_raw() as usize, 0x80);

        assert!(Value::null().as_object().is_none());
        assert!(Value::from(None::<&Object>).as_object().is_none());
    }

    #[test]
    fn test_narrow_kinds_zero_the_rest() {
        assert_eq!(Value::boolean(true).to_bits() >> 8, 0);
        assert_eq!(Value::int(-1).to_bits() >> 32, 0);
        assert_eq!(Value::char(7).to_bits() >> 16, 0);
    }

    #[test]
    fn test_mismatched_read_does_not_crash() {
        let v = Value::double(1.5);
        let _ = v.as_int();
        let _ = v.as_boolean();
        let _ = v.as_char();
        let _ = v.as_object();
        let v = Value::boolean(true);
        let _ = v.as_double();
        let _ = v.as_long();
    }

    #[test]
    fn test_jargs_preserves_order() {
        let args = jargs![1i32, 2i64, true, 0.5f64];
        assert_eq!(args.len(), 4);
        assert_eq!(args[0].as_int(), 1);
        assert_eq!(args[1].as_long(), 2);
        assert!(args[2].as_boolean());
        assert_eq!(args[3].as_double(), 0.5);

        let empty: [Value<'_>; 0] = jargs![];
        assert!(empty.is_empty());
    }

    #[test]
    fn test_kind_descriptors() {
        assert_eq!(Kind::Long.descriptor(), 'J');
        assert_eq!(Kind::Boolean.descriptor(), 'Z');
        assert_eq!(Kind::Void.descriptor(), 'V');
    }

    #[test]
    fn test_value_is_a_jvalue() {
        assert_eq!(
            std::mem::size_of::<Value<'_>>(),
            std::mem::size_of::<sys::jvalue>()
        );
    }
}
