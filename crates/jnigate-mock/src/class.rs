//! Mock class definitions and the context native behaviors run in

use std::fmt;
use std::sync::Arc;

use jni_sys::{jboolean, jbyte, jchar, jdouble, jfloat, jint, jlong, jshort, jvalue};

use crate::state::State;

/// Identity of an object on the mock heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjId(pub(crate) usize);

/// Behavior attached to a mock method
pub type Behavior = Arc<dyn Fn(&mut CallContext<'_>) -> Outcome + Send + Sync>;

/// What a mock method did
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Returned normally from a `void` method
    Void,
    /// Returned a primitive, stored as raw bits
    Value(u64),
    /// Returned an object or null
    Object(Option<ObjId>),
    /// Threw a new exception of `class` with `message`
    Throw { class: String, message: String },
}

impl Outcome {
    pub fn boolean(v: bool) -> Self {
        Outcome::Value(v as u64)
    }

    pub fn byte(v: i8) -> Self {
        Outcome::Value(v.into_slot())
    }

    pub fn char(v: u16) -> Self {
        Outcome::Value(v.into_slot())
    }

    pub fn short(v: i16) -> Self {
        Outcome::Value(v.into_slot())
    }

    pub fn int(v: i32) -> Self {
        Outcome::Value(v.into_slot())
    }

    pub fn long(v: i64) -> Self {
        Outcome::Value(v.into_slot())
    }

    pub fn float(v: f32) -> Self {
        Outcome::Value(v.into_slot())
    }

    pub fn double(v: f64) -> Self {
        Outcome::Value(v.into_slot())
    }

    /// Throw `class` (slash-separated name) with `message`
    pub fn throw(class: &str, message: impl Into<String>) -> Self {
        Outcome::Throw {
            class: class.to_string(),
            message: message.into(),
        }
    }
}

/// Conversion between JNI primitives and the 64-bit slots the mock heap
/// stores them in
pub trait Slot: Copy {
    fn into_slot(self) -> u64;
    fn from_slot(bits: u64) -> Self;
}

macro_rules! int_slot {
    ($($ty:ty => $unsigned:ty),*) => {$(
        impl Slot for $ty {
            #[inline]
            fn into_slot(self) -> u64 {
                self as $unsigned as u64
            }

            #[inline]
            fn from_slot(bits: u64) -> Self {
                bits as $unsigned as $ty
            }
        }
    )*};
}

int_slot!(jboolean => u8, jbyte => u8, jchar => u16, jshort => u16, jint => u32, jlong => u64);

impl Slot for jfloat {
    fn into_slot(self) -> u64 {
        self.to_bits() as u64
    }

    fn from_slot(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }
}

impl Slot for jdouble {
    fn into_slot(self) -> u64 {
        self.to_bits()
    }

    fn from_slot(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}

/// Parameter type characters of a method descriptor: `(ILjava/lang/String;[J)V`
/// gives `['I', 'L', '[']`.
pub(crate) fn parameter_kinds(signature: &str) -> Vec<char> {
    let mut kinds = Vec::new();
    let Some(params) = signature
        .strip_prefix('(')
        .and_then(|rest| rest.split(')').next())
    else {
        return kinds;
    };

    let mut chars = params.chars();
    while let Some(c) = chars.next() {
        match c {
            'L' => {
                kinds.push('L');
                for c in chars.by_ref() {
                    if c == ';' {
                        break;
                    }
                }
            }
            '[' => {
                kinds.push('[');
                // Skip the element type
                let mut element = chars.next();
                while element == Some('[') {
                    element = chars.next();
                }
                if element == Some('L') {
                    for c in chars.by_ref() {
                        if c == ';' {
                            break;
                        }
                    }
                }
            }
            other => kinds.push(other),
        }
    }
    kinds
}

// ============================================================================
// Class builder
// ============================================================================

pub(crate) struct MethodSpec {
    pub(crate) name: String,
    pub(crate) signature: String,
    pub(crate) is_static: bool,
    pub(crate) behavior: Behavior,
}

pub(crate) struct FieldSpec {
    pub(crate) name: String,
    pub(crate) signature: String,
    pub(crate) initial: u64,
}

/// Describes a class to install with [`MockVm::define_class`](crate::MockVm::define_class).
pub struct ClassBuilder {
    pub(crate) name: String,
    pub(crate) superclass: Option<String>,
    pub(crate) methods: Vec<MethodSpec>,
    pub(crate) fields: Vec<FieldSpec>,
    pub(crate) statics: Vec<FieldSpec>,
}

impl ClassBuilder {
    /// A class extending `java/lang/Object`
    pub fn new(name: &str) -> Self {
        let superclass = (name != "java/lang/Object").then(|| "java/lang/Object".to_string());
        Self {
            name: name.to_string(),
            superclass,
            methods: Vec::new(),
            fields: Vec::new(),
            statics: Vec::new(),
        }
    }

    pub fn extends(mut self, superclass: &str) -> Self {
        self.superclass = Some(superclass.to_string());
        self
    }

    pub fn method<F>(self, name: &str, signature: &str, behavior: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Outcome + Send + Sync + 'static,
    {
        self.add_method(name, signature, false, Arc::new(behavior))
    }

    pub fn static_method<F>(self, name: &str, signature: &str, behavior: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Outcome + Send + Sync + 'static,
    {
        self.add_method(name, signature, true, Arc::new(behavior))
    }

    /// Constructor body; `this` is the freshly allocated instance
    pub fn constructor<F>(self, signature: &str, behavior: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Outcome + Send + Sync + 'static,
    {
        self.add_method("<init>", signature, false, Arc::new(behavior))
    }

    pub fn field(mut self, name: &str, signature: &str) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            signature: signature.to_string(),
            initial: 0,
        });
        self
    }

    pub fn static_field(mut self, name: &str, signature: &str, initial: impl Slot) -> Self {
        self.statics.push(FieldSpec {
            name: name.to_string(),
            signature: signature.to_string(),
            initial: initial.into_slot(),
        });
        self
    }

    fn add_method(mut self, name: &str, signature: &str, is_static: bool, behavior: Behavior) -> Self {
        self.methods.push(MethodSpec {
            name: name.to_string(),
            signature: signature.to_string(),
            is_static,
            behavior,
        });
        self
    }
}

impl fmt::Debug for ClassBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBuilder")
            .field("name", &self.name)
            .field("superclass", &self.superclass)
            .field("methods", &self.methods.len())
            .field("fields", &self.fields.len())
            .finish()
    }
}

// ============================================================================
// Call context
// ============================================================================

/// What a behavior sees while it runs: the receiver, the arguments and the
/// mock heap.
pub struct CallContext<'s> {
    pub(crate) state: &'s mut State,
    pub(crate) this: Option<ObjId>,
    pub(crate) args: Vec<jvalue>,
}

impl<'s> CallContext<'s> {
    /// Receiver of an instance call
    pub fn this(&self) -> Option<ObjId> {
        self.this
    }

    fn arg(&self, index: usize) -> jvalue {
        self.args.get(index).copied().unwrap_or(jvalue { j: 0 })
    }

    pub fn boolean(&self, index: usize) -> bool {
        unsafe { self.arg(index).z != 0 }
    }

    pub fn byte(&self, index: usize) -> i8 {
        unsafe { self.arg(index).b }
    }

    pub fn char(&self, index: usize) -> u16 {
        unsafe { self.arg(index).c }
    }

    pub fn short(&self, index: usize) -> i16 {
        unsafe { self.arg(index).s }
    }

    pub fn int(&self, index: usize) -> i32 {
        unsafe { self.arg(index).i }
    }

    pub fn long(&self, index: usize) -> i64 {
        unsafe { self.arg(index).j }
    }

    pub fn float(&self, index: usize) -> f32 {
        unsafe { self.arg(index).f }
    }

    pub fn double(&self, index: usize) -> f64 {
        unsafe { self.arg(index).d }
    }

    /// Object argument, resolved through the reference table
    pub fn object(&self, index: usize) -> Option<ObjId> {
        let handle = unsafe { self.arg(index).l };
        self.state.deref_handle(handle)
    }

    /// Contents of a string argument
    pub fn string_arg(&self, index: usize) -> Option<String> {
        self.object(index).and_then(|obj| self.string(obj))
    }

    /// Contents of a `java.lang.String` object
    pub fn string(&self, obj: ObjId) -> Option<String> {
        self.state.string(obj).map(str::to_string)
    }

    pub fn new_string(&mut self, text: &str) -> ObjId {
        self.state.new_string(text)
    }

    /// Allocate an instance without running a constructor
    pub fn new_instance(&mut self, class: &str) -> Option<ObjId> {
        let class = self.state.class_by_name(class)?;
        Some(self.state.alloc_instance(class))
    }

    pub fn class_name(&self, obj: ObjId) -> &str {
        self.state.class_name_of(obj)
    }

    /// Raw slot of an instance field, looked up by name
    pub fn field(&self, obj: ObjId, name: &str) -> u64 {
        self.state.named_field(obj, name).unwrap_or(0)
    }

    pub fn set_field(&mut self, obj: ObjId, name: &str, value: impl Slot) {
        self.state.set_named_field(obj, name, value.into_slot());
    }

    pub fn field_object(&self, obj: ObjId, name: &str) -> Option<ObjId> {
        crate::state::slot_to_obj(self.field(obj, name))
    }

    pub fn set_field_object(&mut self, obj: ObjId, name: &str, value: Option<ObjId>) {
        self.state
            .set_named_field(obj, name, crate::state::obj_to_slot(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_kinds() {
        assert_eq!(parameter_kinds("()V"), Vec::<char>::new());
        assert_eq!(parameter_kinds("(II)I"), vec!['I', 'I']);
        assert_eq!(
            parameter_kinds("(ILjava/lang/String;[J[[Ljava/lang/Object;Z)V"),
            vec!['I', 'L', '[', '[', 'Z']
        );
        assert!(parameter_kinds("garbage").is_empty());
    }

    #[test]
    fn test_slots() {
        assert_eq!(i32::from_slot((-5i32).into_slot()), -5);
        assert_eq!(i8::from_slot((-1i8).into_slot()), -1);
        assert_eq!((-1i8).into_slot(), 0xFF);
        assert_eq!(f32::from_slot(1.5f32.into_slot()), 1.5);
        assert_eq!(f64::from_slot((-0.0f64).into_slot()).to_bits(), (-0.0f64).to_bits());
    }
}
