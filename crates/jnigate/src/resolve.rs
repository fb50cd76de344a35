//! Handle resolution: classes, method ids and field ids by name
//!
//! Names and signatures are passed through in the VM's own encoding
//! (`java/lang/String`, `(ILjava/lang/String;)V`) without validation. A
//! malformed string simply fails to resolve.

use std::ffi::CString;

use crate::env::Env;
use crate::error::{JniError, JniResult, MemberKind};
use crate::gate;
use crate::macros::jni_entry;
use crate::refs::{Class, FieldId, MethodId, Reference};

fn c_string(kind: MemberKind, name: &str, signature: &str, text: &str) -> JniResult<CString> {
    CString::new(text).map_err(|_| JniError::resolution(kind, name, signature, false))
}

macro_rules! member_lookup {
    ($(#[$meta:meta])* $fn_name:ident, $entry:ident, $kind:expr, $id:ident, $raw:ty) => {
        $(#[$meta])*
        pub fn $fn_name<'c>(
            &self,
            class: &'c Class,
            name: &str,
            signature: &str,
        ) -> JniResult<&'c $id> {
            let fail = |blocked| JniError::resolution($kind, name, signature, blocked);
            let c_name = c_string($kind, name, signature, name)?;
            let c_sig = c_string($kind, name, signature, signature)?;

            gate::ensure_resolvable(self, fail)?;
            let lookup = jni_entry!(self.as_raw(), $entry)?;
            let raw: $raw = unsafe {
                lookup(self.as_raw(), class.as_raw(), c_name.as_ptr(), c_sig.as_ptr())
            };
            let id = gate::check_resolved(raw, fail)?;
            Ok(unsafe { &*(id.as_ptr() as *const $id) })
        }
    };
}

impl<'a> Env<'a> {
    /// Look up a class by its slash-separated binary name, e.g.
    /// `java/lang/String`.
    pub fn find_class(&self, name: &str) -> JniResult<&'a Class> {
        let fail = |blocked| JniError::resolution(MemberKind::Class, name, "", blocked);
        let c_name = c_string(MemberKind::Class, name, "", name)?;

        gate::ensure_resolvable(self, fail)?;
        let find_class = jni_entry!(self.as_raw(), FindClass)?;
        let raw = unsafe { find_class(self.as_raw(), c_name.as_ptr()) };
        let class = gate::check_resolved(raw, fail)?;
        Ok(unsafe { &*(class.as_ptr() as *const Class) })
    }

    member_lookup!(
        /// Resolve an instance method (or constructor, named `<init>`).
        ///
        /// The id stays valid while `class` is loaded; it borrows for as long
        /// as the class reference it was resolved from.
        get_method_id, GetMethodID, MemberKind::Method, MethodId, crate::sys::jmethodID
    );

    member_lookup!(
        /// Resolve a static method
        get_static_method_id, GetStaticMethodID, MemberKind::StaticMethod, MethodId,
        crate::sys::jmethodID
    );

    member_lookup!(
        /// Resolve an instance field
        get_field_id, GetFieldID, MemberKind::Field, FieldId, crate::sys::jfieldID
    );

    member_lookup!(
        /// Resolve a static field
        get_static_field_id, GetStaticFieldID, MemberKind::StaticField, FieldId,
        crate::sys::jfieldID
    );
}
