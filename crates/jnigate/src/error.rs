//! Error types for gated JNI calls

use std::fmt;

use crate::sys::jint;

/// Result type for every gated JNI operation
pub type JniResult<T> = Result<T, JniError>;

/// What a resolution call was looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// `FindClass`
    Class,
    /// `GetMethodID`
    Method,
    /// `GetStaticMethodID`
    StaticMethod,
    /// `GetFieldID`
    Field,
    /// `GetStaticFieldID`
    StaticField,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MemberKind::Class => "class",
            MemberKind::Method => "method",
            MemberKind::StaticMethod => "static method",
            MemberKind::Field => "field",
            MemberKind::StaticField => "static field",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the wrapper.
///
/// None of these are transient. In particular, after a
/// [`JniError::ForeignException`] the Java exception is still pending on the
/// environment: calling into the runtime again without clearing it is
/// undefined behavior per the JNI contract. Every gated call in this crate
/// refuses to do so and returns `ForeignException` again instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JniError {
    /// A Java exception is pending after (or before) the named call
    #[error("Java exception pending at {call}")]
    ForeignException {
        /// Raw entry point that observed the exception
        call: &'static str,
    },

    /// A class, method or field could not be resolved
    #[error("Could not resolve {kind} `{}`{}", member(.name, .signature), blocked_suffix(.blocked))]
    Resolution {
        /// What was being looked up
        kind: MemberKind,
        /// Class name or member name as passed in
        name: String,
        /// Member signature (empty for classes)
        signature: String,
        /// The lookup was not issued because an exception was already pending
        blocked: bool,
    },

    /// The runtime could not allocate the requested reference or object
    #[error("Out of resources in {call}")]
    OutOfResources {
        /// Raw entry point that returned null
        call: &'static str,
    },

    /// Text could not be converted to or from the VM's modified UTF-8
    #[error("Invalid modified UTF-8 at {call}")]
    Encoding {
        /// Raw entry point the text was passed to or read from
        call: &'static str,
    },

    /// The function table has no entry for the named function
    #[error("JNI entry point missing: {0}")]
    MissingEntryPoint(&'static str),

    /// A raw pointer handed to the wrapper was null
    #[error("Null {0} pointer")]
    NullHandle(&'static str),

    /// The current thread is not attached to the VM
    #[error("Current thread is not attached to the Java VM")]
    Detached,

    /// The VM does not support the requested interface version
    #[error("JNI version {0:#x} not supported")]
    UnsupportedVersion(jint),

    /// A raw call returned a non-OK status code
    #[error("{call} failed with JNI status {code}")]
    Call {
        /// Raw entry point
        call: &'static str,
        /// Status returned by the VM
        code: jint,
    },

    /// A different VM was already installed for this process
    #[error("A different Java VM is already installed")]
    VmAlreadyInstalled,
}

fn member(name: &str, signature: &str) -> String {
    if signature.is_empty() {
        name.to_string()
    } else {
        format!("{name} {signature}")
    }
}

fn blocked_suffix(blocked: &bool) -> &'static str {
    if *blocked {
        " (blocked by pending exception)"
    } else {
        ""
    }
}

impl JniError {
    /// True if a Java exception is pending on the environment
    pub fn is_foreign_exception(&self) -> bool {
        matches!(self, JniError::ForeignException { .. })
    }

    /// True for failed class/method/field lookups
    pub fn is_resolution(&self) -> bool {
        matches!(self, JniError::Resolution { .. })
    }

    pub(crate) fn resolution(
        kind: MemberKind,
        name: &str,
        signature: &str,
        blocked: bool,
    ) -> Self {
        JniError::Resolution {
            kind,
            name: name.to_string(),
            signature: signature.to_string(),
            blocked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_display() {
        let err = JniError::resolution(MemberKind::Method, "length", "()I", false);
        assert_eq!(err.to_string(), "Could not resolve method `length ()I`");

        let err = JniError::resolution(MemberKind::Class, "java/lang/Nope", "", true);
        assert_eq!(
            err.to_string(),
            "Could not resolve class `java/lang/Nope` (blocked by pending exception)"
        );
        assert!(err.is_resolution());
        assert!(!err.is_foreign_exception());
    }

    #[test]
    fn test_foreign_exception_display() {
        let err = JniError::ForeignException {
            call: "CallIntMethodA",
        };
        assert_eq!(err.to_string(), "Java exception pending at CallIntMethodA");
        assert!(err.is_foreign_exception());
    }

    #[test]
    fn test_status_display() {
        let err = JniError::Call {
            call: "AttachCurrentThread",
            code: -1,
        };
        assert!(err.to_string().contains("AttachCurrentThread"));
        assert_eq!(
            JniError::UnsupportedVersion(0x10008).to_string(),
            "JNI version 0x10008 not supported"
        );
    }
}
