//! Raw function-table access

/// Fetch an entry from the environment's function table.
///
/// Expands to a `JniResult` holding the function pointer, so a null slot
/// becomes `JniError::MissingEntryPoint` instead of a crash.
macro_rules! jni_entry {
    ($env:expr, $name:ident) => {
        $crate::macros::entry(
            // SAFETY: `$env` is a live JNIEnv pointer owned by an `Env`.
            unsafe { (**$env).$name },
            stringify!($name),
        )
    };
}

/// Fetch an entry from the VM's invocation table.
macro_rules! vm_entry {
    ($vm:expr, $name:ident) => {
        $crate::macros::entry(
            // SAFETY: `$vm` is a live JavaVM pointer owned by a `JavaVm`.
            unsafe { (**$vm).$name },
            stringify!($name),
        )
    };
}

pub(crate) use jni_entry;
pub(crate) use vm_entry;

#[inline]
pub(crate) fn entry<F>(slot: Option<F>, name: &'static str) -> crate::JniResult<F> {
    slot.ok_or(crate::JniError::MissingEntryPoint(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JniError;

    #[test]
    fn test_missing_entry_point() {
        let err = entry::<fn()>(None, "GetVersion").unwrap_err();
        assert_eq!(err, JniError::MissingEntryPoint("GetVersion"));
    }

    #[test]
    fn test_present_entry_point() {
        fn noop() {}
        assert!(entry(Some(noop as fn()), "GetVersion").is_ok());
    }
}
