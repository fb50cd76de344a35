//! End-to-end dispatch through the exception gate
//!
//! Drives the wrapper against the mock VM the way a native method would:
//! resolve, box arguments, dispatch, and react to Java exceptions.
//!
//! # Running Tests
//! ```bash
//! cargo test -p jnigate --test end_to_end
//! ```

use jnigate::{jargs, Env, JString, JniError, JniResult, Object};
use jnigate_mock::{ClassBuilder, MockVm, Outcome};

fn runtime_env(mock: &MockVm) -> Env<'_> {
    unsafe { Env::from_raw(mock.runtime_env()) }.unwrap()
}

// ===== Successful dispatch =====

#[test]
fn test_string_length() {
    let mock = MockVm::new();
    let env = runtime_env(&mock);

    let string = env.find_class("java/lang/String").unwrap();
    let length = env.get_method_id(string, "length", "()I").unwrap();
    let text = env.new_string("twelve chars").unwrap();

    let len = env.call_int_method(text, length, &jargs![]).unwrap();
    assert_eq!(len, 12);
    assert!(!env.exception_check().unwrap());
}

#[test]
fn test_generic_and_named_paths_agree() {
    let mock = MockVm::new();
    let env = runtime_env(&mock);

    let math = env.find_class("java/lang/Math").unwrap();
    let max = env.get_static_method_id(math, "max", "(II)I").unwrap();

    let named = env.call_static_int_method(math, max, &jargs![-4, 17]).unwrap();
    let generic: i32 = env.call_static_method(math, max, &jargs![-4, 17]).unwrap();
    assert_eq!(named, generic);
    assert_eq!(named, 17);
}

#[test]
fn test_argument_order_is_preserved() {
    let mock = MockVm::new();
    mock.define_class(ClassBuilder::new("demo/Args").static_method(
        "first",
        "(IJD)J",
        |ctx| Outcome::long(ctx.int(0) as i64 * 1_000 + ctx.long(1) * 10 + ctx.double(2) as i64),
    ));
    let env = runtime_env(&mock);

    let class = env.find_class("demo/Args").unwrap();
    let first = env.get_static_method_id(class, "first", "(IJD)J").unwrap();
    let result = env
        .call_static_long_method(class, first, &jargs![3, 2i64, 1.0f64])
        .unwrap();
    assert_eq!(result, 3_021);
}

fn helper_that_propagates(env: &Env<'_>, text: &str) -> JniResult<i32> {
    let integer = env.find_class("java/lang/Integer")?;
    let parse = env.get_static_method_id(integer, "parseInt", "(Ljava/lang/String;)I")?;
    let text = env.new_string(text)?;
    env.call_static_int_method(integer, parse, &jargs![text])
}

#[test]
fn test_question_mark_propagation() {
    let mock = MockVm::new();
    let env = runtime_env(&mock);

    assert_eq!(helper_that_propagates(&env, "1234").unwrap(), 1234);
    let err = helper_that_propagates(&env, "12x").unwrap_err();
    assert!(err.is_foreign_exception());
    env.exception_clear().unwrap();
}

// ===== Foreign exceptions =====

#[test]
fn test_throwing_call_then_unrelated_call_is_rejected() {
    let mock = MockVm::new();
    let env = runtime_env(&mock);

    let string = env.find_class("java/lang/String").unwrap();
    let char_at = env.get_method_id(string, "charAt", "(I)C").unwrap();
    let length = env.get_method_id(string, "length", "()I").unwrap();
    let text = env.new_string("abc").unwrap();

    let err = env.call_char_method(text, char_at, &jargs![99]).unwrap_err();
    assert_eq!(err, JniError::ForeignException { call: "CallCharMethodA" });

    // Unrelated call on the same env: rejected, never issued
    let err = env.call_int_method(text, length, &jargs![]).unwrap_err();
    assert!(err.is_foreign_exception());
    let err = env.find_class("java/lang/Math").unwrap_err();
    assert!(matches!(err, JniError::Resolution { blocked: true, .. }));
    assert_eq!(mock.stats().calls_with_pending_exception, 0);

    // The exception is still there and is the one the VM raised
    let exception = env.exception_occurred().unwrap().unwrap();
    env.exception_clear().unwrap();

    let throwable = env.find_class("java/lang/Throwable").unwrap();
    let get_message = env
        .get_method_id(throwable, "getMessage", "()Ljava/lang/String;")
        .unwrap();
    let message: Option<&JString> = env.call_method(exception, get_message, &[]).unwrap();
    assert_eq!(env.get_string(message.unwrap()).unwrap(), "index 99, length 3");

    assert_eq!(env.call_int_method(text, length, &[]).unwrap(), 3);
}

#[test]
fn test_throw_new_and_catch() {
    let mock = MockVm::new();
    let env = runtime_env(&mock);

    let illegal_state = env.find_class("java/lang/IllegalStateException").unwrap();
    env.throw_new(illegal_state, "region is not ready").unwrap();

    let taken = env.exception_take().unwrap().unwrap();
    let throwable = env.find_class("java/lang/Throwable").unwrap();
    let get_message = env
        .get_method_id(throwable, "getMessage", "()Ljava/lang/String;")
        .unwrap();
    let message = env.call_object_method(taken, get_message, &[]).unwrap().unwrap();
    let message: &JString = unsafe { message.cast_unchecked() };
    assert_eq!(env.get_string(message).unwrap(), "region is not ready");
}

// ===== Building Java error objects =====

/// Build a Java error object carrying a reason code and message, the way a
/// native layer reports failures back to its Java callers.
fn new_region_error<'a>(env: &Env<'a>, reason: i32, message: &str) -> JniResult<&'a Object> {
    let class = env.find_class("demo/RegionError")?;
    let ctor = env.get_method_id(class, "<init>", "(ILjava/lang/String;)V")?;
    let message = env.new_string(message)?;
    env.new_object(class, ctor, &jargs![reason, message])
}

#[test]
fn test_construct_error_object() {
    let mock = MockVm::new();
    mock.define_class(
        ClassBuilder::new("demo/RegionError")
            .field("reason", "I")
            .field("message", "Ljava/lang/String;")
            .constructor("(ILjava/lang/String;)V", |ctx| {
                let this = ctx.this().unwrap();
                let (reason, message) = (ctx.int(0), ctx.object(1));
                ctx.set_field(this, "reason", reason);
                ctx.set_field_object(this, "message", message);
                Outcome::Void
            }),
    );
    let env = runtime_env(&mock);

    let error = new_region_error(&env, 3, "tile limit exceeded").unwrap();

    let class = env.find_class("demo/RegionError").unwrap();
    let reason = env.get_field_id(class, "reason", "I").unwrap();
    let message = env.get_field_id(class, "message", "Ljava/lang/String;").unwrap();
    assert_eq!(env.get_field::<i32>(error, reason).unwrap(), 3);
    let message: Option<&JString> = env.get_field(error, message).unwrap();
    assert_eq!(env.get_string(message.unwrap()).unwrap(), "tile limit exceeded");
}

#[test]
fn test_missing_constructor_is_resolution_error() {
    let mock = MockVm::new();
    mock.define_class(ClassBuilder::new("demo/RegionError"));
    let env = runtime_env(&mock);

    let err = new_region_error(&env, 1, "x").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Could not resolve method `<init> (ILjava/lang/String;)V`"
    );
    assert!(env.exception_check().unwrap());
    env.exception_clear().unwrap();
}
