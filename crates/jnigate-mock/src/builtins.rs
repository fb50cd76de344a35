//! The handful of `java.lang` classes every mock VM starts with

use crate::class::{CallContext, ClassBuilder, Outcome};
use crate::state::State;

const EXCEPTIONS: &[(&str, &str)] = &[
    ("java/lang/Exception", "java/lang/Throwable"),
    ("java/lang/RuntimeException", "java/lang/Exception"),
    ("java/lang/IllegalStateException", "java/lang/RuntimeException"),
    ("java/lang/IllegalArgumentException", "java/lang/RuntimeException"),
    ("java/lang/NumberFormatException", "java/lang/IllegalArgumentException"),
    ("java/lang/IndexOutOfBoundsException", "java/lang/RuntimeException"),
    ("java/lang/StringIndexOutOfBoundsException", "java/lang/IndexOutOfBoundsException"),
    ("java/lang/SecurityException", "java/lang/RuntimeException"),
    ("java/lang/Error", "java/lang/Throwable"),
    ("java/lang/OutOfMemoryError", "java/lang/Error"),
    ("java/lang/LinkageError", "java/lang/Error"),
    ("java/lang/NoClassDefFoundError", "java/lang/LinkageError"),
    ("java/lang/IncompatibleClassChangeError", "java/lang/LinkageError"),
    ("java/lang/NoSuchMethodError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/NoSuchFieldError", "java/lang/IncompatibleClassChangeError"),
];

fn this_string(ctx: &CallContext<'_>) -> String {
    ctx.this().and_then(|s| ctx.string(s)).unwrap_or_default()
}

fn this_int(ctx: &CallContext<'_>) -> i32 {
    ctx.this().map_or(0, |this| ctx.field(this, "value") as u32 as i32)
}

fn set_message(ctx: &mut CallContext<'_>, message: Option<crate::ObjId>) -> Outcome {
    if let Some(this) = ctx.this() {
        ctx.set_field_object(this, "detailMessage", message);
    }
    Outcome::Void
}

fn integer(ctx: &mut CallContext<'_>, value: i32) -> Outcome {
    let boxed = ctx.new_instance("java/lang/Integer");
    if let Some(boxed) = boxed {
        ctx.set_field(boxed, "value", value);
    }
    Outcome::Object(boxed)
}

fn parse_int(ctx: &CallContext<'_>, index: usize) -> Result<i32, Outcome> {
    let text = ctx.string_arg(index).unwrap_or_default();
    text.parse::<i32>().map_err(|_| {
        Outcome::throw(
            "java/lang/NumberFormatException",
            format!("For input string: \"{text}\""),
        )
    })
}

pub(crate) fn install(state: &mut State) {
    state.define(
        ClassBuilder::new("java/lang/Object")
            .constructor("()V", |_| Outcome::Void)
            .method("hashCode", "()I", |ctx| {
                Outcome::int(ctx.this().map_or(0, |o| o.0 as i32))
            }),
    );
    state.define(ClassBuilder::new("java/lang/Class"));

    state.define(
        ClassBuilder::new("java/lang/String")
            .method("length", "()I", |ctx| {
                Outcome::int(this_string(ctx).encode_utf16().count() as i32)
            })
            .method("isEmpty", "()Z", |ctx| Outcome::boolean(this_string(ctx).is_empty()))
            .method("charAt", "(I)C", |ctx| {
                let index = ctx.int(0);
                let text = this_string(ctx);
                let unit = usize::try_from(index)
                    .ok()
                    .and_then(|i| text.encode_utf16().nth(i));
                match unit {
                    Some(unit) => Outcome::char(unit),
                    None => Outcome::throw(
                        "java/lang/StringIndexOutOfBoundsException",
                        format!("index {index}, length {}", text.encode_utf16().count()),
                    ),
                }
            })
            .method("toUpperCase", "()Ljava/lang/String;", |ctx| {
                let upper = this_string(ctx).to_uppercase();
                Outcome::Object(Some(ctx.new_string(&upper)))
            }),
    );

    state.define(
        ClassBuilder::new("java/lang/Integer")
            .field("value", "I")
            .static_field("MAX_VALUE", "I", i32::MAX)
            .static_field("MIN_VALUE", "I", i32::MIN)
            .constructor("(I)V", |ctx| {
                let value = ctx.int(0);
                if let Some(this) = ctx.this() {
                    ctx.set_field(this, "value", value);
                }
                Outcome::Void
            })
            .constructor("(Ljava/lang/String;)V", |ctx| match parse_int(ctx, 0) {
                Ok(value) => {
                    if let Some(this) = ctx.this() {
                        ctx.set_field(this, "value", value);
                    }
                    Outcome::Void
                }
                Err(thrown) => thrown,
            })
            .method("intValue", "()I", |ctx| Outcome::int(this_int(ctx)))
            .method("byteValue", "()B", |ctx| Outcome::byte(this_int(ctx) as i8))
            .method("shortValue", "()S", |ctx| Outcome::short(this_int(ctx) as i16))
            .method("longValue", "()J", |ctx| Outcome::long(this_int(ctx) as i64))
            .method("doubleValue", "()D", |ctx| Outcome::double(this_int(ctx) as f64))
            .static_method("valueOf", "(I)Ljava/lang/Integer;", |ctx| {
                let value = ctx.int(0);
                integer(ctx, value)
            })
            .static_method("parseInt", "(Ljava/lang/String;)I", |ctx| {
                parse_int(ctx, 0).map_or_else(|thrown| thrown, Outcome::int)
            }),
    );

    state.define(
        ClassBuilder::new("java/lang/Math")
            .static_method("max", "(II)I", |ctx| Outcome::int(ctx.int(0).max(ctx.int(1))))
            .static_method("min", "(II)I", |ctx| Outcome::int(ctx.int(0).min(ctx.int(1))))
            .static_method("max", "(JJ)J", |ctx| Outcome::long(ctx.long(0).max(ctx.long(1))))
            .static_method("abs", "(F)F", |ctx| Outcome::float(ctx.float(0).abs()))
            .static_method("abs", "(D)D", |ctx| Outcome::double(ctx.double(0).abs())),
    );

    state.define(
        ClassBuilder::new("java/lang/System")
            .static_method("gc", "()V", |_| Outcome::Void)
            .static_method("exit", "(I)V", |ctx| {
                Outcome::throw(
                    "java/lang/SecurityException",
                    format!("exit({}) is not permitted", ctx.int(0)),
                )
            })
            .static_method(
                "getProperty",
                "(Ljava/lang/String;)Ljava/lang/String;",
                |ctx| {
                    let value = match ctx.string_arg(0).as_deref() {
                        Some("java.vm.name") => Some("jnigate-mock"),
                        Some("java.specification.version") => Some("1.6"),
                        _ => None,
                    };
                    Outcome::Object(value.map(|v| ctx.new_string(v)))
                },
            ),
    );

    state.define(
        ClassBuilder::new("java/lang/Throwable")
            .field("detailMessage", "Ljava/lang/String;")
            .constructor("()V", |ctx| set_message(ctx, None))
            .constructor("(Ljava/lang/String;)V", |ctx| {
                let message = ctx.object(0);
                set_message(ctx, message)
            })
            .method("getMessage", "()Ljava/lang/String;", |ctx| {
                let message = ctx
                    .this()
                    .and_then(|this| ctx.field_object(this, "detailMessage"));
                Outcome::Object(message)
            }),
    );

    for (name, superclass) in EXCEPTIONS {
        state.define(
            ClassBuilder::new(name)
                .extends(superclass)
                .constructor("()V", |ctx| set_message(ctx, None))
                .constructor("(Ljava/lang/String;)V", |ctx| {
                    let message = ctx.object(0);
                    set_message(ctx, message)
                }),
        );
    }
}
