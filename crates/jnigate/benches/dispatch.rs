use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use jnigate::{jargs, Env, JString};
use jnigate_mock::MockVm;

fn bench_static_calls(c: &mut Criterion) {
    let mock = MockVm::new();
    let env = unsafe { Env::from_raw(mock.runtime_env()) }.unwrap();
    let math = env.find_class("java/lang/Math").unwrap();
    let max_int = env.get_static_method_id(math, "max", "(II)I").unwrap();
    let max_long = env.get_static_method_id(math, "max", "(JJ)J").unwrap();
    let abs = env.get_static_method_id(math, "abs", "(D)D").unwrap();

    let mut group = c.benchmark_group("static_calls");
    group.bench_function("int", |b| {
        b.iter(|| {
            env.call_static_int_method(math, max_int, &jargs![black_box(3), black_box(7)])
                .unwrap()
        });
    });
    group.bench_function("long", |b| {
        b.iter(|| {
            env.call_static_long_method(math, max_long, &jargs![black_box(3i64), 7i64])
                .unwrap()
        });
    });
    group.bench_function("double_generic", |b| {
        b.iter(|| {
            let value: f64 = env.call_static_method(math, abs, &jargs![black_box(-2.5)]).unwrap();
            value
        });
    });
    group.finish();
}

fn bench_instance_calls(c: &mut Criterion) {
    let mock = MockVm::new();
    let env = unsafe { Env::from_raw(mock.runtime_env()) }.unwrap();
    let string = env.find_class("java/lang/String").unwrap();
    let length = env.get_method_id(string, "length", "()I").unwrap();
    let upper = env
        .get_method_id(string, "toUpperCase", "()Ljava/lang/String;")
        .unwrap();

    let mut group = c.benchmark_group("instance_calls");
    for text in ["", "short", "a considerably longer string value"] {
        let s = env.new_string(text).unwrap();
        group.bench_with_input(BenchmarkId::new("length", text.len()), &s, |b, s| {
            b.iter(|| env.call_int_method(black_box(*s), length, &[]).unwrap());
        });
    }
    let s = env.new_string("mixed Case").unwrap();
    group.bench_function("object_result", |b| {
        b.iter(|| {
            let result: Option<&JString> = env.call_method(black_box(s), upper, &[]).unwrap();
            result.is_some()
        });
    });
    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mock = MockVm::new();
    let env = unsafe { Env::from_raw(mock.runtime_env()) }.unwrap();

    c.bench_function("resolve_method", |b| {
        b.iter(|| {
            let class = env.find_class(black_box("java/lang/Integer")).unwrap();
            env.get_static_method_id(class, "parseInt", "(Ljava/lang/String;)I")
                .unwrap();
        });
    });
}

criterion_group!(benches, bench_static_calls, bench_instance_calls, bench_resolution);
criterion_main!(benches);
