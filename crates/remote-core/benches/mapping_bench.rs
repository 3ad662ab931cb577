//! Criterion benchmarks for the viewer and agent hot paths.
//!
//! Every pointer move goes through [`CanvasGeometry::map_to_remote`] and every
//! typed character through the key tables, so both should stay in the
//! nanosecond range.
//!
//! Run with:
//! ```bash
//! cargo bench --package remote-core --bench mapping_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use remote_core::keymap::{char_to_vk, key_name_to_vk, vk_to_keysym};
use remote_core::{decode_message, CanvasGeometry};

fn bench_map_to_remote(c: &mut Criterion) {
    let geometry = CanvasGeometry {
        origin_x: 12.0,
        origin_y: 40.0,
        scale: 0.66,
        rendered_width: 1920,
        rendered_height: 1080,
        remote_width: 3840,
        remote_height: 2160,
    };

    c.bench_function("map_to_remote", |b| {
        b.iter(|| geometry.map_to_remote(black_box(640.5), black_box(377.25)))
    });
}

fn bench_key_tables(c: &mut Criterion) {
    c.bench_function("key_name_to_vk/named", |b| {
        b.iter(|| key_name_to_vk(black_box("ArrowRight")))
    });
    c.bench_function("key_name_to_vk/char", |b| {
        b.iter(|| key_name_to_vk(black_box("q")))
    });
    c.bench_function("char_to_vk+vk_to_keysym", |b| {
        b.iter(|| char_to_vk(black_box('?')).and_then(|k| vk_to_keysym(k.vk)))
    });
}

fn bench_decode_action(c: &mut Criterion) {
    let text = r#"{"type":"uem_remote_action","deviceId":"dev-1","action":"remote_mouse_move","params":{"x":100,"y":200},"timestamp":1700000000000}"#;
    c.bench_function("decode_message/remote_mouse_move", |b| {
        b.iter(|| decode_message(black_box(text)))
    });
}

criterion_group!(benches, bench_map_to_remote, bench_key_tables, bench_decode_action);
criterion_main!(benches);
