//! Performance benchmarks for the media path

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use sounddrift::audio::{JitterQueue, Volume, apply_volume, is_silent};

/// One 8 ms datagram at 44.1 kHz stereo
const DATAGRAM_BYTES: usize = 1408;

fn datagram() -> Vec<u8> {
    (0..DATAGRAM_BYTES / 2)
        .flat_map(|i| ((i as i16).wrapping_mul(37)).to_le_bytes())
        .collect()
}

fn volume_scaling(c: &mut Criterion) {
    let pcm = datagram();

    c.bench_function("apply_volume_half", |b| {
        let volume = Volume::new(0.5);
        b.iter(|| apply_volume(black_box(&pcm), volume));
    });

    c.bench_function("apply_volume_unity", |b| {
        b.iter(|| apply_volume(black_box(&pcm), Volume::UNITY));
    });
}

fn jitter_queue(c: &mut Criterion) {
    c.bench_function("jitter_push_pop", |b| {
        let mut queue = JitterQueue::new(50);
        let pcm = datagram();

        b.iter(|| {
            queue.push(black_box(pcm.clone()));
            black_box(queue.pop())
        });
    });

    c.bench_function("jitter_push_full", |b| {
        let mut queue = JitterQueue::new(50);
        for _ in 0..50 {
            queue.push(vec![0u8; DATAGRAM_BYTES]);
        }

        b.iter(|| black_box(queue.push(vec![0u8; DATAGRAM_BYTES])));
    });
}

fn silence_check(c: &mut Criterion) {
    let silent = vec![0u8; DATAGRAM_BYTES];
    c.bench_function("is_silent_full_scan", |b| {
        b.iter(|| is_silent(black_box(&silent)));
    });
}

criterion_group!(benches, volume_scaling, jitter_queue, silence_check);
criterion_main!(benches);
