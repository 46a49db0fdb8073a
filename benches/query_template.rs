use criterion::{Criterion, criterion_group, criterion_main};
use dnsstress::dns::DNSPacket;
use dnsstress::query::QueryTemplate;
use dnsstress::stats::{AggregateState, StatsDelta};
use rand::{SeedableRng, rngs::StdRng};
use std::hint::black_box;
use std::time::{Duration, Instant};

fn bench_query_template(c: &mut Criterion) {
    c.bench_function("build query template", |b| {
        b.iter(|| QueryTemplate::new(black_box("www.example.com"), true, 1).unwrap());
    });

    let mut template = QueryTemplate::new("www.example.com", true, 1).unwrap();
    let mut rng = StdRng::from_os_rng();
    c.bench_function("randomize transaction id", |b| {
        b.iter(|| black_box(template.randomize_id(&mut rng)));
    });

    let mut reply = template.payload().to_vec();
    reply[2] |= 0x80;
    c.bench_function("check reply header", |b| {
        b.iter(|| {
            let header = DNSPacket::parse_header(black_box(&reply)).unwrap();
            black_box(template.matches(&header))
        });
    });
}

fn bench_aggregation(c: &mut Criterion) {
    let delta = StatsDelta {
        sent: 5,
        errors: 1,
        bytes_sent: 5 * 33,
        elapsed: Duration::from_millis(12),
        max_latency: Duration::from_millis(4),
        is_flush_trigger: false,
    };
    c.bench_function("accumulate 1000 deltas and flush", |b| {
        b.iter(|| {
            let start = Instant::now();
            let mut state = AggregateState::new(start);
            for _ in 0..1000 {
                state.accumulate(black_box(&delta));
            }
            black_box(state.flush(start + Duration::from_secs(1), true))
        });
    });
}

criterion_group!(benches, bench_query_template, bench_aggregation);
criterion_main!(benches);
