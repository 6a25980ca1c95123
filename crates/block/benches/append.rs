//! Append hot-path benchmark: one row across a mixed column set.

use chrono::Utc;
use criterion::{Criterion, criterion_group, criterion_main};
use uuid::Uuid;

use chfan_block::types::{DateTime64, Precision, UInt256};
use chfan_block::{Batch, Row, RowShape};

struct Event {
    ts: chrono::DateTime<Utc>,
    ts6: DateTime64,
    foo: String,
    bar: u8,
    long: UInt256,
    id: Uuid,
}

impl Row for Event {
    fn shape() -> RowShape<Self> {
        RowShape::builder()
            .column("Ts", |r: &Event| &r.ts)
            .column("Ts6", |r: &Event| &r.ts6)
            .column("Foo", |r: &Event| &r.foo)
            .column("Bar", |r: &Event| &r.bar)
            .column("Long", |r: &Event| &r.long)
            .column("ID", |r: &Event| &r.id)
            .build()
    }
}

fn bench_append(c: &mut Criterion) {
    let now = Utc::now();
    let row = Event {
        ts: now,
        ts6: DateTime64::from_time(now, Precision::MICRO),
        foo: "zmaXdOHlpGFXdiwyTVSstdNJIBmYehAJ".into(),
        bar: 42,
        long: UInt256::from(u64::MAX),
        id: Uuid::new_v4(),
    };
    let mut batch = Batch::<Event>::new().unwrap();

    c.bench_function("batch_append", |b| {
        b.iter(|| {
            batch.append(std::hint::black_box(&row));
            if batch.rows() >= 64 * 1024 {
                batch.reset();
            }
        })
    });
}

criterion_group!(benches, bench_append);
criterion_main!(benches);
