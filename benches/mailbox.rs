use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shm_chat::shm::{Ownership, SharedRegion};
use shm_chat::Mailbox;

fn mailbox_pair(name: &str) -> (Mailbox, Mailbox) {
    let inbox = SharedRegion::open_or_create(name, 4096, Ownership::Owner).unwrap();
    let outbox = SharedRegion::open_or_create(name, 4096, Ownership::Attached).unwrap();
    let inbox = Mailbox::from_region(inbox).unwrap();
    inbox.clear();
    (inbox, Mailbox::from_region(outbox).unwrap())
}

fn bench_write_drain(c: &mut Criterion) {
    let (inbox, outbox) = mailbox_pair(&format!("/shm_chat_bench_{}", std::process::id()));

    c.bench_function("write_drain_short", |b| {
        b.iter(|| {
            outbox.write(black_box("hello\n")).unwrap();
            black_box(inbox.drain())
        })
    });

    let long = "x".repeat(4000);
    c.bench_function("write_drain_4k", |b| {
        b.iter(|| {
            outbox.write(black_box(&long)).unwrap();
            black_box(inbox.drain())
        })
    });
}

criterion_group!(benches, bench_write_drain);
criterion_main!(benches);
