use chrono::{TimeZone, Utc};
use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use feedline::{
    ContentId, Cursor, Direction, FeedQuery, FeedReader, MemoryStore, PageRequest, Paginator,
    UserId,
};
use std::sync::Arc;
use tokio::runtime::Builder;

// Rows in the benchmark collection.
const TOTAL_ITEMS: u64 = 10_000;

// Items per page.
const PAGE_SIZE: usize = 50;

fn seeded() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for i in 0..TOTAL_ITEMS {
        // Four posts per microsecond exercises the tie-break
        let at = Utc
            .timestamp_micros(1_700_000_000_000_000 + (i / 4) as i64)
            .single()
            .unwrap_or_default();
        store.insert_at(UserId(i % 97), format!("post {i}"), at);
    }
    store
}

fn bench_cursor_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("cursor");
    group.throughput(Throughput::Elements(1));

    let cursor = Cursor::new(1_700_000_000_123_456, ContentId(987_654_321), Direction::Forward);
    let token = cursor.encode();

    group.bench_function("encode", |b| b.iter(|| black_box(black_box(&cursor).encode())));
    group.bench_function("decode", |b| {
        b.iter(|| black_box(Cursor::decode(black_box(&token))))
    });

    group.finish();
}

fn bench_paging(c: &mut Criterion) {
    let runtime = Builder::new_multi_thread().enable_all().build().unwrap();
    let store = seeded();
    let paginator = Paginator::new(Arc::clone(&store));
    let reader = FeedReader::new(Arc::clone(&store));

    let mut group = c.benchmark_group("paging");
    group.throughput(Throughput::Elements(PAGE_SIZE as u64));

    group.bench_function(format!("cursor/first/{PAGE_SIZE}"), |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(
                paginator
                    .page_cursor(&FeedQuery::Global, None, PAGE_SIZE)
                    .await
                    .unwrap(),
            )
        });
    });

    // Deep in the collection a cursor seek costs the same as the first page
    let deep = Cursor::new(1_700_000_000_000_000 + 2_000, ContentId(8_000), Direction::Forward);
    group.bench_function(format!("cursor/deep/{PAGE_SIZE}"), |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(
                paginator
                    .page_cursor(&FeedQuery::Global, Some(&deep), PAGE_SIZE)
                    .await
                    .unwrap(),
            )
        });
    });

    // ...whereas an offset page walks past every skipped row
    let deep_page = (TOTAL_ITEMS as usize / PAGE_SIZE) - 1;
    group.bench_function(format!("offset/deep/{PAGE_SIZE}"), |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(
                paginator
                    .page_offset(&FeedQuery::Global, deep_page, PAGE_SIZE)
                    .await
                    .unwrap(),
            )
        });
    });

    group.bench_function(format!("hydrated/{PAGE_SIZE}"), |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(
                reader
                    .read(&FeedQuery::Global, PageRequest::first(PAGE_SIZE), Some(UserId(1)))
                    .await
                    .unwrap(),
            )
        });
    });

    group.finish();
}

criterion_group!(benches, bench_cursor_codec, bench_paging);
criterion_main!(benches);
