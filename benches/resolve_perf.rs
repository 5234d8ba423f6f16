use chat_forensics::model::types::{ConversationKey, Message};
use chat_forensics::search::engine::SearchEngine;
use chat_forensics::search::query::{FilterParams, Scope};
use chat_forensics::search::resolve::resolve;
use chat_forensics::store::MessageStore;
use chrono::{Duration, NaiveDate};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

const WORDS: [&str; 8] = [
    "meet", "tonight", "package", "address", "money", "phone", "later", "photo",
];

/// `conversations` two-party chats plus a few groups, `per_conversation` messages
/// each, spread one hour apart starting 2024-01-01.
fn synthetic_store(conversations: usize, per_conversation: usize) -> MessageStore {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    let mut store = MessageStore::new();
    for c in 0..conversations {
        let (a, b) = (format!("user{c:04}"), format!("peer{c:04}"));
        let key = if c % 10 == 9 {
            ConversationKey::group(format!("group{c:04}"))
        } else {
            ConversationKey::direct(a.clone(), b.clone())
        };
        for i in 0..per_conversation {
            let (sender, receiver) = if i % 2 == 0 { (&a, &b) } else { (&b, &a) };
            store.insert(
                key.clone(),
                Message {
                    msg_id: format!("{c}-{i}"),
                    sender: sender.clone(),
                    receiver: if key.is_group() {
                        String::new()
                    } else {
                        receiver.clone()
                    },
                    sent_at: Some(start + Duration::hours((c + i * 7) as i64)),
                    body: format!(
                        "{} {} number {i}",
                        WORDS[i % WORDS.len()],
                        WORDS[(i + c) % WORDS.len()]
                    ),
                    ..Default::default()
                },
            );
        }
    }
    store.finalize();
    store
}

fn february() -> FilterParams {
    FilterParams::new().dates(
        NaiveDate::from_ymd_opt(2024, 2, 1),
        NaiveDate::from_ymd_opt(2024, 2, 29),
    )
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_scan");
    for size in [100usize, 500] {
        let store = synthetic_store(size, 100);
        group.bench_with_input(BenchmarkId::from_parameter(size), &store, |b, store| {
            let params = february().with_text("package");
            b.iter(|| black_box(resolve(store, &params)));
        });
    }
    group.finish();
}

fn bench_cached(c: &mut Criterion) {
    let store = synthetic_store(500, 100);
    let engine = SearchEngine::new(200);
    engine.prime(&store);
    let params = february().with_text("package");
    engine.resolve(&store, &params);

    c.bench_function("resolve_full_cache_hit", |b| {
        b.iter(|| black_box(engine.resolve(&store, &params)));
    });

    // Same date window, new text each time: only the refilter runs.
    let texts: Vec<String> = (0..64).map(|i| format!("number {i}")).collect();
    c.bench_function("resolve_date_cache_refilter", |b| {
        let mut i = 0usize;
        b.iter(|| {
            engine.invalidate();
            engine.resolve(&store, &february());
            let params = february().with_text(&texts[i % texts.len()]);
            i += 1;
            black_box(engine.resolve(&store, &params))
        });
    });

    c.bench_function("clear_filters_snapshot", |b| {
        b.iter(|| black_box(engine.clear_filters(&store)));
    });
}

fn bench_whole_word_scoped(c: &mut Criterion) {
    let store = synthetic_store(500, 100);
    let params = FilterParams::new()
        .scope(Scope::Conversation(ConversationKey::direct("user0001", "peer0001")))
        .with_text("meet")
        .whole_word(true);
    c.bench_function("resolve_scoped_whole_word", |b| {
        b.iter(|| black_box(resolve(&store, &params)));
    });
}

criterion_group!(benches, bench_scan, bench_cached, bench_whole_word_scoped);
criterion_main!(benches);
