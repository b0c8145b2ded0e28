//! Codec benchmarks
//!
//! Run with:
//!   cargo bench --bench codec_benches
//!
//! Covers the per-attempt work outside the network: encoding a request,
//! decoding a reply and mapping it into a snapshot.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use venus_udp::{
    build_set_mode, decode, AttemptOutcome, Command, ManualSlot, ModeIntent, ProtocolSchema,
    Snapshot, TimeOfDay, Weekday, ES_GET_MODE,
};

const LEGACY_STATUS: &[u8] = br#"{"id":2,"src":"VenusE-acf3c1","result":{"id":0,"soc":64,"charg_flag":true,"dischrg_flag":true,"temp":23.5,"voltage":5312,"current":210,"power":-1115,"rated_capacity":5120}}"#;
const UNIFIED_MODE: &[u8] = br#"{"id":1,"src":"VenusE-acf3c1","result":{"id":0,"mode":"Auto","bat_soc":81,"bat_temp":24.0,"bat_voltage":53.12,"bat_current":2.1,"bat_power":-350,"ongrid_power":-120,"load_power":230,"pv_power":0,"charge_power":350,"discharge_power":0}}"#;
const PARSE_ERROR: &[u8] = br#"{"id":1,"src":"VenusE-acf3c1","error":{"code":-32700,"message":"Parse error"}}"#;

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    group.bench_function("query", |b| {
        b.iter(|| Command::query(black_box(42), ES_GET_MODE).to_bytes())
    });

    let slot = ManualSlot::new(3)
        .window(TimeOfDay::new(17, 0).unwrap(), TimeOfDay::new(22, 0).unwrap())
        .days(vec![Weekday::Monday, Weekday::Friday])
        .power(2000);
    let intent = ModeIntent::Manual(slot);
    group.bench_function("set_mode_manual", |b| {
        b.iter(|| build_set_mode(black_box(42), &intent).unwrap().to_bytes())
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    group.bench_function("legacy_status", |b| b.iter(|| decode(black_box(LEGACY_STATUS))));
    group.bench_function("unified_mode", |b| b.iter(|| decode(black_box(UNIFIED_MODE))));
    group.bench_function("parse_error", |b| b.iter(|| decode(black_box(PARSE_ERROR))));
    group.bench_function("garbage", |b| b.iter(|| decode(black_box(b"\x00\x01{\"id\""))));

    group.finish();
}

fn bench_snapshot_mapping(c: &mut Criterion) {
    let schema = ProtocolSchema::unified();
    let payload = match decode(UNIFIED_MODE) {
        AttemptOutcome::Success(payload) => payload,
        other => panic!("fixture does not decode: {other:?}"),
    };

    c.bench_function("extract_unified", |b| {
        b.iter(|| {
            let mut snapshot = Snapshot::default();
            for query in schema.queries() {
                query.extract(black_box(&payload), &mut snapshot);
            }
            snapshot
        })
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_snapshot_mapping);
criterion_main!(benches);
