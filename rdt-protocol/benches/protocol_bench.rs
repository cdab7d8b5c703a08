use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rdt_protocol::checksum;
use rdt_protocol::packet::{Packet, DEFAULT_PACKET_SIZE};
use rdt_protocol::{Framer, MessageFraming, ProtocolConfig, SeqNumber};

fn bench_checksum(c: &mut Criterion) {
    let mut packet = Packet::data(SeqNumber::new(1000), Bytes::from(vec![0xA5u8; 119]));
    let wire = packet.encode(DEFAULT_PACKET_SIZE).unwrap();

    let mut group = c.benchmark_group("checksum");
    group.throughput(Throughput::Bytes(wire.len() as u64));

    group.bench_function("compute", |b| {
        b.iter(|| black_box(checksum::compute(black_box(&wire))));
    });

    group.bench_function("verify", |b| {
        b.iter(|| black_box(checksum::verify(black_box(&wire))));
    });

    group.finish();
}

fn bench_packet_codec(c: &mut Criterion) {
    let payload = Bytes::from(vec![0u8; 119]);

    c.bench_function("packet_encode", |b| {
        b.iter(|| {
            let mut packet = Packet::data(SeqNumber::new(42), payload.clone());
            black_box(packet.encode(DEFAULT_PACKET_SIZE).unwrap());
        });
    });

    let wire = Packet::data(SeqNumber::new(42), payload.clone())
        .encode(DEFAULT_PACKET_SIZE)
        .unwrap();

    c.bench_function("packet_decode", |b| {
        b.iter(|| {
            let packet = Packet::decode(black_box(&wire)).unwrap();
            black_box(packet);
        });
    });
}

fn bench_framer(c: &mut Criterion) {
    let config = ProtocolConfig {
        framing: MessageFraming::LengthPrefixed,
        ..Default::default()
    };
    let message = Bytes::from(vec![7u8; 64 * 1024]);

    let mut group = c.benchmark_group("framer");
    group.throughput(Throughput::Bytes(message.len() as u64));

    group.bench_function("pack_64k_message", |b| {
        b.iter(|| {
            let mut framer = Framer::new(&config);
            framer.push(message.clone()).unwrap();
            let mut packets = 0;
            while let Some(packet) = framer.pack_next() {
                black_box(packet);
                packets += 1;
            }
            black_box(packets);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_checksum, bench_packet_codec, bench_framer);
criterion_main!(benches);
