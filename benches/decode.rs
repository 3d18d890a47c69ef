//! Benchmark: decode a synthetic PE32 image with a populated resource tree, a large RFC 822
//! header block (greedy fields), and the exporters over the resulting histories.

use binmetal::directory::HIGH_BIT;
use binmetal::export::{flat_js, tree_json};
use binmetal::formats::{eml, pe};
use binmetal::{SliceSource, TreeOptions};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const RSRC: usize = 0x200;
const VIRTUAL_ADDRESS: u32 = 0x4000;
const TYPES: usize = 16;

fn put16(buf: &mut [u8], at: usize, v: u16) {
    buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put32(buf: &mut [u8], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

/// PE32 image whose resource tree has `TYPES` types, each with one name and one language.
fn pe_image() -> Vec<u8> {
    let delta = VIRTUAL_ADDRESS - RSRC as u32;
    // root table + per type: two tables (24 bytes each) and a leaf (16) + payload (16)
    let tree = 16 + 8 * TYPES + TYPES * (24 + 24 + 16 + 16);
    let mut buf = vec![0u8; RSRC + tree];
    buf[0..2].copy_from_slice(b"MZ");
    put32(&mut buf, 60, 64);
    buf[64..68].copy_from_slice(b"PE\0\0");
    let coff = 68;
    put16(&mut buf, coff, 0x8664);
    put16(&mut buf, coff + 2, 1);
    let opt = coff + 20;
    put16(&mut buf, opt, 0x10b);
    put32(&mut buf, opt + 92, 16);
    let section = opt + 224;
    buf[section..section + 8].copy_from_slice(b".rsrc\0\0\0");
    put32(&mut buf, section + 12, VIRTUAL_ADDRESS);
    put32(&mut buf, section + 20, RSRC as u32);

    put16(&mut buf, RSRC + 14, TYPES as u16);
    let mut next = 16 + 8 * TYPES;
    for t in 0..TYPES {
        let names = next;
        let langs = names + 24;
        let leaf = langs + 24;
        let payload = leaf + 16;
        next = payload + 16;

        let root_entry = RSRC + 16 + 8 * t;
        put32(&mut buf, root_entry, t as u32 + 1);
        put32(&mut buf, root_entry + 4, HIGH_BIT | names as u32);

        put16(&mut buf, RSRC + names + 14, 1);
        put32(&mut buf, RSRC + names + 16, 1);
        put32(&mut buf, RSRC + names + 20, HIGH_BIT | langs as u32);

        put16(&mut buf, RSRC + langs + 14, 1);
        put32(&mut buf, RSRC + langs + 16, 0x0409);
        put32(&mut buf, RSRC + langs + 20, leaf as u32);

        put32(&mut buf, RSRC + leaf, (RSRC + payload) as u32 + delta);
        put32(&mut buf, RSRC + leaf + 4, 16);
    }
    buf
}

fn eml_message(fields: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..fields {
        out.extend_from_slice(format!("X-Header-{i}: value number {i} with some text\r\n").as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out
}

fn bench_decode(c: &mut Criterion) {
    let image = pe_image();
    let format = pe::format();
    c.bench_function("pe_resource_tree", |b| {
        b.iter(|| {
            let source = SliceSource::new(black_box(&image));
            let env = format.decode(&source).expect("decode");
            black_box(env.history().len())
        })
    });

    let message = eml_message(200);
    let format = eml::format();
    c.bench_function("eml_200_fields", |b| {
        b.iter(|| {
            let source = SliceSource::new(black_box(&message));
            let env = format.decode(&source).expect("decode");
            black_box(env.offset())
        })
    });

    let source = SliceSource::new(&image);
    let env = pe::format().decode(&source).expect("decode");
    c.bench_function("export_flat_and_tree", |b| {
        b.iter(|| {
            let js = flat_js(env.history());
            let tree = tree_json(env.history(), &TreeOptions::default());
            black_box((js.len(), tree.is_object()))
        })
    });
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
