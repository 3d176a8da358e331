//! Writer for the TPS files the integration tests read
//!
//! Every fixture is built in memory from the records below, so the expected
//! values in the tests can be traced back to the bytes that produce them.

#![allow(dead_code)]

use std::path::PathBuf;

use topspeed_engine::storage::crypto::{block_aligned, Key};

pub const PASSWORD: &str = "tOpSeCrEt";

const PAGE_HEADER: usize = 13;
const DATA: u8 = 0xF3;
const METADATA: u8 = 0xF6;
const DEFINITION: u8 = 0xFA;
const MEMO: u8 = 0xFC;
const TABLE_NAME: u8 = 0xFE;

const BYTE: u8 = 0x01;
const SHORT: u8 = 0x02;
const USHORT: u8 = 0x03;
const DATE: u8 = 0x04;
const TIME: u8 = 0x05;
const LONG: u8 = 0x06;
const ULONG: u8 = 0x07;
const SREAL: u8 = 0x08;
const REAL: u8 = 0x09;
const DECIMAL: u8 = 0x0A;
const STRING: u8 = 0x12;
const CSTRING: u8 = 0x13;
const PSTRING: u8 = 0x14;
const GROUP: u8 = 0x16;

/// One leaf record: the key header and what follows it
#[derive(Clone)]
pub struct Rec {
    header: Vec<u8>,
    payload: Vec<u8>,
}

impl Rec {
    fn new(header: Vec<u8>, payload: Vec<u8>) -> Self {
        Rec { header, payload }
    }

    fn bytes(&self) -> Vec<u8> {
        [self.header.as_slice(), self.payload.as_slice()].concat()
    }

    fn tag(&self) -> u8 {
        self.header[4]
    }

    fn record_number(&self) -> u32 {
        u32::from_be_bytes([self.header[5], self.header[6], self.header[7], self.header[8]])
    }
}

fn table_name(name: &str, table: u32) -> Rec {
    let mut header = vec![TABLE_NAME];
    header.extend_from_slice(name.as_bytes());
    Rec::new(header, table.to_be_bytes().to_vec())
}

fn keyed(table: u32, tag: u8) -> Vec<u8> {
    let mut header = table.to_be_bytes().to_vec();
    header.push(tag);
    header
}

fn data(table: u32, record: u32, payload: Vec<u8>) -> Rec {
    let mut header = keyed(table, DATA);
    header.extend_from_slice(&record.to_be_bytes());
    Rec::new(header, payload)
}

fn metadata(table: u32, about: u8, count: u32) -> Rec {
    let mut header = keyed(table, METADATA);
    header.push(about);
    Rec::new(header, count.to_le_bytes().to_vec())
}

fn definitions(table: u32, definition: &[u8]) -> Vec<Rec> {
    definition
        .chunks(180)
        .enumerate()
        .map(|(block, chunk)| {
            let mut header = keyed(table, DEFINITION);
            header.extend_from_slice(&(block as u16).to_be_bytes());
            Rec::new(header, chunk.to_vec())
        })
        .collect()
}

fn memos(table: u32, owner: u32, index: u32, body: &[u8]) -> Vec<Rec> {
    let chunks: Vec<&[u8]> = if body.is_empty() {
        vec![body]
    } else {
        body.chunks(256).collect()
    };
    chunks
        .into_iter()
        .enumerate()
        .map(|(sequence, chunk)| {
            let mut header = keyed(table, MEMO);
            header.extend_from_slice(&owner.to_be_bytes());
            header.extend_from_slice(&index.to_be_bytes());
            header.extend_from_slice(&(sequence as u16).to_be_bytes());
            Rec::new(header, chunk.to_vec())
        })
        .collect()
}

fn index_entry(table: u32, index: u8, key: Vec<u8>, record: u32) -> Rec {
    let mut header = keyed(table, index);
    header.extend_from_slice(&key);
    header.extend_from_slice(&record.to_be_bytes());
    Rec::new(header, Vec::new())
}

/// Definition record contents in the on-disk layout
struct Definition {
    record_length: u16,
    fields: Vec<Vec<u8>>,
    memos: Vec<Vec<u8>>,
    indexes: Vec<Vec<u8>>,
}

impl Definition {
    fn new(record_length: u16) -> Self {
        Definition {
            record_length,
            fields: Vec::new(),
            memos: Vec::new(),
            indexes: Vec::new(),
        }
    }

    fn field(self, ty: u8, name: &str, offset: u16, length: u16) -> Self {
        self.field_with(ty, name, offset, length, 1, 0, "")
    }

    fn array(self, ty: u8, name: &str, offset: u16, length: u16, elements: u16) -> Self {
        self.field_with(ty, name, offset, length, elements, 0, "")
    }

    fn decimal(self, name: &str, offset: u16, length: u16, places: u8) -> Self {
        self.field_with(DECIMAL, name, offset, length, 1, places, "")
    }

    #[allow(clippy::too_many_arguments)]
    fn field_with(
        mut self,
        ty: u8,
        name: &str,
        offset: u16,
        length: u16,
        elements: u16,
        places: u8,
        picture: &str,
    ) -> Self {
        let mut b = vec![ty];
        b.extend_from_slice(&offset.to_le_bytes());
        b.extend_from_slice(name.as_bytes());
        b.push(0);
        b.extend_from_slice(&elements.to_le_bytes());
        b.extend_from_slice(&length.to_le_bytes());
        b.extend_from_slice(&0u16.to_le_bytes());
        b.extend_from_slice(&(self.fields.len() as u16 + 1).to_le_bytes());
        match ty {
            DECIMAL => {
                b.push(places);
                b.push((length / elements) as u8);
            }
            STRING | CSTRING | PSTRING => {
                b.extend_from_slice(&(length / elements).to_le_bytes());
                b.extend_from_slice(picture.as_bytes());
                b.push(0);
                if picture.is_empty() {
                    b.push(0);
                }
            }
            _ => {}
        }
        self.fields.push(b);
        self
    }

    fn memo(mut self, name: &str, blob: bool) -> Self {
        let mut b = vec![0, 1];
        b.extend_from_slice(name.as_bytes());
        b.push(0);
        b.extend_from_slice(&0x1000u16.to_le_bytes());
        b.extend_from_slice(&(if blob { 4u16 } else { 0 }).to_le_bytes());
        self.memos.push(b);
        self
    }

    fn index(mut self, name: &str, fields: &[u16]) -> Self {
        let mut b = vec![0, 1];
        b.extend_from_slice(name.as_bytes());
        b.push(0);
        b.push(0);
        b.extend_from_slice(&(fields.len() as u16).to_le_bytes());
        for field in fields {
            b.extend_from_slice(&field.to_le_bytes());
            b.extend_from_slice(&0u16.to_le_bytes());
        }
        self.indexes.push(b);
        self
    }

    fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        for n in [
            1,
            self.record_length,
            self.fields.len() as u16,
            self.memos.len() as u16,
            self.indexes.len() as u16,
        ] {
            out.extend_from_slice(&n.to_le_bytes());
        }
        out.extend(self.fields.concat());
        out.extend(self.memos.concat());
        out.extend(self.indexes.concat());
        out
    }
}

fn push_count(out: &mut Vec<u8>, n: usize) {
    assert!(n < 1 << 15);
    if n < 0x80 {
        out.push(n as u8);
    } else {
        out.push((n & 0x7F) as u8 | 0x80);
        out.push((n >> 7) as u8);
    }
}

/// Run-length encode, turning runs of four or more equal bytes into repeats
fn compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let (mut i, mut literal_start) = (0, 0);
    while i < data.len() {
        let mut j = i;
        while j + 1 < data.len() && data[j + 1] == data[i] && j - i < 30000 {
            j += 1;
        }
        let run = j - i + 1;
        if run >= 4 {
            let literal = &data[literal_start..=i];
            push_count(&mut out, literal.len());
            out.extend_from_slice(literal);
            push_count(&mut out, run - 1);
            i = j + 1;
            literal_start = i;
        } else {
            i += 1;
        }
    }
    if literal_start < data.len() {
        push_count(&mut out, data.len() - literal_start);
        out.extend_from_slice(&data[literal_start..]);
    }
    out
}

/// Prefix-compress records into a leaf payload
fn encode_leaf(records: &[Rec]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut previous: Option<(Vec<u8>, usize)> = None;
    for rec in records {
        let bytes = rec.bytes();
        let header_len = rec.header.len();
        let (flags, copy) = match &previous {
            None => (0xC0u8, 0usize),
            Some((prev, prev_header_len)) => {
                let limit = prev.len().min(bytes.len()).min(63);
                let copy = (0..limit).take_while(|&k| prev[k] == bytes[k]).count();
                let mut flags = copy as u8;
                if bytes.len() != prev.len() {
                    flags |= 0x80;
                }
                if header_len != *prev_header_len {
                    flags |= 0x40;
                }
                (flags, copy)
            }
        };
        out.push(flags);
        if flags & 0x80 != 0 {
            out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
        }
        if flags & 0x40 != 0 {
            out.extend_from_slice(&(header_len as u16).to_le_bytes());
        }
        out.extend_from_slice(&bytes[copy..]);
        previous = Some((bytes, header_len));
    }
    out
}

/// Shape of the page tree
struct Layout {
    leaf_records: usize,
    leaf_bytes: usize,
    fanout: usize,
}

/// Lays pages out in 0x100-byte units after the file header
struct Builder {
    key: Option<Key>,
    pages: Vec<(u32, Vec<u8>)>,
    next_ref: u32,
    leaves: Vec<(u32, Vec<Rec>)>,
    root: (u32, u16),
}

impl Builder {
    fn new(key: Option<Key>) -> Self {
        Builder {
            key,
            pages: Vec::new(),
            next_ref: 0,
            leaves: Vec::new(),
            root: (0, 0),
        }
    }

    fn add_page(&mut self, payload: &[u8], count: u16, level: u8) -> (u32, u16) {
        let packed = compress(payload);
        let body = if packed.len() < payload.len() {
            packed
        } else {
            payload.to_vec()
        };
        let reference = self.next_ref;
        let offset = (reference << 8) + 0x200;
        let size = PAGE_HEADER + body.len();

        let mut page = offset.to_le_bytes().to_vec();
        page.extend_from_slice(&(size as u16).to_le_bytes());
        page.extend_from_slice(&((PAGE_HEADER + payload.len()) as u16).to_le_bytes());
        page.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        page.extend_from_slice(&count.to_le_bytes());
        page.push(level);
        page.extend_from_slice(&body);

        if let Some(key) = &self.key {
            page.resize(block_aligned(size), 0);
            key.encrypt(&mut page).unwrap();
        }
        self.next_ref += (page.len() as u32 + 0xFF) / 0x100;
        self.pages.push((reference, page));
        (reference, size as u16)
    }

    fn build_tree(&mut self, mut records: Vec<Rec>, layout: Layout) {
        records.sort_by(|a, b| a.header.cmp(&b.header));
        assert!(records.windows(2).all(|w| w[0].header != w[1].header), "duplicate keys");

        let mut groups: Vec<Vec<Rec>> = Vec::new();
        let mut current: Vec<Rec> = Vec::new();
        for rec in records {
            if !current.is_empty() {
                let mut trial = current.clone();
                trial.push(rec.clone());
                if current.len() >= layout.leaf_records || encode_leaf(&trial).len() > layout.leaf_bytes {
                    groups.push(std::mem::take(&mut current));
                }
            }
            current.push(rec);
        }
        if !current.is_empty() {
            groups.push(current);
        }

        let mut entries = Vec::new();
        for group in groups {
            let (reference, size) = self.add_page(&encode_leaf(&group), group.len() as u16, 0);
            entries.push((reference, size, group[group.len() - 1].header.clone()));
            self.leaves.push((reference, group));
        }

        let mut level = 1u8;
        loop {
            let mut parents = Vec::new();
            for chunk in entries.chunks(layout.fanout) {
                let mut payload = Vec::new();
                for (reference, size, key) in chunk {
                    payload.extend_from_slice(&reference.to_le_bytes());
                    payload.extend_from_slice(&size.to_le_bytes());
                    payload.push(key.len() as u8);
                    payload.extend_from_slice(key);
                }
                let (reference, size) = self.add_page(&payload, chunk.len() as u16, level);
                parents.push((reference, size, chunk[chunk.len() - 1].2.clone()));
            }
            entries = parents;
            if entries.len() == 1 {
                break;
            }
            level += 1;
        }
        self.root = (entries[0].0, entries[0].1);
    }

    fn finish(&self, last_record: u32) -> Vec<u8> {
        let end = 0x200 + (self.next_ref << 8);
        let mut buf = vec![0u8; end as usize];
        for (reference, page) in &self.pages {
            let offset = ((reference << 8) + 0x200) as usize;
            buf[offset..offset + page.len()].copy_from_slice(page);
        }
        buf[0x04..0x06].copy_from_slice(&0x200u16.to_le_bytes());
        buf[0x06..0x0A].copy_from_slice(&end.to_le_bytes());
        buf[0x0A..0x0E].copy_from_slice(&end.to_le_bytes());
        buf[0x0E..0x12].copy_from_slice(b"tOpS");
        let flags: u16 = if self.key.is_some() { 1 } else { 0 };
        buf[0x12..0x14].copy_from_slice(&flags.to_le_bytes());
        buf[0x14..0x18].copy_from_slice(&last_record.to_be_bytes());
        buf[0x18..0x1C].copy_from_slice(&7u32.to_le_bytes());
        buf[0x1C..0x20].copy_from_slice(&self.root.0.to_le_bytes());
        buf[0x20..0x22].copy_from_slice(&self.root.1.to_le_bytes());
        buf
    }
}

fn padded(text: &str, width: usize) -> Vec<u8> {
    let mut out = text.as_bytes().to_vec();
    out.resize(width, b' ');
    out
}

fn date(year: u32, month: u32, day: u32) -> [u8; 4] {
    ((year << 16) | (month << 8) | day).to_le_bytes()
}

fn time(hour: u32, minute: u32, second: u32, centis: u32) -> [u8; 4] {
    ((hour << 24) | (minute << 16) | (second << 8) | centis).to_le_bytes()
}

/// Packed BCD with a sign nibble in front, e.g. `bcd("-17.25", 5)`
fn bcd(value: &str, width: usize) -> Vec<u8> {
    let negative = value.starts_with('-');
    let digits: Vec<u8> = value
        .bytes()
        .filter(u8::is_ascii_digit)
        .map(|d| d - b'0')
        .collect();
    let mut nibbles = vec![if negative { 0xF } else { 0 }];
    nibbles.resize(width * 2 - digits.len(), 0);
    nibbles.extend(digits);
    nibbles.chunks(2).map(|p| (p[0] << 4) | p[1]).collect()
}

pub fn long_comment() -> String {
    "This comment is long enough to need several fragments. ".repeat(12)
}

/// Tables MEMOS (four people, five memos, one index) and CLASH (a memo
/// named like a field, plus a memo whose owner has no data record)
pub fn memos_tps() -> Vec<u8> {
    let mut recs = Vec::new();
    let people = Definition::new(37)
        .field(LONG, "ID", 0, 4)
        .field(STRING, "NAME", 4, 20)
        .field(DATE, "BORN", 24, 4)
        .field(TIME, "SEEN", 28, 4)
        .decimal("BALANCE", 32, 5, 2)
        .memo("NOTES", false)
        .memo("COMMENT", false)
        .index("KEY_NAME", &[2]);
    recs.push(table_name("MEMOS", 1));
    recs.extend(definitions(1, &people.build()));

    let rows = [
        (1u32, "Alice", Some((1980, 5, 17)), (8, 30, 0, 0), "1234.50"),
        (2, "Bob", Some((1975, 12, 1)), (23, 59, 59, 99), "-17.25"),
        (3, "Carol", None, (0, 0, 0, 0), "0.00"),
        (4, "Dave", Some((2000, 2, 29)), (12, 0, 30, 5), "99999.99"),
    ];
    for (n, name, born, seen, balance) in rows {
        let mut payload = n.to_le_bytes().to_vec();
        payload.extend(padded(name, 20));
        payload.extend(born.map_or([0; 4], |(y, m, d)| date(y, m, d)));
        payload.extend(time(seen.0, seen.1, seen.2, seen.3));
        payload.extend(bcd(balance, 5));
        assert_eq!(payload.len(), 37);
        recs.push(data(1, n, payload));
        recs.push(index_entry(1, 0, padded(&name.to_uppercase(), 20), n));
    }
    recs.push(metadata(1, DATA, 4));

    let comment = format!("{}\0", long_comment());
    recs.extend(memos(1, 1, 0, b"First note\0"));
    recs.extend(memos(1, 1, 1, comment.as_bytes()));
    recs.extend(memos(1, 2, 0, b"Second note\0"));
    recs.extend(memos(1, 4, 0, b"Fourth note\0"));
    recs.extend(memos(1, 4, 1, b"Dave has a comment too\0"));

    let clash = Definition::new(14)
        .field(LONG, "ID", 0, 4)
        .field(STRING, "NOTES", 4, 10)
        .memo("NOTES", false);
    recs.push(table_name("CLASH", 2));
    recs.extend(definitions(2, &clash.build()));
    for n in [1u32, 2] {
        let mut payload = n.to_le_bytes().to_vec();
        payload.extend(padded("stub", 10));
        recs.push(data(2, n, payload));
    }
    recs.extend(memos(2, 2, 0, b"memo wins\0"));
    recs.extend(memos(2, 9, 0, b"orphan\0"));

    let mut builder = Builder::new(None);
    builder.build_tree(
        recs,
        Layout {
            leaf_records: 8,
            leaf_bytes: 700,
            fanout: 4,
        },
    );
    builder.finish(4)
}

/// Table ARRAYS (arrays, a group and an array of groups) and TYPES (one
/// field of every scalar type)
pub fn array_of_groups_tps() -> Vec<u8> {
    let mut recs = Vec::new();
    let arrays = Definition::new(136)
        .field(LONG, "A", 0, 4)
        .array(STRING, "B", 4, 60, 6)
        .array(LONG, "C", 64, 24, 6)
        .field(GROUP, "D", 88, 24)
        .field(LONG, "DA", 88, 4)
        .field(STRING, "DB", 92, 20)
        .array(GROUP, "E", 112, 24, 2)
        .field(LONG, "EA", 112, 4)
        .field(STRING, "EB", 116, 8);
    recs.push(table_name("ARRAYS", 1));
    recs.extend(definitions(1, &arrays.build()));

    let mut payload = 1u32.to_le_bytes().to_vec();
    for word in ["First", "Second", "Third", "Fourth", "Fifth", "Sixth"] {
        payload.extend(padded(word, 10));
    }
    for n in 1u32..=6 {
        payload.extend(n.to_le_bytes());
    }
    payload.extend(123456u32.to_le_bytes());
    payload.extend(padded("Field B in Group D", 20));
    payload.extend(1u32.to_le_bytes());
    payload.extend(padded("one", 8));
    payload.extend(2u32.to_le_bytes());
    payload.extend(padded("two", 8));
    assert_eq!(payload.len(), 136);
    recs.push(data(1, 1, payload));
    recs.push(metadata(1, DATA, 1));

    let types = Definition::new(60)
        .field(BYTE, "BYTE", 0, 1)
        .field(SHORT, "SHORT", 1, 2)
        .field(USHORT, "USHORT", 3, 2)
        .field(ULONG, "ULONG", 5, 4)
        .field(SREAL, "SREAL", 9, 4)
        .field(REAL, "REAL", 13, 8)
        .field(CSTRING, "CSTR", 21, 10)
        .field_with(PSTRING, "PSTR", 31, 10, 1, 0, "@s9")
        .field(DATE, "DAY", 41, 4)
        .field(TIME, "CLOCK", 45, 4)
        .decimal("PRICE", 49, 4, 3)
        .array(SHORT, "PAIR", 53, 4, 2)
        .field(STRING, "PAD", 57, 3);
    recs.push(table_name("TYPES", 2));
    recs.extend(definitions(2, &types.build()));

    let mut p = vec![200u8];
    p.extend((-1234i16).to_le_bytes());
    p.extend(65000u16.to_le_bytes());
    p.extend(4_000_000_000u32.to_le_bytes());
    p.extend(1.5f32.to_le_bytes());
    p.extend((-2.25f64).to_le_bytes());
    p.extend(b"hello\0xxxx");
    p.extend(b"\x05world    ");
    p.extend(date(2024, 1, 31));
    p.extend(time(7, 5, 3, 20));
    p.extend(bcd("-123.456", 4));
    p.extend((-1i16).to_le_bytes());
    p.extend(1i16.to_le_bytes());
    p.extend(b"   ");
    assert_eq!(p.len(), 60);
    recs.push(data(2, 5, p));

    let mut builder = Builder::new(None);
    builder.build_tree(
        recs,
        Layout {
            leaf_records: 8,
            leaf_bytes: 900,
            fanout: 4,
        },
    );
    builder.finish(5)
}

pub fn image_png() -> Vec<u8> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/image.png");
    std::fs::read(path).unwrap()
}

/// Table PICTURES: twelve records with captions, a PNG on record 11 and
/// forty bytes on record 3
fn picture_records() -> Vec<Rec> {
    let image = image_png();
    let mut recs = Vec::new();
    let pictures = Definition::new(24)
        .field(LONG, "ID", 0, 4)
        .field(STRING, "TITLE", 4, 20)
        .memo("CAPTION", false)
        .memo("IMAGE", true);
    recs.push(table_name("PICTURES", 1));
    recs.extend(definitions(1, &pictures.build()));
    for n in 1u32..=12 {
        let mut payload = n.to_le_bytes().to_vec();
        payload.extend(padded(&format!("Picture {}", n), 20));
        recs.push(data(1, n, payload));
        recs.extend(memos(1, n, 0, format!("Caption for picture {}\0", n).as_bytes()));
    }
    recs.push(metadata(1, DATA, 12));

    let mut blob = (image.len() as u32).to_le_bytes().to_vec();
    blob.extend(&image);
    recs.extend(memos(1, 11, 1, &blob));
    let mut small = 40u32.to_le_bytes().to_vec();
    small.extend(0u8..40);
    recs.extend(memos(1, 3, 1, &small));
    recs
}

fn picture_layout() -> Layout {
    Layout {
        leaf_records: 6,
        leaf_bytes: 1200,
        fanout: 3,
    }
}

/// PICTURES encrypted with [`PASSWORD`], in a three-level tree
pub fn blobs_tps() -> Vec<u8> {
    let key = Key::from_password(PASSWORD).unwrap();
    let mut builder = Builder::new(Some(key));
    builder.build_tree(picture_records(), picture_layout());
    builder.finish(12)
}

/// PICTURES in plain form with the leaf holding records 7 to 12 damaged
pub fn corrupt_tps() -> Vec<u8> {
    let mut builder = Builder::new(None);
    builder.build_tree(picture_records(), picture_layout());
    let mut buf = builder.finish(12);

    let data_leaves: Vec<_> = builder
        .leaves
        .iter()
        .filter(|(_, group)| group.iter().all(|r| r.tag() == DATA))
        .collect();
    let (reference, group) = data_leaves[1];
    let lost: Vec<u32> = group.iter().map(Rec::record_number).collect();
    assert_eq!(lost, [7, 8, 9, 10, 11, 12]);
    buf[((reference << 8) + 0x200) as usize] ^= 0x01;
    buf
}
