//! Wire encoder for the on-disk `Records` payload.
//!
//! The framing is protobuf-compatible:
//!
//! ```text
//! Records { map<string, Record> records = 1 }
//! Record  { map<string, Value>  fields  = 1 }
//! Value   { oneof kind { string text = 1; double number = 2; bool boolean = 3 } }
//! ```
//!
//! Map entries are emitted with their keys sorted so that identical
//! record sets always serialize to identical bytes.

use crate::value::{Record, Value};
use std::collections::HashMap;

/// The full contents of one table: primary-key string to record.
pub type Records = HashMap<String, Record>;

/// Protobuf wire type for varint-encoded fields.
const WIRE_VARINT: u8 = 0;
/// Protobuf wire type for 64-bit fixed-width fields.
const WIRE_I64: u8 = 1;
/// Protobuf wire type for length-delimited fields.
const WIRE_LEN: u8 = 2;

/// Encode a record set to its wire representation.
///
/// An empty record set encodes to an empty byte string, matching the
/// protobuf convention that an all-default message is zero bytes.
pub fn encode_records(records: &Records) -> Vec<u8> {
    let mut encoder = WireEncoder::new();
    let mut keys: Vec<&String> = records.keys().collect();
    keys.sort();
    for key in keys {
        let mut entry = WireEncoder::new();
        entry.push_string(1, key);
        entry.push_message(2, &encode_record(&records[key]));
        encoder.push_message(1, &entry.into_bytes());
    }
    encoder.into_bytes()
}

/// Encode a single record to its wire representation.
pub fn encode_record(record: &Record) -> Vec<u8> {
    let mut encoder = WireEncoder::new();
    let mut fields: Vec<&String> = record.fields.keys().collect();
    fields.sort();
    for field in fields {
        let mut entry = WireEncoder::new();
        entry.push_string(1, field);
        entry.push_message(2, &encode_value(&record.fields[field]));
        encoder.push_message(1, &entry.into_bytes());
    }
    encoder.into_bytes()
}

fn encode_value(value: &Value) -> Vec<u8> {
    let mut encoder = WireEncoder::new();
    match value {
        Value::Text(s) => encoder.push_string(1, s),
        Value::Number(n) => encoder.push_double(2, *n),
        Value::Bool(b) => encoder.push_varint_field(3, u64::from(*b)),
    }
    encoder.into_bytes()
}

/// A minimal protobuf wire-format writer.
struct WireEncoder {
    buffer: Vec<u8>,
}

impl WireEncoder {
    fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn push_tag(&mut self, field: u32, wire_type: u8) {
        self.push_varint(u64::from(field) << 3 | u64::from(wire_type));
    }

    fn push_varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.buffer.push(byte);
                return;
            }
            self.buffer.push(byte | 0x80);
        }
    }

    fn push_varint_field(&mut self, field: u32, value: u64) {
        self.push_tag(field, WIRE_VARINT);
        self.push_varint(value);
    }

    fn push_string(&mut self, field: u32, s: &str) {
        self.push_tag(field, WIRE_LEN);
        self.push_varint(s.len() as u64);
        self.buffer.extend_from_slice(s.as_bytes());
    }

    fn push_message(&mut self, field: u32, bytes: &[u8]) {
        self.push_tag(field, WIRE_LEN);
        self.push_varint(bytes.len() as u64);
        self.buffer.extend_from_slice(bytes);
    }

    fn push_double(&mut self, field: u32, value: f64) {
        self.push_tag(field, WIRE_I64);
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }
}
