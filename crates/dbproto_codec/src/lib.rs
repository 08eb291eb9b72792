//! # dbproto Codec
//!
//! Value typing and the wire codec for dbproto table files.
//!
//! Two layers live here:
//!
//! - The value model: [`Scalar`] (what callers work with) and [`Value`]
//!   (what is stored). Encoding between them preserves integer identity
//!   through the wire's string-or-number union by storing integers as
//!   `num:<decimal>` strings and disambiguating literal digit strings
//!   with a `str:` prefix.
//! - The wire codec: a deterministic, protobuf-compatible serialization
//!   of a whole table (`Records { map<string, Record> }`) in
//!   [`encode_records`]/[`decode_records`].
//!
//! ## Usage
//!
//! ```
//! use dbproto_codec::{decode_records, encode_records, Record, Records, Scalar};
//! use std::collections::HashMap;
//!
//! let mut fields = HashMap::new();
//! fields.insert("id".to_string(), Scalar::Int(1));
//! fields.insert("name".to_string(), Scalar::from("Ada"));
//!
//! let mut records = Records::new();
//! records.insert("1".to_string(), Record::from_scalars(&fields));
//!
//! let bytes = encode_records(&records);
//! assert_eq!(decode_records(&bytes).unwrap(), records);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{decode_record, decode_records};
pub use encoder::{encode_record, encode_records, Records};
pub use error::{CodecError, CodecResult};
pub use value::{Record, Scalar, Value};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn scalar_wire_round_trip() {
        let mut fields = HashMap::new();
        fields.insert("id".to_string(), Scalar::Int(0));
        fields.insert("digits".to_string(), Scalar::from("42"));
        fields.insert("ratio".to_string(), Scalar::Float(0.25));
        fields.insert("flag".to_string(), Scalar::Bool(false));

        let mut records = Records::new();
        records.insert(
            Scalar::Int(0).key_string(),
            Record::from_scalars(&fields),
        );

        let bytes = encode_records(&records);
        let decoded = decode_records(&bytes).unwrap();
        let row = decoded["0"].to_scalars().unwrap();
        assert_eq!(row, fields);
    }
}
