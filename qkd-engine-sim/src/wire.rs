//! String encodings used on the wire: bits as `0/1`, detector symbols as
//! `0/1/?`, bases as `+/x/o`. Use with `#[serde(with = "...")]`.

macro_rules! string_codec {
    ($name:ident, $ty:ty, $format:path, $parse:path) => {
        pub mod $name {
            use serde::{de::Error, Deserialize, Deserializer, Serializer};

            pub fn serialize<S: Serializer>(value: &[$ty], serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&$format(value))
            }

            pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<$ty>, D::Error> {
                let text = String::deserialize(deserializer)?;
                $parse(&text).map_err(D::Error::custom)
            }
        }
    };
}

string_codec!(bits, bool, bb84::prelude::format_bits, bb84::prelude::parse_bits);
string_codec!(symbols, bb84::prelude::Symbol, bb84::prelude::format_symbols, bb84::prelude::parse_symbols);
string_codec!(bases, bb84::prelude::Basis, bb84::prelude::format_bases, bb84::prelude::parse_bases);
