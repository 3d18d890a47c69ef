//! Value encodings: byte order, signedness and character set used to interpret raw slices.
//!
//! An [`Encoding`] is an immutable configuration value. It is attached to a grammar
//! (`Format`), may be overridden per token, and is stored on every history entry so
//! later lookups interpret the bytes exactly as they were read.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Byte order for multi-byte numeric fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Big,
    Little,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sign {
    #[default]
    Unsigned,
    Signed,
}

/// Character set used when a value is read as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Ascii,
    Utf8,
    Utf16Le,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Encoding {
    pub sign: Sign,
    pub endianness: Endianness,
    pub charset: Charset,
}

impl Encoding {
    pub const fn big_endian() -> Self {
        Encoding {
            sign: Sign::Unsigned,
            endianness: Endianness::Big,
            charset: Charset::Ascii,
        }
    }

    pub const fn little_endian() -> Self {
        Encoding {
            sign: Sign::Unsigned,
            endianness: Endianness::Little,
            charset: Charset::Ascii,
        }
    }

    /// Little-endian, signed, UTF-16LE text (PE resource names).
    pub const fn utf16_le() -> Self {
        Encoding {
            sign: Sign::Signed,
            endianness: Endianness::Little,
            charset: Charset::Utf16Le,
        }
    }

    pub const fn with_sign(self, sign: Sign) -> Self {
        Encoding { sign, ..self }
    }

    /// Numeric reading of `buf`. `None` for empty slices and for values that do not fit
    /// in an `i128` (more than 16 bytes, or a 16-byte unsigned value with the top bit set).
    pub fn to_int(&self, buf: &[u8]) -> Option<i128> {
        if buf.is_empty() || buf.len() > 16 {
            return None;
        }
        let raw = self.bytes_to_u128(buf);
        match self.sign {
            Sign::Unsigned => i128::try_from(raw).ok(),
            Sign::Signed => {
                let bits = buf.len() as u32 * 8;
                if bits == 128 {
                    return Some(raw as i128);
                }
                let sign_bit = 1u128 << (bits - 1);
                if raw & sign_bit != 0 {
                    Some(raw as i128 - (1i128 << bits))
                } else {
                    Some(raw as i128)
                }
            }
        }
    }

    /// Text reading of `buf` in this encoding's charset. Invalid sequences are replaced.
    pub fn to_text(&self, buf: &[u8]) -> String {
        match self.charset {
            Charset::Ascii | Charset::Utf8 => String::from_utf8_lossy(buf).into_owned(),
            Charset::Utf16Le => {
                let (text, _) = encoding_rs::UTF_16LE.decode_without_bom_handling(buf);
                text.into_owned()
            }
        }
    }

    fn bytes_to_u128(&self, buf: &[u8]) -> u128 {
        match self.endianness {
            Endianness::Big => match buf.len() {
                1 => buf[0] as u128,
                2 => BigEndian::read_u16(buf) as u128,
                4 => BigEndian::read_u32(buf) as u128,
                8 => BigEndian::read_u64(buf) as u128,
                16 => BigEndian::read_u128(buf),
                _ => {
                    let mut b = [0u8; 16];
                    let start = 16 - buf.len();
                    b[start..].copy_from_slice(buf);
                    BigEndian::read_u128(&b)
                }
            },
            Endianness::Little => match buf.len() {
                1 => buf[0] as u128,
                2 => LittleEndian::read_u16(buf) as u128,
                4 => LittleEndian::read_u32(buf) as u128,
                8 => LittleEndian::read_u64(buf) as u128,
                16 => LittleEndian::read_u128(buf),
                _ => {
                    let mut b = [0u8; 16];
                    b[..buf.len()].copy_from_slice(buf);
                    LittleEndian::read_u128(&b)
                }
            },
        }
    }
}
