//! Length-prefixed reading and writing of TLS wire structures.
//!
//! Every read checks the remaining buffer before touching it and fails with
//! a decoding error on exhaustion; declared lengths are validated against
//! caller-supplied bounds, which is the first line of defense against
//! attacker-controlled length fields.

use ferrum_types::TlsError;

/// Cursor over a received byte buffer.
pub struct TlsReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> TlsReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    pub fn has_remaining(&self) -> bool {
        self.offset < self.buf.len()
    }

    pub fn remaining_bytes(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// Fails if any input is left unconsumed.
    pub fn assert_done(&self) -> Result<(), TlsError> {
        if self.has_remaining() {
            return Err(TlsError::decoding("unconsumed trailing bytes"));
        }
        Ok(())
    }

    pub fn get_u8(&mut self) -> Result<u8, TlsError> {
        let b = self.get_fixed(1)?;
        Ok(b[0])
    }

    pub fn get_u16(&mut self) -> Result<u16, TlsError> {
        let b = self.get_fixed(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Read exactly `len` bytes.
    pub fn get_fixed(&mut self, len: usize) -> Result<&'a [u8], TlsError> {
        if self.remaining_bytes() < len {
            return Err(TlsError::decoding(format!(
                "buffer exhausted: wanted {len} bytes, have {}",
                self.remaining_bytes()
            )));
        }
        let out = &self.buf[self.offset..self.offset + len];
        self.offset += len;
        Ok(out)
    }

    /// Skip `len` bytes.
    pub fn discard_next(&mut self, len: usize) -> Result<(), TlsError> {
        self.get_fixed(len).map(|_| ())
    }

    /// Read a byte range prefixed by its length in `len_bytes` (1, 2 or 3)
    /// bytes. The decoded length must fall within `[min, max]`.
    pub fn get_range(
        &mut self,
        len_bytes: usize,
        min: usize,
        max: usize,
    ) -> Result<Vec<u8>, TlsError> {
        let len = self.get_length(len_bytes)?;
        if len < min || len > max {
            return Err(TlsError::decoding(format!(
                "length field {len} outside range [{min},{max}]"
            )));
        }
        Ok(self.get_fixed(len)?.to_vec())
    }

    /// Read a length-prefixed vector of big-endian u16 elements. The bounds
    /// apply to the element count, and the byte length must be even.
    pub fn get_range_vector_u16(
        &mut self,
        len_bytes: usize,
        min_elems: usize,
        max_elems: usize,
    ) -> Result<Vec<u16>, TlsError> {
        let byte_len = self.get_length(len_bytes)?;
        if byte_len % 2 != 0 {
            return Err(TlsError::decoding("vector length not a multiple of 2"));
        }
        let elems = byte_len / 2;
        if elems < min_elems || elems > max_elems {
            return Err(TlsError::decoding(format!(
                "vector element count {elems} outside range [{min_elems},{max_elems}]"
            )));
        }
        let raw = self.get_fixed(byte_len)?;
        Ok(raw
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect())
    }

    /// Read a length-prefixed vector of single-byte elements, bounds applied
    /// to the element count.
    pub fn get_range_vector_u8(
        &mut self,
        len_bytes: usize,
        min_elems: usize,
        max_elems: usize,
    ) -> Result<Vec<u8>, TlsError> {
        self.get_range(len_bytes, min_elems, max_elems)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn get_string(
        &mut self,
        len_bytes: usize,
        min: usize,
        max: usize,
    ) -> Result<String, TlsError> {
        let raw = self.get_range(len_bytes, min, max)?;
        String::from_utf8(raw).map_err(|_| TlsError::decoding("string is not valid UTF-8"))
    }

    fn get_length(&mut self, len_bytes: usize) -> Result<usize, TlsError> {
        let raw = self.get_fixed(len_bytes)?;
        match len_bytes {
            1 => Ok(raw[0] as usize),
            2 => Ok(u16::from_be_bytes([raw[0], raw[1]]) as usize),
            3 => Ok(((raw[0] as usize) << 16) | ((raw[1] as usize) << 8) | raw[2] as usize),
            _ => Err(TlsError::decoding(format!(
                "invalid length prefix width {len_bytes}"
            ))),
        }
    }
}

/// Append `val` prefixed by its length encoded in `len_bytes` (1, 2 or 3)
/// big-endian bytes.
pub fn append_length_value(buf: &mut Vec<u8>, val: &[u8], len_bytes: usize) {
    let len = val.len();
    debug_assert!(
        len_bytes >= 1 && len_bytes <= 3 && (len_bytes == 3 || len < 1 << (8 * len_bytes)),
        "value does not fit a {len_bytes}-byte length prefix"
    );
    for i in (0..len_bytes).rev() {
        buf.push((len >> (8 * i)) as u8);
    }
    buf.extend_from_slice(val);
}

/// Append a u16 vector prefixed by its byte length.
pub fn append_length_u16_vector(buf: &mut Vec<u8>, vals: &[u16], len_bytes: usize) {
    let mut raw = Vec::with_capacity(vals.len() * 2);
    for v in vals {
        raw.extend_from_slice(&v.to_be_bytes());
    }
    append_length_value(buf, &raw, len_bytes);
}
