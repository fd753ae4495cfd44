//! Microsoft Office Binary Interchange File Format (BIFF8) record reader.
//! Walks the record stream of an Excel 97-2003 workbook, transparently joining CONTINUE records.

use crate::error::LabelError;
use crate::helpers::bytes::to_f64;
use crate::helpers::bytes::to_u16;
use crate::helpers::bytes::to_u32;
use crate::helpers::bytes::to_usize;
use encoding_rs::Encoding;
use encoding_rs::UTF_16LE;
use encoding_rs::WINDOWS_1252;
use thiserror::Error;

const CONTINUE: u16 = 60;

#[derive(Error, Debug)]
pub enum Biff8Error {
    #[error("Fewer than {0} bytes remaining in record")]
    NoEnoughDataError(usize),
}

/// Cursor over BIFF8 records.
/// `next` positions the reader on a record; the `read_*` methods consume its payload.
pub(crate) struct Biff8Reader {
    /// Encoding for compressed (8-bit) strings, taken from the CODEPAGE record.
    encoding: &'static Encoding,
    buffer: Vec<u8>,
    pointer: usize,
    chunks: Vec<(usize, usize)>,
    index: usize,
    offset: usize,
}

impl Biff8Reader {
    pub(crate) fn new(data: Vec<u8>) -> Biff8Reader {
        Biff8Reader {
            encoding: WINDOWS_1252,
            buffer: data,
            pointer: 0,
            chunks: Vec::new(),
            index: 0,
            offset: 0,
        }
    }

    /// Switches the 8-bit string encoding. UTF-16 code pages keep the Windows-1252 fallback
    /// since BIFF8 stores wide strings as UTF-16 regardless.
    pub(crate) fn set_encoding(&mut self, encoding: &'static Encoding) {
        if encoding != UTF_16LE {
            self.encoding = encoding;
        }
    }

    /// Moves to the next record and returns its type, or `None` at the end of the stream.
    pub(crate) fn next(&mut self) -> Result<Option<u16>, LabelError> {
        if self.pointer + 4 > self.buffer.len() {
            return Ok(None);
        }
        self.index = 0;
        self.offset = 0;
        self.chunks.clear();

        let kind = self.get_u16_at(self.pointer)?;
        let size = self.get_u16_at(self.pointer + 2)? as usize;
        self.push_chunk(size);
        while self.pointer + 4 <= self.buffer.len() && self.get_u16_at(self.pointer)? == CONTINUE {
            let size = self.get_u16_at(self.pointer + 2)? as usize;
            self.push_chunk(size);
        }
        Ok(Some(kind))
    }

    fn push_chunk(&mut self, size: usize) {
        let lower = (self.pointer + 4).min(self.buffer.len());
        let upper = (lower + size).min(self.buffer.len());
        self.pointer = upper;
        self.chunks.push((lower, upper));
    }

    /// Jumps to an absolute stream offset (e.g. a BOUNDSHEET8 position).
    pub(crate) fn goto(&mut self, pointer: usize) {
        self.pointer = pointer;
    }

    /// Reads a fixed-width value, which may straddle a CONTINUE boundary.
    fn read_exact<const N: usize>(&mut self) -> Result<[u8; N], LabelError> {
        let mut value = [0u8; N];
        let mut filled = 0;
        while filled < N {
            let (start, size) = self.read(N - filled);
            if size == 0 {
                Err(Biff8Error::NoEnoughDataError(N))?;
            }
            value[filled..filled + size].copy_from_slice(&self.buffer[start..start + size]);
            filled += size;
        }
        Ok(value)
    }

    /// Reads up to `length` bytes from the current chunk; returns the buffer offset and size read.
    fn read(&mut self, length: usize) -> (usize, usize) {
        if let Some((lower, upper)) = self.chunks.get(self.index).copied() {
            let source = upper.min(lower + self.offset);
            let target = upper.min(source + length);
            if source < upper {
                if target == upper {
                    self.index += 1;
                    self.offset = 0;
                } else {
                    self.offset += target - source;
                }
                return (source, target - source);
            }
        }
        (0, 0)
    }

    pub(crate) fn skip(&mut self, length: usize) -> Result<(), LabelError> {
        let mut remaining = length;
        while remaining > 0 {
            let (_, size) = self.read(remaining);
            if size == 0 {
                Err(Biff8Error::NoEnoughDataError(remaining))?;
            }
            remaining -= size;
        }
        Ok(())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, LabelError> {
        self.read_exact::<1>().map(|data| data[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, LabelError> {
        self.read_exact::<2>().map(|data| to_u16(&data))
    }

    /// Reads a u16 located `offset` bytes before the end of the current record.
    pub(crate) fn get_u16_back(&self, offset: usize) -> Result<u16, LabelError> {
        let mut offset = offset;
        for (lower, upper) in self.chunks.iter().rev() {
            if *lower + offset <= *upper {
                return self.get_u16_at(*upper - offset);
            }
            offset -= *upper - *lower;
        }
        Err(Biff8Error::NoEnoughDataError(2))?
    }

    fn get_u16_at(&self, index: usize) -> Result<u16, LabelError> {
        match self.buffer.get(index..index + 2) {
            Some(bytes) => Ok(to_u16(bytes)),
            None => Err(Biff8Error::NoEnoughDataError(2))?,
        }
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, LabelError> {
        self.read_exact::<4>().map(|data| to_u32(&data))
    }

    pub(crate) fn read_usize(&mut self) -> Result<usize, LabelError> {
        self.read_exact::<4>().map(|data| to_usize(&data))
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, LabelError> {
        self.read_exact::<8>().map(|data| to_f64(&data))
    }

    /// Decodes an RK value: a 30-bit integer or the high 30 bits of a double,
    /// optionally divided by 100.
    pub(crate) fn read_rk_number(&mut self) -> Result<f64, LabelError> {
        let value = self.read_u32()?;
        let is_percentage = (value & 0x01) != 0;
        let is_integer = (value & 0x02) != 0;
        let mut number = if is_integer {
            ((value as i32) >> 2) as f64
        } else {
            f64::from_bits(((value & 0xFFFF_FFFC) as u64) << 32)
        };
        if is_percentage {
            number /= 100.0;
        }
        Ok(number)
    }

    /// ShortXLUnicodeString: 1-byte character count.
    pub(crate) fn read_short_xl_unicode_string(&mut self) -> Result<String, LabelError> {
        let mut string = String::new();
        let chars = self.read_u8()? as usize;
        self.read_string_into(chars, false, &mut string)?;
        Ok(string)
    }

    /// XLUnicodeString: 2-byte character count.
    pub(crate) fn read_xl_unicode_string(&mut self) -> Result<String, LabelError> {
        let mut string = String::new();
        let chars = self.read_u16()? as usize;
        self.read_string_into(chars, false, &mut string)?;
        Ok(string)
    }

    /// XLUnicodeRichExtendedString as stored in the SST; may span CONTINUE records,
    /// in which case each continuation restates the high-byte flag.
    pub(crate) fn read_xl_unicode_rich_extended_string(&mut self) -> Result<String, LabelError> {
        let mut string = String::new();
        let mut expected = self.read_u16()? as usize;
        let mut actual = self.read_string_into(expected, true, &mut string)?;
        while actual < expected {
            expected -= actual;
            let read = self.read_string_into(expected, false, &mut string)?;
            if read == 0 {
                Err(Biff8Error::NoEnoughDataError(expected))?;
            }
            actual = read;
        }
        Ok(string)
    }

    fn read_string_into(&mut self, chars: usize, is_extended: bool, content: &mut String) -> Result<usize, LabelError> {
        let flag = self.read_u8()?;
        let is_high_byte = (flag & 0x1) > 0;
        let rich_runs = if is_extended && (flag & 0x8) > 0 {
            self.read_u16()? as usize
        } else {
            0
        };
        let phonetic_size = if is_extended && (flag & 0x4) > 0 {
            self.read_usize()?
        } else {
            0
        };
        let expected = if is_high_byte { chars << 1 } else { chars };
        let (start, size) = self.read(expected);
        let bytes = &self.buffer[start..start + size];
        if is_high_byte {
            let (string, _) = UTF_16LE.decode_without_bom_handling(bytes);
            content.push_str(&string);
        } else {
            let (string, _) = self.encoding.decode_without_bom_handling(bytes);
            content.push_str(&string);
        }
        self.skip(4 * rich_runs)?;
        self.skip(phonetic_size)?;
        Ok(if is_high_byte { size >> 1 } else { size })
    }
}

#[macro_export]
macro_rules! match_biff8_record {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(kind) = $reader.next()? {
            match kind {
                $($arms)*
                _ => (),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: u16, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&kind.to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn joins_continue_records() {
        let mut data = record(0x0204, &[0x01, 0x02]);
        data.extend(record(CONTINUE, &[0x03, 0x04]));
        data.extend(record(0x000A, &[]));
        let mut reader = Biff8Reader::new(data);

        assert_eq!(reader.next().unwrap(), Some(0x0204));
        assert_eq!(reader.read_u32().unwrap(), 0x0403_0201);
        assert_eq!(reader.next().unwrap(), Some(0x000A));
        assert_eq!(reader.next().unwrap(), None);
    }

    #[test]
    fn decodes_compressed_and_wide_strings() {
        let mut payload = vec![3, 0, 0];
        payload.extend_from_slice(b"A-1");
        payload.extend_from_slice(&[2, 0, 1]);
        payload.extend_from_slice(&[0x4C, 0x00, 0x31, 0x00]);
        let mut reader = Biff8Reader::new(record(0x0204, &payload));
        reader.next().unwrap();

        assert_eq!(reader.read_xl_unicode_string().unwrap(), "A-1");
        assert_eq!(reader.read_xl_unicode_string().unwrap(), "L1");
    }

    #[test]
    fn decodes_rk_numbers() {
        // integer 42, then integer 1234 stored as percentage (12.34)
        let mut payload = Vec::new();
        payload.extend_from_slice(&((42u32 << 2) | 0x02).to_le_bytes());
        payload.extend_from_slice(&((1234u32 << 2) | 0x03).to_le_bytes());
        let mut reader = Biff8Reader::new(record(0x027E, &payload));
        reader.next().unwrap();

        assert_eq!(reader.read_rk_number().unwrap(), 42.0);
        assert_eq!(reader.read_rk_number().unwrap(), 12.34);
    }

    #[test]
    fn short_records_fail_instead_of_panicking() {
        let mut reader = Biff8Reader::new(record(0x0203, &[0x01]));
        reader.next().unwrap();
        assert!(reader.read_u16().is_err());
    }
}
