//! Base-14 Helvetica metrics and WinAnsi text encoding.

use crate::labels::compose::Font;
use encoding_rs::WINDOWS_1252;

/// Ascender and descender of both Helvetica faces, in thousandths of the font size.
pub(crate) const ASCENT: f32 = 718.0;
pub(crate) const DESCENT: f32 = 207.0;

const FALLBACK_WIDTH: u16 = 556;

// Advance widths of the printable ASCII range, 0x20..=0x7E.
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

impl Font {
    /// Resource name inside each page.
    pub(crate) fn resource(self) -> &'static [u8] {
        match self {
            Font::Helvetica => b"F1",
            Font::HelveticaBold => b"F2",
        }
    }

    pub(crate) fn base_font(self) -> &'static [u8] {
        match self {
            Font::Helvetica => b"Helvetica",
            Font::HelveticaBold => b"Helvetica-Bold",
        }
    }

    fn widths(self) -> &'static [u16; 95] {
        match self {
            Font::Helvetica => &HELVETICA,
            Font::HelveticaBold => &HELVETICA_BOLD,
        }
    }

    /// Advance width of one WinAnsi byte. Accented Latin-1 letters use their base letter.
    fn advance(self, byte: u8) -> u16 {
        let byte = match byte {
            0xC0..=0xC5 => b'A',
            0xC7 => b'C',
            0xC8..=0xCB => b'E',
            0xCC..=0xCF => b'I',
            0xD1 => b'N',
            0xD2..=0xD6 | 0xD8 => b'O',
            0xD9..=0xDC => b'U',
            0xDD => b'Y',
            0xE0..=0xE5 => b'a',
            0xE7 => b'c',
            0xE8..=0xEB => b'e',
            0xEC..=0xEF => b'i',
            0xF1 => b'n',
            0xF2..=0xF6 | 0xF8 => b'o',
            0xF9..=0xFC => b'u',
            0xFD | 0xFF => b'y',
            other => other,
        };
        match byte {
            0x20..=0x7E => self.widths()[(byte - 0x20) as usize],
            _ => FALLBACK_WIDTH,
        }
    }

    /// Width of encoded text at `size` points.
    pub(crate) fn measure(self, encoded: &[u8], size: f32) -> f32 {
        let units: u32 = encoded.iter().map(|byte| self.advance(*byte) as u32).sum();
        units as f32 * size / 1000.0
    }
}

/// Encodes text for a simple font with WinAnsiEncoding.
/// Control characters become spaces and anything outside Windows-1252 becomes `?`.
pub(crate) fn encode(text: &str) -> Vec<u8> {
    let mut buffer = [0u8; 4];
    text.chars()
        .map(|character| {
            if character.is_control() {
                return b' ';
            }
            let (bytes, _, unmappable) = WINDOWS_1252.encode(character.encode_utf8(&mut buffer));
            match bytes.as_ref() {
                [byte] if !unmappable => *byte,
                _ => b'?',
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_win_ansi() {
        assert_eq!(encode("Bäck-01"), b"B\xE4ck-01");
        assert_eq!(encode("5\u{20AC}"), b"5\x80");
        assert_eq!(encode("a\tb"), b"a b");
        assert_eq!(encode("\u{4E2D}\u{6587}"), b"??");
    }

    #[test]
    fn measures_with_afm_widths() {
        let encoded = encode("Part No");
        assert_eq!(Font::Helvetica.measure(&encoded, 10.0), (667 + 556 + 333 + 278 + 278 + 722 + 556) as f32 / 100.0);
        assert!(Font::HelveticaBold.measure(&encoded, 10.0) > Font::Helvetica.measure(&encoded, 10.0));
        assert_eq!(Font::Helvetica.measure(&encode("Ä"), 1000.0), Font::Helvetica.measure(b"A", 1000.0));
    }
}
