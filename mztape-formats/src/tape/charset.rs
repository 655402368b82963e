/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of MZTAPE, a Rust library for recovering Sharp MZ cassette files.

    For the full copyright notice, see the lib.rs file.
*/
//! Sharp MZ display code to text conversion.
//!
//! Sharp ASCII places lower case letters at scattered positions above `0x80`. Only those
//! are remapped, every other byte is passed through as the character with the same code.

const LOWER_CASE: [(u8, char); 28] = [
    (146, 'e'), (147, '~'), (148, '~'), (150, 't'), (151, 'g'), (152, 'h'), (154, 'b'),
    (155, 'x'), (156, 'd'), (157, 'r'), (158, 'p'), (159, 'c'), (160, 'q'), (161, 'a'),
    (162, 'z'), (163, 'w'), (164, 's'), (165, 'u'), (166, 'i'), (169, 'k'), (170, 'f'),
    (171, 'v'), (175, 'j'), (176, 'n'), (179, 'm'), (183, 'o'), (184, 'l'), (189, 'y'),
];

const fn charset_table() -> [char; 256] {
    let mut table = ['\0'; 256];
    let mut i = 0;
    while i < table.len() {
        table[i] = i as u8 as char;
        i += 1;
    }
    let mut i = 0;
    while i < LOWER_CASE.len() {
        let (code, ch) = LOWER_CASE[i];
        table[code as usize] = ch;
        i += 1;
    }
    table
}

static CHARSET: [char; 256] = charset_table();

/// Converts a single Sharp ASCII byte to a character.
#[inline]
pub fn decode_byte(code: u8) -> char {
    CHARSET[code as usize]
}

/// Converts Sharp ASCII bytes to text.
pub fn decode<B: AsRef<[u8]>>(bytes: B) -> String {
    bytes.as_ref().iter().map(|&code| decode_byte(code)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_works() {
        assert_eq!("tAr", decode([150, 65, 157]));
        assert_eq!("hello world", decode([152, 146, 184, 184, 183, b' ', 163, 183, 157, 184, 156]));
        assert_eq!("", decode(b""));
        assert_eq!("MZ-700\r", decode(b"MZ-700\r"));
    }

    #[test]
    fn decode_byte_works() {
        for &(code, ch) in LOWER_CASE.iter() {
            assert_eq!(ch, decode_byte(code));
        }
        let mapped = (0..=255u8).filter(|&code| decode_byte(code) != char::from(code)).count();
        assert_eq!(LOWER_CASE.len(), mapped);
        assert_eq!('\u{91}', decode_byte(145));
        assert_eq!('\u{ff}', decode_byte(255));
        assert_eq!('\0', decode_byte(0));
    }
}
