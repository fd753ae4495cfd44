//! A1-style cell references.

/// `(0, 0)` -> `"A1"`.
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    let mut letters = Vec::new();
    let mut remaining = col + 1;
    while remaining > 0 {
        remaining -= 1;
        letters.push(b'A' + (remaining % 26) as u8);
        remaining /= 26;
    }
    letters.reverse();
    let mut reference: String = letters.into_iter().map(char::from).collect();
    reference.push_str(&(row + 1).to_string());
    reference
}

/// Column letters to a 0-based index; `None` for anything but ASCII letters.
pub(crate) fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0usize, |index, letter| {
        letter
            .is_ascii_alphabetic()
            .then(|| index * 26 + (letter.to_ascii_uppercase() as usize - 'A' as usize + 1))
    }).map(|index| index - 1)
}

/// 1-based row number to a 0-based index.
pub(crate) fn row_to_index(digits: &str) -> Option<usize> {
    digits.parse::<usize>().ok().and_then(|row| row.checked_sub(1))
}

/// `"B3"` -> `(2, 1)`. Absolute markers (`$B$3`) are accepted.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    Some((row_to_index(digits)?, col_to_index(letters)?))
}
