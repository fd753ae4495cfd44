use regex::Regex;
use std::sync::LazyLock;

/// Number of coloured cells in a label's location strip.
pub const TOKEN_COUNT: usize = 7;

/// Positional fields of a location string; missing trailing fields are empty.
pub type LocationTokens = [String; TOKEN_COUNT];

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^_\s]+").expect("Hardcode regex pattern"));

/// Splits on underscores and whitespace only; hyphens stay inside their token.
/// Tokens past the seventh are dropped.
pub fn tokenize(location: &str) -> LocationTokens {
    let mut tokens = LocationTokens::default();
    for (slot, token) in tokens.iter_mut().zip(TOKEN_PATTERN.find_iter(location)) {
        *slot = token.as_str().to_owned();
    }
    tokens
}
