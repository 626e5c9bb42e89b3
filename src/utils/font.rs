//! Small-caps text styling used by `/font`.

/// Latin and Cyrillic letters with a small-caps lookalike. Anything not
/// listed passes through unchanged.
const SMALL_CAPS: &[(char, char)] = &[
    ('a', 'ᴀ'),
    ('b', 'ʙ'),
    ('c', 'ᴄ'),
    ('d', 'ᴅ'),
    ('e', 'ᴇ'),
    ('f', 'ꜰ'),
    ('g', 'ɢ'),
    ('h', 'ʜ'),
    ('i', 'ɪ'),
    ('j', 'ᴊ'),
    ('k', 'ᴋ'),
    ('l', 'ʟ'),
    ('m', 'ᴍ'),
    ('n', 'ɴ'),
    ('o', 'ᴏ'),
    ('p', 'ᴘ'),
    ('q', 'ǫ'),
    ('r', 'ʀ'),
    ('s', 'ꜱ'),
    ('t', 'ᴛ'),
    ('u', 'ᴜ'),
    ('v', 'ᴠ'),
    ('w', 'ᴡ'),
    ('y', 'ʏ'),
    ('z', 'ᴢ'),
    ('а', 'ᴀ'),
    ('в', 'ʙ'),
    ('г', 'ᴦ'),
    ('е', 'ᴇ'),
    ('и', 'ᴎ'),
    ('к', 'ᴋ'),
    ('л', 'ʌ'),
    ('м', 'ᴍ'),
    ('н', 'ʜ'),
    ('о', 'ᴏ'),
    ('п', 'ᴨ'),
    ('р', 'ᴘ'),
    ('с', 'ᴄ'),
    ('т', 'ᴛ'),
    ('х', 'x'),
    ('і', 'ɪ'),
    ('я', 'ᴙ'),
];

fn small_cap(c: char) -> char {
    SMALL_CAPS
        .iter()
        .find(|(plain, _)| *plain == c)
        .map(|(_, styled)| *styled)
        .unwrap_or(c)
}

/// Restyle `text` in small caps. Case is folded first, so `A` and `a` match.
pub fn stylize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(small_cap)
        .collect()
}
