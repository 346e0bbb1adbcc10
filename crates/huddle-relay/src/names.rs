//! Display-name generation, sanitizing, and per-room disambiguation.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "amber", "brisk", "calm", "cedar", "coral", "crisp", "dusky", "ember", "fable", "frosty",
    "gentle", "golden", "hazel", "hollow", "ivory", "jolly", "lucky", "lunar", "maple", "mellow",
    "misty", "noble", "olive", "quiet", "rapid", "rustic", "silver", "sunny", "swift", "tidal",
    "velvet", "wild",
];

const NOUNS: &[&str] = &[
    "badger", "bison", "brook", "canyon", "comet", "crane", "delta", "falcon", "fern", "finch",
    "fox", "glacier", "grove", "harbor", "heron", "lark", "lynx", "marsh", "meadow", "moth",
    "otter", "owl", "pine", "raven", "reef", "ridge", "sparrow", "summit", "thistle", "vale",
    "willow", "wren",
];

/// Pick a random `adjective-noun` name.
pub fn generate_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("quiet");
    let noun = NOUNS.choose(rng).copied().unwrap_or("owl");
    format!("{adjective}-{noun}")
}

/// Strip a requested name down to letters, digits, space, `-`, `_` and `.`,
/// collapse whitespace, and cap it at `max_len` characters.
///
/// Returns an empty string when nothing usable is left.
pub fn sanitize(raw: &str, max_len: usize) -> String {
    let filtered: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
        .collect();
    let collapsed = filtered.split_whitespace().collect::<Vec<_>>().join(" ");
    let capped: String = collapsed.chars().take(max_len).collect();
    capped.trim().to_string()
}

/// Make `base` unique among `taken`, comparing case-insensitively.
///
/// The first free of `base`, `base-2`, `base-3`, ... is returned. The base
/// is shortened as needed so a suffixed name stays within `max_len`
/// characters.
pub fn disambiguate<'a, I>(base: &str, taken: I, max_len: usize) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: HashSet<String> = taken.into_iter().map(str::to_lowercase).collect();
    if !taken.contains(&base.to_lowercase()) {
        return base.to_string();
    }
    let mut n = 2u32;
    loop {
        let suffix = format!("-{n}");
        let room = max_len.saturating_sub(suffix.len()).max(1);
        let stem: String = base.chars().take(room).collect();
        let candidate = format!("{}{suffix}", stem.trim_end());
        if !taken.contains(&candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}
