//! `*` and `?` glob matching over characters

/// Match `text` against `pattern`, where `*` matches any run of characters
/// (including none) and `?` matches exactly one
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Pattern index after the last star and the text index it resumes from
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                p += 1;
                backtrack = Some((p, t));
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star_p, star_t)) => {
                    p = star_p;
                    t = star_t + 1;
                    backtrack = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Leading part of `pattern` before the first wildcard
pub fn literal_prefix(pattern: &str) -> &str {
    pattern
        .find(['*', '?'])
        .map_or(pattern, |wildcard| &pattern[..wildcard])
}

/// True when `pattern` contains no wildcard
#[inline]
pub fn is_literal(pattern: &str) -> bool {
    !pattern.contains(['*', '?'])
}
