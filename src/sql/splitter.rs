/// Scanner state while walking a script left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    /// Inside a '...' string literal.
    SingleQuoted,
    /// Inside a "..." quoted identifier.
    DoubleQuoted,
    /// Inside a $tag$...$tag$ block; the value is the byte length of the
    /// opening delimiter (tag included).
    DollarQuoted(usize),
}

/// Split a multi-statement SQL script into individual statements.
///
/// Semicolons terminate statements only in the normal state; inside single
/// quotes, double-quoted identifiers, or dollar-quoted blocks they are
/// literal content, so function and procedure bodies survive intact.
/// Statements are trimmed and empty ones dropped. Pure and deterministic:
/// the same input always yields the same statement list.
pub fn split_statements(src: &str) -> Vec<String> {
    let bytes = src.as_bytes();
    let mut statements = Vec::new();
    let mut state = State::Normal;
    let mut delim_start = 0;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match state {
            State::Normal => match bytes[i] {
                b';' => {
                    push_statement(&mut statements, &src[start..i]);
                    start = i + 1;
                    i += 1;
                }
                b'\'' => {
                    state = State::SingleQuoted;
                    i += 1;
                }
                b'"' => {
                    state = State::DoubleQuoted;
                    i += 1;
                }
                b'$' => {
                    if let Some(len) = dollar_delimiter(bytes, i) {
                        state = State::DollarQuoted(len);
                        delim_start = i;
                        i += len;
                    } else {
                        i += 1;
                    }
                }
                _ => i += 1,
            },
            State::SingleQuoted => {
                if bytes[i] == b'\'' {
                    state = State::Normal;
                }
                i += 1;
            }
            State::DoubleQuoted => {
                if bytes[i] == b'"' {
                    state = State::Normal;
                }
                i += 1;
            }
            State::DollarQuoted(len) => {
                let delim = &bytes[delim_start..delim_start + len];
                if bytes[i..].starts_with(delim) {
                    state = State::Normal;
                    i += len;
                } else {
                    i += 1;
                }
            }
        }
    }

    push_statement(&mut statements, &src[start..]);
    statements
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}

/// Length of a dollar-quote delimiter starting at `pos`, if one opens there.
/// A delimiter is `$`, an optional identifier tag, and a closing `$`.
fn dollar_delimiter(bytes: &[u8], pos: usize) -> Option<usize> {
    debug_assert_eq!(bytes[pos], b'$');
    let mut j = pos + 1;
    while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
        j += 1;
    }
    if j < bytes.len() && bytes[j] == b'$' {
        Some(j - pos + 1)
    } else {
        None
    }
}
