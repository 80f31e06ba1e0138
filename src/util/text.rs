use std::borrow::Cow;
use std::iter::Peekable;
use std::str::Chars;

const ESC: char = '\x1b';
const BEL: char = '\x07';

fn is_stripped(c: char) -> bool {
    c == ESC || c == '\x7f' || (c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r'))
}

/// Remove terminal control sequences from text that came off the network.
///
/// Feed titles and descriptions are printed straight to the terminal by
/// `browse` and `agg`. Removes:
///
/// - CSI sequences (`ESC [` ... final byte in `0x40..=0x7e`)
/// - OSC sequences (`ESC ]` ... terminated by BEL or `ESC \`)
/// - Any other C0 control character and DEL
///
/// Tab, newline and carriage return are kept. Clean input is returned borrowed.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ESC {
            skip_escape(&mut chars);
        } else if !is_stripped(c) {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Consume the remainder of an escape sequence whose ESC was already read
fn skip_escape(chars: &mut Peekable<Chars<'_>>) {
    match chars.peek() {
        Some('[') => {
            chars.next();
            for c in chars.by_ref() {
                if ('\x40'..='\x7e').contains(&c) {
                    break;
                }
            }
        }
        Some(']') => {
            chars.next();
            while let Some(c) = chars.next() {
                if c == BEL {
                    break;
                }
                if c == ESC && chars.peek() == Some(&'\\') {
                    chars.next();
                    break;
                }
            }
        }
        _ => {}
    }
}
