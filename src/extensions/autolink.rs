//! Links recognized without angle brackets: `www.` hosts, `http://`,
//! `https://` and `ftp://` URLs, and email addresses.
//!
//! The URL and email matchers trigger on `:` and `@`, after the text in
//! front of them was already emitted, so they take it back with
//! [`Subject::unput`]. A match inside brackets stops at `]`, and dissolves
//! back into text if the brackets turn into a link.
use super::Extension;
use crate::ast::{NodeLink, NodeValue};
use crate::inlines::Subject;
use crate::options::Options;
use indextree::NodeId;

const SCHEMES: [&str; 3] = ["http", "https", "ftp"];

/// Longest host name accepted, as in DNS.
const MAX_DOMAIN_LEN: usize = 253;

pub fn extension() -> Extension {
    Extension::new("autolink", Options::AUTOLINK).with_inline(b":@w", match_autolink)
}

fn match_autolink(subject: &mut Subject<'_>, c: u8) -> Option<NodeId> {
    match c {
        b':' => url_match(subject),
        b'w' => www_match(subject),
        b'@' => email_match(subject),
        _ => None,
    }
}

fn is_host_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c >= 0x80
}

/// Length of the domain at the start of `data`. Underscores are refused in
/// the last two labels.
fn domain_len(data: &[u8], need_dot: bool) -> Option<usize> {
    if !data.first().copied().is_some_and(is_host_char) {
        return None;
    }
    let (mut dots, mut prev_underscores, mut underscores) = (0, 0, 0);
    let mut i = 0;
    while let Some(&c) = data.get(i) {
        if i == MAX_DOMAIN_LEN {
            return None;
        }
        match c {
            b'_' => underscores += 1,
            b'.' => {
                prev_underscores = underscores;
                underscores = 0;
                dots += 1;
            }
            b'-' => {}
            c if is_host_char(c) => {}
            _ => break,
        }
        i += 1;
    }
    if prev_underscores > 0 || underscores > 0 || (need_dot && dots == 0) {
        return None;
    }
    Some(i)
}

/// Drop trailing punctuation that more likely ends the sentence than the
/// link: `?!.,:*_~'"`, a trailing entity reference, and unbalanced `)`.
fn trim_delimiters(link: &[u8], mut end: usize) -> usize {
    let opening = link[..end].iter().filter(|&&c| c == b'(').count();
    let mut closing = link[..end].iter().filter(|&&c| c == b')').count();
    while end > 0 {
        match link[end - 1] {
            b'?' | b'!' | b'.' | b',' | b':' | b'*' | b'_' | b'~' | b'\'' | b'"' => end -= 1,
            b';' => {
                let name = link[..end - 1]
                    .iter()
                    .rev()
                    .take_while(|c| c.is_ascii_alphanumeric())
                    .count();
                if name > 0 && end >= name + 2 && link[end - 2 - name] == b'&' {
                    end -= name + 2;
                } else {
                    end -= 1;
                }
            }
            b')' => {
                if closing <= opening {
                    break;
                }
                closing -= 1;
                end -= 1;
            }
            _ => break,
        }
    }
    end
}

/// The link runs to the next whitespace or `<`, or `]` while a bracket is
/// open, minus trailing delimiters.
fn link_len(data: &[u8], in_bracket: bool) -> usize {
    let end = data
        .iter()
        .position(|&c| c.is_ascii_whitespace() || c == b'<' || (in_bracket && c == b']'))
        .unwrap_or(data.len());
    trim_delimiters(data, end)
}

fn url_match(subject: &mut Subject<'_>) -> Option<NodeId> {
    let input = subject.input();
    let bytes = input.as_bytes();
    let pos = subject.pos();
    if bytes.get(pos + 1..pos + 3)? != b"//" {
        return None;
    }
    let rewind = bytes[..pos].iter().rev().take_while(|c| c.is_ascii_alphabetic()).count();
    let start = pos - rewind;
    let scheme = &input[start..pos];
    if !SCHEMES.iter().any(|s| scheme.eq_ignore_ascii_case(s)) {
        return None;
    }
    domain_len(&bytes[pos + 3..], false)?;

    let end = start + link_len(&bytes[start..], subject.in_bracket());
    if end <= pos + 3 {
        return None;
    }
    Some(make_link(subject, start, end, rewind, input[start..end].to_string()))
}

fn www_match(subject: &mut Subject<'_>) -> Option<NodeId> {
    let input = subject.input();
    let bytes = input.as_bytes();
    let pos = subject.pos();
    if let Some(&prev) = pos.checked_sub(1).and_then(|p| bytes.get(p))
        && !prev.is_ascii_whitespace()
        && !b"*_~(".contains(&prev)
    {
        return None;
    }
    if !bytes[pos..].starts_with(b"www.") {
        return None;
    }
    domain_len(&bytes[pos..], true)?;

    let end = pos + link_len(&bytes[pos..], subject.in_bracket());
    if end <= pos + 4 {
        return None;
    }
    Some(make_link(subject, pos, end, 0, format!("http://{}", &input[pos..end])))
}

fn email_match(subject: &mut Subject<'_>) -> Option<NodeId> {
    let input = subject.input();
    let bytes = input.as_bytes();
    let pos = subject.pos();

    let mut rewind = 0;
    for &c in bytes[..pos].iter().rev() {
        match c {
            c if c.is_ascii_alphanumeric() || b".+-_".contains(&c) => rewind += 1,
            b'/' => return None,
            _ => break,
        }
    }
    if rewind == 0 {
        return None;
    }

    let data = &bytes[pos..];
    let (mut at_signs, mut dots) = (0, 0);
    let mut len = 0;
    while let Some(&c) = data.get(len) {
        match c {
            c if c.is_ascii_alphanumeric() => {}
            b'@' => {
                at_signs += 1;
                if at_signs > 1 {
                    break;
                }
            }
            b'.' if data.get(len + 1).is_some_and(u8::is_ascii_alphanumeric) => dots += 1,
            b'-' | b'_' => {}
            _ => break,
        }
        len += 1;
    }
    let last = data[len.saturating_sub(1)];
    if len < 2 || at_signs != 1 || dots == 0 || !(last.is_ascii_alphabetic() || last == b'.') {
        return None;
    }
    let len = trim_delimiters(data, len);
    if len < 2 {
        return None;
    }

    let start = pos - rewind;
    let end = pos + len;
    Some(make_link(subject, start, end, rewind, format!("mailto:{}", &input[start..end])))
}

/// A link over `start..end` whose text is the matched source, after taking
/// back the `rewind` bytes already emitted as text.
fn make_link(subject: &mut Subject<'_>, start: usize, end: usize, rewind: usize, url: String) -> NodeId {
    let text = &subject.input()[start..end];
    subject.unput(rewind);
    subject.set_pos(end);
    let link = subject.make_node(
        NodeValue::Link(NodeLink {
            url,
            title: String::new(),
        }),
        start,
        end,
    );
    let child = subject.make_text(text, start, end);
    link.append(child, subject.arena_mut());
    subject.dissolve_if_nested(link, start);
    link
}
