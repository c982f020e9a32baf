use crate::error::ParseError;
use crate::template_ast::{Node, TemplateAttr};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Parses markup with exactly one root element. Whitespace and comments
/// around the root are ignored.
pub fn parse_template(input: &str) -> Result<Node, ParseError> {
    let nodes = parse_fragment(input)?;
    let mut roots: Vec<Node> = nodes
        .into_iter()
        .filter(|n| matches!(n, Node::Element { .. }))
        .collect();
    match roots.len() {
        0 => Err(ParseError::Empty),
        1 => Ok(roots.remove(0)),
        count => Err(ParseError::RootCount { count }),
    }
}

/// Minimal hand-rolled HTML-ish reader with support for:
/// - nested elements, self-closing tags (`<input/>`) and void elements
/// - quoted, bare and boolean attributes
/// - comments
/// - text and attribute values containing `${ ... }` / `{{ ... }}` spans,
///   which are kept verbatim (a `<` inside a span does not open a tag)
pub fn parse_fragment(input: &str) -> Result<Vec<Node>, ParseError> {
    let bytes = input.as_bytes();
    let mut i = 0usize;
    // (tag, attrs, children, offset of the opening `<`)
    let mut stack: Vec<(String, Vec<TemplateAttr>, Vec<Node>, usize)> = Vec::new();
    let mut roots: Vec<Node> = Vec::new();

    fn push_child(
        stack: &mut [(String, Vec<TemplateAttr>, Vec<Node>, usize)],
        roots: &mut Vec<Node>,
        node: Node,
    ) {
        if let Some((_, _, children, _)) = stack.last_mut() {
            children.push(node);
        } else {
            roots.push(node);
        }
    }

    while i < bytes.len() {
        if bytes[i] == b'<' && input[i..].starts_with("<!--") {
            let start = i;
            let Some(len) = input[i + 4..].find("-->") else {
                return Err(ParseError::Unterminated {
                    what: "comment",
                    offset: start,
                });
            };
            let data = input[i + 4..i + 4 + len].to_string();
            i += 4 + len + 3;
            push_child(&mut stack, &mut roots, Node::Comment(data));
        } else if bytes[i] == b'<' && input[i..].starts_with("<!") {
            // doctype and friends carry nothing for a template
            match input[i..].find('>') {
                Some(len) => i += len + 1,
                None => {
                    return Err(ParseError::Unterminated {
                        what: "declaration",
                        offset: i,
                    });
                }
            }
        } else if bytes[i] == b'<' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
            // closing tag
            let start = i;
            i += 2;
            let tag = read_ident(bytes, &mut i);
            skip_ws(bytes, &mut i);
            if i < bytes.len() && bytes[i] == b'>' {
                i += 1;
            }
            let Some((open, attrs, children, _)) = stack.pop() else {
                return Err(ParseError::UnexpectedClosingTag { tag, offset: start });
            };
            if open != tag {
                return Err(ParseError::MismatchedTag {
                    expected: open,
                    found: tag,
                    offset: start,
                });
            }
            push_child(
                &mut stack,
                &mut roots,
                Node::Element {
                    tag: open,
                    attrs,
                    children,
                },
            );
        } else if bytes[i] == b'<' {
            // opening or self-closing tag
            let start = i;
            i += 1;
            let tag = read_ident(bytes, &mut i);
            if tag.is_empty() {
                return Err(ParseError::MissingTagName { offset: start });
            }
            let mut attrs: Vec<TemplateAttr> = Vec::new();
            let mut self_closing = false;
            let mut closed = false;

            while i < bytes.len() {
                skip_ws(bytes, &mut i);
                if i >= bytes.len() {
                    break;
                }
                match bytes[i] {
                    b'/' => {
                        self_closing = true;
                        i += 1;
                    }
                    b'>' => {
                        i += 1;
                        closed = true;
                        break;
                    }
                    _ => {
                        if let Some(attr) = read_attribute(bytes, &mut i)? {
                            attrs.push(attr);
                        } else {
                            // skip unknown token
                            i += 1;
                        }
                    }
                }
            }
            if !closed {
                return Err(ParseError::Unterminated {
                    what: "tag",
                    offset: start,
                });
            }

            if self_closing || VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str()) {
                push_child(
                    &mut stack,
                    &mut roots,
                    Node::Element {
                        tag,
                        attrs,
                        children: Vec::new(),
                    },
                );
            } else {
                stack.push((tag, attrs, Vec::new(), start));
            }
        } else {
            // text until the next '<' that is not inside an expression span
            let start = i;
            while i < bytes.len() && bytes[i] != b'<' {
                if let Some(end) = span_end(bytes, i) {
                    i = end;
                } else {
                    i += 1;
                }
            }
            let text = decode_entities(&input[start..i]);
            push_child(&mut stack, &mut roots, Node::Text(text));
        }
    }

    if let Some((tag, _, _, offset)) = stack.pop() {
        return Err(ParseError::UnclosedTag { tag, offset });
    }

    Ok(roots)
}

/// If an expression span opens at `i`, the byte offset just past its close.
/// An unterminated span runs to the end of input; the extractor reports it.
fn span_end(bytes: &[u8], i: usize) -> Option<usize> {
    let close: &[u8] = match (bytes.get(i), bytes.get(i + 1)) {
        (Some(b'$'), Some(b'{')) => b"}",
        (Some(b'{'), Some(b'{')) => b"}}",
        _ => return None,
    };
    let body = i + 2;
    let found = bytes[body..]
        .windows(close.len())
        .position(|w| w == close);
    Some(found.map_or(bytes.len(), |p| body + p + close.len()))
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && (bytes[*i] as char).is_whitespace() {
        *i += 1;
    }
}

fn read_ident(bytes: &[u8], i: &mut usize) -> String {
    let start = *i;
    while *i < bytes.len() {
        let c = bytes[*i] as char;
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ':' {
            *i += 1;
        } else {
            break;
        }
    }
    String::from_utf8_lossy(&bytes[start..*i]).into_owned()
}

fn read_attribute(bytes: &[u8], i: &mut usize) -> Result<Option<TemplateAttr>, ParseError> {
    let name_start = *i;
    while *i < bytes.len() {
        let c = bytes[*i] as char;
        if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '@' | '.') {
            *i += 1;
        } else {
            break;
        }
    }
    if *i == name_start {
        return Ok(None);
    }
    let name = String::from_utf8_lossy(&bytes[name_start..*i]).into_owned();

    skip_ws(bytes, i);
    let mut value = String::new();
    if *i < bytes.len() && bytes[*i] == b'=' {
        *i += 1;
        skip_ws(bytes, i);
        value = match read_quoted(bytes, i)? {
            Some(v) => v,
            None => read_bare(bytes, i),
        };
    }

    Ok(Some(TemplateAttr {
        name,
        value: decode_entities(&value),
    }))
}

fn read_quoted(bytes: &[u8], i: &mut usize) -> Result<Option<String>, ParseError> {
    if *i >= bytes.len() {
        return Ok(None);
    }
    let quote = bytes[*i];
    if quote != b'"' && quote != b'\'' {
        return Ok(None);
    }
    let open = *i;
    *i += 1;
    let start = *i;
    while *i < bytes.len() && bytes[*i] != quote {
        *i += 1;
    }
    if *i >= bytes.len() {
        return Err(ParseError::Unterminated {
            what: "attribute value",
            offset: open,
        });
    }
    let s = String::from_utf8_lossy(&bytes[start..*i]).into_owned();
    *i += 1; // consume closing quote
    Ok(Some(s))
}

/// Unquoted value: up to whitespace or `>`, except that a leading expression
/// span is read whole so `a=${x ? 1 : 2}` works.
fn read_bare(bytes: &[u8], i: &mut usize) -> String {
    let start = *i;
    if let Some(end) = span_end(bytes, start) {
        *i = end;
    }
    while *i < bytes.len() {
        let c = bytes[*i] as char;
        if c.is_whitespace() || c == '>' || (c == '/' && bytes.get(*i + 1) == Some(&b'>')) {
            break;
        }
        *i += 1;
    }
    String::from_utf8_lossy(&bytes[start..*i]).into_owned()
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}
