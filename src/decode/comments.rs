/// Blank out `//` and `/* */` comments, and commas directly followed by
/// `}` or `]`, by overwriting them with spaces. Newlines inside comments are
/// kept, so offsets, lines and columns of the remaining text are unchanged.
///
/// Quoted strings (either quote style) and `/regex/` literals are left as
/// they are.
pub fn strip_comments(buf: &mut [u8]) {
    let mut pos = 0;
    let mut pending_comma: Option<usize> = None;
    while pos < buf.len() {
        match buf[pos] {
            0 => return,
            quote @ (b'"' | b'\'') => {
                pending_comma = None;
                pos = skip_quoted(buf, pos, quote);
            }
            b'/' => match buf.get(pos + 1) {
                Some(b'/') => {
                    let end = buf[pos..]
                        .iter()
                        .position(|&b| b == b'\n' || b == 0)
                        .map_or(buf.len(), |offset| pos + offset);
                    buf[pos..end].fill(b' ');
                    pos = end;
                }
                Some(b'*') => {
                    let end = buf[pos + 2..]
                        .windows(2)
                        .position(|pair| pair == b"*/")
                        .map_or(buf.len(), |offset| pos + 2 + offset + 2);
                    for byte in &mut buf[pos..end] {
                        if *byte != b'\n' {
                            *byte = b' ';
                        }
                    }
                    pos = end;
                }
                _ => {
                    pending_comma = None;
                    pos = skip_regex(buf, pos);
                }
            },
            b',' => {
                pending_comma = Some(pos);
                pos += 1;
            }
            b'}' | b']' => {
                if let Some(comma) = pending_comma.take() {
                    buf[comma] = b' ';
                }
                pos += 1;
            }
            b' ' | b'\t' | b'\r' | b'\n' => pos += 1,
            _ => {
                pending_comma = None;
                pos += 1;
            }
        }
    }
}

fn skip_quoted(buf: &[u8], start: usize, quote: u8) -> usize {
    let mut pos = start + 1;
    while let Some(&byte) = buf.get(pos) {
        match byte {
            b'\\' => pos += 2,
            0 => return pos,
            _ if byte == quote => return pos + 1,
            _ => pos += 1,
        }
    }
    buf.len()
}

fn skip_regex(buf: &[u8], start: usize) -> usize {
    let mut pos = start + 1;
    while let Some(&byte) = buf.get(pos) {
        match byte {
            b'\\' => pos += 2,
            b'/' => return pos + 1,
            b'\n' | 0 => return pos,
            _ => pos += 1,
        }
    }
    buf.len()
}
