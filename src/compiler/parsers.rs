pub(super) fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    if bytes.get(idx) == Some(&b'#') {
        return true;
    }
    // MySQL only treats `--` as a comment when followed by whitespace or end of input.
    bytes.get(idx) == Some(&b'-')
        && bytes.get(idx + 1) == Some(&b'-')
        && bytes.get(idx + 2).is_none_or(u8::is_ascii_whitespace)
}

pub(super) fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

pub(super) fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

pub(super) fn keyword_eq(word: &[u8], keyword: &str) -> bool {
    word.eq_ignore_ascii_case(keyword.as_bytes())
}
