/// Extracts file names from a raw `LIST` response
///
/// Each non-empty line contributes its last whitespace-separated token, so
/// `ls -l` style output yields the bare names in server order. Lines that
/// consist of a single token are returned as-is.
pub fn parse_listing(raw: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(raw);
    text.split('\n')
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split_whitespace().last())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ls_style_listing() {
        let raw = b"drwxr-xr-x 1 ftp ftp              0 Jan 00 00:00 d1\n\
                    drwxr-xr-x 1 ftp ftp              0 Jan 00 00:00 d2\n\
                    -rw-r--r-- 1 ftp ftp              0 Jan 00 00:00 f1.txt\n";
        assert_eq!(parse_listing(raw), vec!["d1", "d2", "f1.txt"]);
    }

    #[test]
    fn test_parse_empty_listing() {
        assert!(parse_listing(b"").is_empty());
        assert!(parse_listing(b"\n\n").is_empty());
    }

    #[test]
    fn test_single_token_lines() {
        assert_eq!(parse_listing(b"alpha\nbeta\r\n"), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_whitespace_only_line_is_skipped() {
        // No token to take; the line contributes nothing.
        assert_eq!(parse_listing(b"   \nname\n"), vec!["name"]);
    }
}
