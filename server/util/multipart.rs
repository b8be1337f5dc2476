/// Returns the index of the first occurrence of `needle` in `haystack`.
pub fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Splits `haystack` on every occurrence of `needle`, returning the pieces
/// between occurrences (excluding the needle itself).
pub fn split_on<'a>(haystack: &'a [u8], needle: &[u8]) -> Vec<&'a [u8]> {
    let mut result = Vec::new();
    let mut start = 0;
    while start <= haystack.len() {
        if let Some(pos) = find_subsequence(&haystack[start..], needle) {
            result.push(&haystack[start..start + pos]);
            start += pos + needle.len();
        } else {
            result.push(&haystack[start..]);
            break;
        }
    }
    result
}

/// Extracts the boundary token from a Content-Type header value like
/// `multipart/form-data; boundary=----WebKitFormBoundaryXXX`.
pub fn extract_boundary(content_type: &str) -> Option<String> {
    let mut params = content_type.split(';').map(|s| s.trim());
    let mime = params.next()?;
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    params
        .find_map(|s| {
            let (key, value) = s.split_once('=')?;
            key.trim().eq_ignore_ascii_case("boundary").then(|| value.trim().trim_matches('"').to_owned())
        })
        .filter(|b| !b.is_empty())
}

/// One part of a multipart/form-data body.
#[derive(Debug, PartialEq)]
pub struct Part<'a> {
    /// `name="..."` from Content-Disposition.
    pub name: Option<String>,
    /// `filename="..."`; present (possibly empty) only for file inputs.
    pub filename: Option<String>,
    pub data: &'a [u8],
}

/// Splits a multipart body into its parts. Preamble, epilogue and parts
/// without a header/body separator are skipped.
pub fn parse_parts<'a>(body: &'a [u8], boundary: &str) -> Vec<Part<'a>> {
    let delimiter = format!("--{}", boundary);
    let sep = b"\r\n\r\n";

    split_on(body, delimiter.as_bytes())
        .into_iter()
        .skip(1)
        .filter_map(|raw| {
            // Closing delimiter is `--boundary--`.
            if raw.starts_with(b"--") {
                return None;
            }
            let raw = raw.strip_prefix(b"\r\n").unwrap_or(raw);
            let sep_pos = find_subsequence(raw, sep)?;
            let headers = String::from_utf8_lossy(&raw[..sep_pos]);
            let data = &raw[sep_pos + sep.len()..];
            let data = data.strip_suffix(b"\r\n").unwrap_or(data);

            let disposition = headers
                .split("\r\n")
                .find_map(|line| {
                    let (key, value) = line.split_once(':')?;
                    key.trim().eq_ignore_ascii_case("content-disposition").then_some(value)
                })
                .unwrap_or("");

            Some(Part {
                name: disposition_param(disposition, "name"),
                filename: disposition_param(disposition, "filename"),
                data,
            })
        })
        .collect()
}

/// Finds the file part uploaded under `field_name`.
///
/// Text fields with the same name are ignored, matching how form libraries
/// separate files from plain fields.
pub fn find_file<'p, 'a>(parts: &'p [Part<'a>], field_name: &str) -> Option<&'p Part<'a>> {
    parts.iter().find(|p| p.filename.is_some() && p.name.as_deref() == Some(field_name))
}

/// Reads `key="value"` (or `key=value`) out of a Content-Disposition value.
fn disposition_param(disposition: &str, key: &str) -> Option<String> {
    disposition.split(';').skip(1).find_map(|param| {
        let (k, v) = param.split_once('=')?;
        k.trim().eq_ignore_ascii_case(key).then(|| {
            let v = v.trim();
            v.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(v).to_owned()
        })
    })
}
