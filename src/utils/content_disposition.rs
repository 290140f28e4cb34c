//! `Content-Disposition` handling for document downloads (RFC 6266 / RFC 5987).

/// Header value for an attachment: an ASCII fallback plus the UTF-8 `filename*`.
pub fn attachment(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let encoded = url::form_urlencoded::byte_serialize(filename.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
        .replace('*', "%2A");
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

/// Filename announced by a `Content-Disposition` header. `filename*` wins over `filename`.
pub fn filename_from_header(header: &str) -> Option<String> {
    let params = parameters(header);

    let extended = params
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("filename*"))
        .and_then(|(_, value)| decode_extended(value));
    if let Some(name) = extended.filter(|n| !n.is_empty()) {
        return Some(name);
    }

    params
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("filename"))
        .map(|(_, value)| value)
        .filter(|v| !v.is_empty())
}

/// Splits `type; a=b; c="d; e"` into its parameters, honouring quoted strings.
fn parameters(header: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;

    for c in header.chars() {
        match c {
            _ if escaped => {
                current.push(c);
                escaped = false;
            }
            '\\' if quoted => escaped = true,
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ';' if !quoted => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);

    for part in parts.into_iter().skip(1) {
        if let Some((name, value)) = part.split_once('=') {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            params.push((name.trim().to_string(), value.to_string()));
        }
    }
    params
}

/// `charset'lang'percent-encoded`; only UTF-8 and ISO-8859-1 are understood.
fn decode_extended(value: &str) -> Option<String> {
    let mut pieces = value.splitn(3, '\'');
    let charset = pieces.next()?;
    let _language = pieces.next()?;
    let encoded = pieces.next()?;
    let bytes = percent_decode(encoded)?;

    if charset.eq_ignore_ascii_case("utf-8") {
        String::from_utf8(bytes).ok()
    } else if charset.eq_ignore_ascii_case("iso-8859-1") {
        Some(bytes.into_iter().map(char::from).collect())
    } else {
        None
    }
}

fn percent_decode(input: &str) -> Option<Vec<u8>> {
    let raw = input.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_header_carries_both_forms() {
        assert_eq!(
            attachment("Kostenplan 2026.pdf"),
            "attachment; filename=\"Kostenplan 2026.pdf\"; filename*=UTF-8''Kostenplan%202026.pdf"
        );
        assert_eq!(
            attachment("Förderantrag.pdf"),
            "attachment; filename=\"F_rderantrag.pdf\"; filename*=UTF-8''F%C3%B6rderantrag.pdf"
        );
    }

    #[test]
    fn extended_filename_is_preferred() {
        let header = "attachment; filename=\"F_rderantrag.pdf\"; filename*=UTF-8''F%C3%B6rderantrag.pdf";
        assert_eq!(filename_from_header(header).as_deref(), Some("Förderantrag.pdf"));
    }

    #[test]
    fn plain_filename_is_used_when_no_extended_form_exists() {
        assert_eq!(
            filename_from_header("attachment; filename=\"a; b.txt\"").as_deref(),
            Some("a; b.txt")
        );
        assert_eq!(
            filename_from_header("inline; filename=bericht.pdf").as_deref(),
            Some("bericht.pdf")
        );
    }

    #[test]
    fn headers_without_a_name_yield_none() {
        assert_eq!(filename_from_header("attachment"), None);
        assert_eq!(filename_from_header("attachment; filename*=UTF-8''%ZZ"), None);
    }

    #[test]
    fn generated_headers_parse_back() {
        let name = "Nachweis (Kopie) #2 – März.pdf";
        assert_eq!(filename_from_header(&attachment(name)).as_deref(), Some(name));
    }
}
