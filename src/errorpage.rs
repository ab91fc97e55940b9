//! Error page synthesis.

const HTML_HEADER: &str = "<!DOCTYPE html><html><head></head><body>";
const HTML_FOOTER: &str = "</body></html>";

/// Renders `<h2>Error: <code> <reason></h2>` wrapped in the same page
/// skeleton the directory listing uses.
pub fn render(code: u16, reason: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(128);
    body.extend_from_slice(HTML_HEADER.as_bytes());
    body.extend_from_slice(format!("<h2>Error: {} {}</h2>", code, reason).as_bytes());
    body.extend_from_slice(HTML_FOOTER.as_bytes());
    body
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn renders_status_in_body() {
        let body = render(404, "Not Found");
        let text = String::from_utf8(body).unwrap();
        assert_eq!(text, "<!DOCTYPE html><html><head></head><body><h2>Error: 404 Not Found</h2></body></html>");
    }
}
