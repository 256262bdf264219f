//! HTML label, served when PDF generation fails.

use url::Url;

use crate::entry::Entry;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// URL of the QR image for `link`, relative to the server root.
#[must_use]
pub fn qr_src(link: &str) -> String {
    // Only the path and query are emitted; the host is a placeholder.
    match Url::parse_with_params("http://qr.invalid/api/qr", [("link", link)]) {
        Ok(url) => format!("{}?{}", url.path(), url.query().unwrap_or_default()),
        Err(_) => "/api/qr".to_string(),
    }
}

/// Render a printable HTML page for one label.
#[must_use]
pub fn label_html(entry: &Entry) -> String {
    let title = escape(entry.title());
    let cage = escape(&entry.cage);
    let egg_id = escape(&entry.egg_id);
    let link = escape(&entry.link);
    let src = escape(&qr_src(&entry.link));

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{egg_id}</title>
<style>
body {{ font-family: Helvetica, Arial, sans-serif; text-align: center; margin: 50px; }}
h1 {{ font-size: 24px; }}
.cage {{ font-size: 16px; }}
.egg {{ font-size: 14px; }}
.link {{ font-size: 10px; word-break: break-all; }}
</style>
</head>
<body>
<h1>{title}</h1>
<img src="{src}" width="200" height="200" alt="QR code">
<p class="cage">Cage: {cage}</p>
<p class="egg">Egg ID: {egg_id}</p>
<p class="link">{link}</p>
</body>
</html>
"#
    )
}
