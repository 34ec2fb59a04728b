//! Utility modules.
//!
//! - [`HttpClient`]: reqwest client configured from [`HttpConfig`](crate::config::HttpConfig)
//! - [`escape_html`]: minimal HTML escaping for rendered fragments

mod http;

pub use http::HttpClient;

/// Escape the five HTML-significant characters
pub fn escape_html(text: &str) -> String {
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
