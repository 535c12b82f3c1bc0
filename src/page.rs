use url::Url;

/// Page linking to the provider's authorization URL.
pub fn sign_in(provider_name: &str, image: Option<&str>, authorize_url: &Url) -> String {
    let name = escape(provider_name);
    let link = match image {
        Some(src) => format!("<img src=\"{}\" alt=\"Sign in with {}\">", escape(src), name),
        None => format!("Sign in with {}", name),
    };
    format!(
        concat!(
            "<html><head><title>Sign in</title></head>",
            "<body><h1>Sign in with {name}</h1>",
            "<a href=\"{href}\">{link}</a>",
            "</body></html>"
        ),
        name = name,
        href = escape(authorize_url.as_str()),
        link = link,
    )
}

/// Shown when the user declines to authorize the application.
pub fn denied(provider_name: &str) -> String {
    let name = escape(provider_name);
    format!(
        concat!(
            "<html><head><title>Authorization denied</title></head>",
            "<body><h1>Authorization denied</h1>",
            "<p>{name} did not authorize this application.</p>",
            "</body></html>"
        ),
        name = name,
    )
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
