/// Escapes text for element content and quoted attribute values.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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

pub fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        escape(title)
    )
}

/// Centered card shared by the sign-in and sign-up pages.
pub fn auth_layout(inner: &str) -> String {
    format!(
        r#"<div class="bg-muted flex justify-center items-center min-h-svh p-6 md:p-10">
<div class="flex w-full max-w-sm flex-col gap-6">
<div class="flex items-center gap-2 self-center font-medium"><img src="/logo.svg" alt="Logo" width="32" height="32">NodeBase.</div>
{inner}
</div>
</div>"#
    )
}
