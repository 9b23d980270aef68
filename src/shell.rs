//! HTML document rendering.
//!
//! The shell (SPA) or standalone document (variant) is produced by injecting
//! tags into the user's template: stylesheet tags before `</head>`, script
//! tags before `</body>`. Projects without a template get a minimal
//! document rendered with maud.
//!
//! Inline content is embedded verbatim apart from closing-tag escaping:
//! `</script` inside a script and `</style` inside a stylesheet would end
//! the element early, so the slash is escaped (`<\/script`).

use maud::{DOCTYPE, Markup, PreEscaped, html};

/// Tags to inject into a document.
#[derive(Debug, Default)]
pub struct Tags {
    pub head: Vec<Markup>,
    pub body: Vec<Markup>,
}

impl Tags {
    /// `<link>`/`<script src>` tags for linked output. `styles` and
    /// `scripts` are URLs relative to the document, in link order.
    pub fn linked(styles: &[String], scripts: &[String]) -> Self {
        Self {
            head: styles
                .iter()
                .map(|href| html! { link rel="stylesheet" href=(href); })
                .collect(),
            body: scripts
                .iter()
                .map(|src| html! { script src=(src) {} })
                .collect(),
        }
    }

    /// `<style>`/`<script>` elements carrying the content itself.
    pub fn inline(styles: &[&str], scripts: &[&str]) -> Self {
        Self {
            head: styles
                .iter()
                .map(|css| html! { style { (PreEscaped(escape_closing(css, "style"))) } })
                .collect(),
            body: scripts
                .iter()
                .map(|js| html! { script { (PreEscaped(escape_closing(js, "script"))) } })
                .collect(),
        }
    }

    fn head_html(&self) -> String {
        self.head.iter().map(|m| m.clone().into_string()).collect()
    }

    fn body_html(&self) -> String {
        self.body.iter().map(|m| m.clone().into_string()).collect()
    }
}

/// Escape every `</tag` (any case) so embedded content cannot close the
/// element it lives in.
pub fn escape_closing(content: &str, tag: &str) -> String {
    let needle = format!("</{tag}");
    let lower = content.to_ascii_lowercase();
    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for (idx, _) in lower.match_indices(&needle) {
        out.push_str(&content[last..idx]);
        out.push_str("<\\/");
        last = idx + 2;
    }
    out.push_str(&content[last..]);
    out
}

fn default_document(title: &str, tags: &Tags) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                @for tag in &tags.head { (tag) }
            }
            body {
                div id="app" {}
                @for tag in &tags.body { (tag) }
            }
        }
    }
}

/// Insert `snippet` before the last occurrence of `marker` (ASCII
/// case-insensitive). Returns `false` when the marker is absent.
fn insert_before(doc: &mut String, marker: &str, snippet: &str) -> bool {
    match doc.to_ascii_lowercase().rfind(marker) {
        Some(idx) => {
            doc.insert_str(idx, snippet);
            true
        }
        None => false,
    }
}

/// Render a document: the template with tags injected, or the default
/// document when there is no template.
pub fn render(template: Option<&str>, title: &str, tags: &Tags) -> String {
    let Some(template) = template else {
        return default_document(title, tags).into_string();
    };

    let head = tags.head_html();
    let body = tags.body_html();
    let mut doc = template.to_string();

    if !insert_before(&mut doc, "</head>", &head) {
        // Headless fragment: styles go right before the scripts.
        if !insert_before(&mut doc, "</body>", &head) {
            doc.push_str(&head);
        }
    }
    if !insert_before(&mut doc, "</body>", &body) {
        doc.push_str(&body);
    }
    doc
}

const RAW_ELEMENTS: [(&str, &str); 3] = [
    ("<script", "</script"),
    ("<style", "</style"),
    ("<pre", "</pre"),
];

/// Minify a document outside `<script>`, `<style>` and `<pre>` elements:
///
/// - comments are removed, conditional comments (`<!--[if`) are kept
/// - whitespace runs collapse to one space; runs spanning a line break
///   between two tags are dropped
/// - attribute quotes are removed where the value stays unambiguous
pub fn minify_html(doc: &str) -> String {
    let lower = doc.to_ascii_lowercase();
    let mut out = String::with_capacity(doc.len());
    let mut i = 0;

    while i < doc.len() {
        let rest = &lower[i..];
        if rest.starts_with("<!--") && !rest.starts_with("<!--[if") {
            match rest.find("-->") {
                Some(end) => {
                    i += end + 3;
                    continue;
                }
                None => break,
            }
        }
        let Some(ch) = doc[i..].chars().next() else {
            break;
        };
        if ch == '<' && opens_tag(rest) {
            let end = tag_end(doc, i);
            out.push_str(&minify_tag(&doc[i..end]));
            i = end;
            if let Some((_, close)) = RAW_ELEMENTS.iter().find(|(open, _)| rest.starts_with(open)) {
                let raw_end = lower[i..].find(close).map_or(doc.len(), |e| i + e);
                out.push_str(&doc[i..raw_end]);
                i = raw_end;
            }
            continue;
        }
        if ch.is_ascii_whitespace() {
            let run_end = doc[i..]
                .find(|c: char| !c.is_ascii_whitespace())
                .map_or(doc.len(), |e| i + e);
            let after_tag = out.is_empty() || out.ends_with('>');
            let before_tag = run_end == doc.len() || doc[run_end..].starts_with('<');
            if !(doc[i..run_end].contains('\n') && after_tag && before_tag) {
                out.push(' ');
            }
            i = run_end;
            continue;
        }
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

fn opens_tag(rest: &str) -> bool {
    matches!(rest.as_bytes().get(1), Some(b) if b.is_ascii_alphabetic() || *b == b'/' || *b == b'!')
}

/// End of the tag starting at `start` (one past its `>`), skipping `>`
/// inside quoted attribute values.
fn tag_end(doc: &str, start: usize) -> usize {
    let mut quote = None;
    for (offset, &b) in doc.as_bytes()[start..].iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return start + offset + 1,
            None => {}
        }
    }
    doc.len()
}

/// Collapse whitespace inside an opening tag and unquote safe attribute
/// values. Closing tags, comments and declarations pass through.
fn minify_tag(tag: &str) -> String {
    if tag.starts_with("</") || tag.starts_with("<!") {
        return tag.to_string();
    }
    let mut out = String::with_capacity(tag.len());
    let mut rest = tag;
    while let Some(c) = rest.chars().next() {
        if (c == '"' || c == '\'') && out.ends_with('=') {
            let Some(len) = rest[1..].find(c) else {
                out.push_str(rest);
                break;
            };
            let value = &rest[1..1 + len];
            if can_unquote(value) {
                out.push_str(value);
            } else {
                out.push_str(&rest[..len + 2]);
            }
            rest = &rest[len + 2..];
        } else if c.is_ascii_whitespace() {
            if !out.ends_with(' ') {
                out.push(' ');
            }
            rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
        } else {
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    if out.ends_with(" >") {
        out.remove(out.len() - 2);
    }
    out
}

fn can_unquote(value: &str) -> bool {
    !value.is_empty()
        && !value.ends_with('/')
        && !value
            .chars()
            .any(|c| c.is_ascii_whitespace() || matches!(c, '"' | '\'' | '`' | '=' | '<' | '>'))
}
