//! JSDoc-style `/** ... */` block parsing.
use crate::catalog::{DocComment, DocTag, ParamDoc};
use regex::Regex;
use std::sync::LazyLock;

static TAG_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@([A-Za-z][\w-]*)\s*(.*)$").expect("valid tag regex"));

enum Section {
    Description,
    Param(usize),
    Tag(usize),
}

/// Returns `None` for plain comments and for doc blocks with no content.
pub fn parse_doc_comment(raw: &str) -> Option<DocComment> {
    let raw = raw.trim();
    if !raw.starts_with("/**") || raw.starts_with("/**/") || !raw.ends_with("*/") {
        return None;
    }
    let body = &raw[3..raw.len() - 2];

    let mut doc = DocComment::default();
    let mut description: Vec<&str> = Vec::new();
    let mut section = Section::Description;

    for line in body.lines().map(strip_leader) {
        if let Some(caps) = TAG_LINE.captures(line.trim_start()) {
            let tag = caps.get(1).map_or("", |m| m.as_str());
            let rest = caps.get(2).map_or("", |m| m.as_str());
            match tag {
                "param" | "arg" | "argument" => {
                    if let Some(param) = parse_param(rest) {
                        doc.params.push(param);
                        section = Section::Param(doc.params.len() - 1);
                    }
                }
                _ => {
                    let tag = if tag == "return" { "returns" } else { tag };
                    doc.tags.push(DocTag {
                        tag: tag.to_string(),
                        text: rest.trim_end().to_string(),
                    });
                    section = Section::Tag(doc.tags.len() - 1);
                }
            }
            continue;
        }

        match section {
            Section::Description => description.push(line.trim_end()),
            Section::Param(i) => append_line(&mut doc.params[i].description, line.trim()),
            Section::Tag(i) => append_line(&mut doc.tags[i].text, line.trim_end()),
        }
    }

    doc.description = description.join("\n").trim().to_string();
    for tag in &mut doc.tags {
        tag.text = tag.text.trim().to_string();
    }

    if doc.is_empty() { None } else { Some(doc) }
}

/// Drop the ` * ` gutter, keeping indentation after it.
fn strip_leader(line: &str) -> &str {
    let trimmed = line.trim_start();
    match trimmed.strip_prefix('*') {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
        None => trimmed,
    }
}

fn append_line(target: &mut String, line: &str) {
    if line.is_empty() && target.is_empty() {
        return;
    }
    if !target.is_empty() {
        target.push('\n');
    }
    target.push_str(line);
}

/// `{type} name - description`, `[name=default] description`, `name description`.
fn parse_param(rest: &str) -> Option<ParamDoc> {
    let mut rest = rest.trim_start();

    if rest.starts_with('{') {
        let end = matching_close(rest, '{', '}')?;
        rest = rest[end + 1..].trim_start();
    }

    let (name, remainder) = if rest.starts_with('[') {
        let end = matching_close(rest, '[', ']')?;
        let inner = &rest[1..end];
        let name = inner.split('=').next().unwrap_or(inner).trim();
        (name, &rest[end + 1..])
    } else {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        (&rest[..end], &rest[end..])
    };

    if name.is_empty() {
        return None;
    }

    let remainder = remainder.trim_start();
    let description = remainder.strip_prefix('-').unwrap_or(remainder).trim();

    Some(ParamDoc {
        name: name.to_string(),
        description: description.to_string(),
    })
}

fn matching_close(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}
