//! Markdown adapter: source text to [`Node`] tree and back.
//!
//! A fenced code block whose info string starts with `symbol` becomes a
//! [`Directive`]; the rest of the info string carries `key=value`
//! attributes and the block body is the payload.
//!
//! [`scan`] reports the regions a transform may rewrite as byte ranges, so
//! callers can splice replacements into the original text and leave the rest
//! of the document as written.
use super::{Code, Container, ContainerKind, Directive, Link, Node, Raw, SYMBOL_DIRECTIVE};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::LazyLock;

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z][\w-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|(\S+))"#)
        .expect("attribute regex is valid")
});

enum Frame {
    Container(ContainerKind, Vec<Node>),
    Link {
        href: String,
        title: Option<String>,
        children: Vec<Node>,
    },
    Image {
        dest: String,
        title: String,
        alt: String,
    },
    CodeBlock {
        info: Option<String>,
        text: String,
        line: usize,
    },
    Html(String),
    Metadata(String),
}

impl Frame {
    fn open(tag: Tag<'_>, line: usize) -> Self {
        match tag {
            Tag::Paragraph => Frame::Container(ContainerKind::Paragraph, Vec::new()),
            Tag::Heading { level, .. } => {
                Frame::Container(ContainerKind::Heading(level as u8), Vec::new())
            }
            Tag::BlockQuote(_) => Frame::Container(ContainerKind::BlockQuote, Vec::new()),
            Tag::List(start) => Frame::Container(ContainerKind::List { start }, Vec::new()),
            Tag::Item => Frame::Container(ContainerKind::Item, Vec::new()),
            Tag::Emphasis => Frame::Container(ContainerKind::Emphasis, Vec::new()),
            Tag::Strong => Frame::Container(ContainerKind::Strong, Vec::new()),
            Tag::Strikethrough => Frame::Container(ContainerKind::Strikethrough, Vec::new()),
            Tag::CodeBlock(kind) => Frame::CodeBlock {
                info: match kind {
                    CodeBlockKind::Fenced(info) => Some(info.into_string()),
                    CodeBlockKind::Indented => None,
                },
                text: String::new(),
                line,
            },
            Tag::HtmlBlock => Frame::Html(String::new()),
            Tag::MetadataBlock(_) => Frame::Metadata(String::new()),
            Tag::Link {
                dest_url, title, ..
            } => Frame::Link {
                href: dest_url.into_string(),
                title: (!title.is_empty()).then(|| title.into_string()),
                children: Vec::new(),
            },
            Tag::Image {
                dest_url, title, ..
            } => Frame::Image {
                dest: dest_url.into_string(),
                title: title.into_string(),
                alt: String::new(),
            },
            _ => Frame::Container(ContainerKind::Group, Vec::new()),
        }
    }

    fn push(&mut self, node: Node) {
        match self {
            Frame::Container(_, children) | Frame::Link { children, .. } => {
                push_merged(children, node)
            }
            Frame::Image { alt, .. } => alt.push_str(&node.text_content()),
            Frame::CodeBlock { text, .. } | Frame::Html(text) | Frame::Metadata(text) => {
                text.push_str(&node.text_content())
            }
        }
    }

    fn close(self) -> Node {
        match self {
            Frame::Container(kind, children) => Node::container(kind, children),
            Frame::Link {
                href,
                title,
                children,
            } => Node::Link(Link {
                href,
                title,
                children,
            }),
            Frame::Image { dest, title, alt } => {
                let title = if title.is_empty() {
                    String::new()
                } else {
                    format!(" \"{}\"", title.replace('"', "\\\""))
                };
                Node::Raw(Raw {
                    markup: format!("![{alt}]({dest}{title})"),
                    block: false,
                })
            }
            Frame::CodeBlock { info, text, line } => code_block(info, text, line),
            Frame::Html(text) => Node::Raw(Raw {
                markup: text.trim_end().to_string(),
                block: true,
            }),
            Frame::Metadata(mut text) => {
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
                Node::Raw(Raw {
                    markup: format!("---\n{text}---"),
                    block: true,
                })
            }
        }
    }
}

/// Adjacent text is merged so inline references never straddle two nodes.
fn push_merged(children: &mut Vec<Node>, node: Node) {
    if let Node::Text(text) = &node {
        if let Some(Node::Text(last)) = children.last_mut() {
            last.push_str(text);
            return;
        }
    }
    children.push(node);
}

fn code_block(info: Option<String>, text: String, line: usize) -> Node {
    let info = info.unwrap_or_default();
    let info = info.trim();
    let (word, rest) = info
        .split_once(char::is_whitespace)
        .unwrap_or((info, ""));

    if word == SYMBOL_DIRECTIVE {
        let payload = text.trim();
        return Node::Directive(Directive {
            name: SYMBOL_DIRECTIVE.to_string(),
            payload: (!payload.is_empty()).then(|| payload.to_string()),
            attributes: parse_attributes(rest),
            line: Some(line),
        });
    }

    Node::Code(Code {
        value: text.strip_suffix('\n').unwrap_or(&text).to_string(),
        lang: (!word.is_empty()).then(|| word.to_string()),
        block: true,
    })
}

/// `key=value`, `key="quoted value"` or `key='quoted value'` pairs.
pub fn parse_attributes(input: &str) -> BTreeMap<String, String> {
    ATTRIBUTE
        .captures_iter(input)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str())
                .unwrap_or_default();
            (caps[1].to_string(), value.to_string())
        })
        .collect()
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())].matches('\n').count() + 1
}

fn push(stack: &mut [Frame], node: Node) {
    if let Some(frame) = stack.last_mut() {
        frame.push(node);
    }
}

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);
    options
}

/// Parse Markdown into a tree rooted at a [`ContainerKind::Root`] container.
pub fn parse(source: &str) -> Node {
    let mut stack = vec![Frame::Container(ContainerKind::Root, Vec::new())];

    for (event, range) in Parser::new_ext(source, options()).into_offset_iter() {
        match event {
            Event::Start(tag) => stack.push(Frame::open(tag, line_of(source, range.start))),
            Event::End(_) => {
                if stack.len() > 1 {
                    if let Some(frame) = stack.pop() {
                        push(&mut stack, frame.close());
                    }
                }
            }
            Event::Text(text) => push(&mut stack, Node::Text(text.into_string())),
            Event::Code(code) => match stack.last_mut() {
                Some(Frame::Image { alt, .. }) => alt.push_str(&code),
                _ => push(&mut stack, Node::inline_code(code.into_string())),
            },
            Event::Html(html) => match stack.last_mut() {
                Some(Frame::Html(buf)) => buf.push_str(&html),
                _ => push(
                    &mut stack,
                    Node::Raw(Raw {
                        markup: html.trim_end().to_string(),
                        block: true,
                    }),
                ),
            },
            Event::InlineHtml(html) => push(&mut stack, raw_inline(html.into_string())),
            Event::SoftBreak => push(&mut stack, Node::text("\n")),
            Event::HardBreak => push(&mut stack, raw_inline("\\\n".to_string())),
            Event::Rule => push(
                &mut stack,
                Node::Raw(Raw {
                    markup: "---".to_string(),
                    block: true,
                }),
            ),
            Event::InlineMath(math) => push(&mut stack, raw_inline(format!("${math}$"))),
            Event::DisplayMath(math) => push(&mut stack, raw_inline(format!("$${math}$$"))),
            Event::FootnoteReference(label) => push(&mut stack, raw_inline(format!("[^{label}]"))),
            Event::TaskListMarker(done) => {
                let mark = if done { "[x] " } else { "[ ] " };
                push(&mut stack, raw_inline(mark.to_string()))
            }
        }
    }

    while stack.len() > 1 {
        if let Some(frame) = stack.pop() {
            push(&mut stack, frame.close());
        }
    }
    stack
        .pop()
        .map(Frame::close)
        .unwrap_or_else(|| Node::container(ContainerKind::Root, Vec::new()))
}

fn raw_inline(markup: String) -> Node {
    Node::Raw(Raw {
        markup,
        block: false,
    })
}

/// A region of the source text, as byte offsets into it.
#[derive(Debug, Clone, PartialEq)]
pub enum Span {
    /// Prose outside code, links, images and front matter.
    Text(Range<usize>),
    /// A whole `symbol` fence, closing fence included.
    Directive {
        range: Range<usize>,
        directive: Directive,
    },
}

/// The prose runs and `symbol` fences of `source`, in source order.
/// Adjacent text events are joined into one run.
pub fn scan(source: &str) -> Vec<Span> {
    let mut spans: Vec<Span> = Vec::new();
    let mut opaque = 0usize;
    let mut fence: Option<(Option<String>, String, Range<usize>)> = None;

    for (event, range) in Parser::new_ext(source, options()).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let info = match kind {
                    CodeBlockKind::Fenced(info) => Some(info.into_string()),
                    CodeBlockKind::Indented => None,
                };
                fence = Some((info, String::new(), range));
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((info, text, range)) = fence.take() {
                    let line = line_of(source, range.start);
                    if let Node::Directive(directive) = code_block(info, text, line) {
                        spans.push(Span::Directive { range, directive });
                    }
                }
            }
            Event::Start(Tag::Link { .. } | Tag::Image { .. } | Tag::MetadataBlock(_)) => {
                opaque += 1
            }
            Event::End(TagEnd::Link | TagEnd::Image | TagEnd::MetadataBlock(_)) => {
                opaque = opaque.saturating_sub(1)
            }
            Event::Text(text) => {
                if let Some((_, body, _)) = fence.as_mut() {
                    body.push_str(&text);
                } else if opaque == 0 {
                    match spans.last_mut() {
                        Some(Span::Text(last)) if last.end == range.start => last.end = range.end,
                        _ => spans.push(Span::Text(range)),
                    }
                }
            }
            _ => {}
        }
    }
    spans
}

// ── Serialization ────────────────────────────────────────────────────

/// Serialize a tree back to Markdown. Ends with a single newline.
pub fn to_markdown(node: &Node) -> String {
    let mut out = block_markdown(node);
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out.push('\n');
    out
}

fn block_markdown(node: &Node) -> String {
    match node {
        Node::Code(code) if code.block => fenced(code.lang.as_deref().unwrap_or(""), &code.value),
        Node::Raw(raw) if raw.block => raw.markup.clone(),
        Node::Directive(directive) => directive_markdown(directive),
        Node::Container(container) => container_markdown(container),
        inline => inline_markdown(inline),
    }
}

fn container_markdown(container: &Container) -> String {
    match &container.kind {
        ContainerKind::Paragraph => inlines(&container.children),
        ContainerKind::Heading(level) => {
            let marks = "#".repeat(usize::from((*level).clamp(1, 6)));
            format!("{marks} {}", inlines(&container.children).replace('\n', " "))
        }
        ContainerKind::BlockQuote => prefix_lines(&blocks(&container.children), "> ", ">"),
        ContainerKind::List { start } => list_markdown(*start, &container.children),
        ContainerKind::Emphasis | ContainerKind::Strong | ContainerKind::Strikethrough => {
            inline_markdown(&Node::Container(container.clone()))
        }
        ContainerKind::Root | ContainerKind::Item | ContainerKind::Symbol { .. } | ContainerKind::Group => {
            blocks(&container.children)
        }
    }
}

/// Block children separated by blank lines; runs of inline nodes form one block.
fn blocks(children: &[Node]) -> String {
    let mut parts = Vec::new();
    let mut run: Vec<&Node> = Vec::new();

    for child in children {
        if child.is_block() {
            if !run.is_empty() {
                parts.push(run.drain(..).map(inline_markdown).collect::<String>());
            }
            parts.push(block_markdown(child));
        } else {
            run.push(child);
        }
    }
    if !run.is_empty() {
        parts.push(run.into_iter().map(inline_markdown).collect::<String>());
    }

    parts
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn list_markdown(start: Option<u64>, items: &[Node]) -> String {
    let mut lines = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let marker = match start {
            Some(n) => format!("{}. ", n + i as u64),
            None => "- ".to_string(),
        };
        let body = block_markdown(item);
        let indent = " ".repeat(marker.len());
        let mut rendered = String::new();
        for (j, line) in body.lines().enumerate() {
            if j == 0 {
                rendered.push_str(&marker);
            } else {
                rendered.push('\n');
                if !line.is_empty() {
                    rendered.push_str(&indent);
                }
            }
            rendered.push_str(line);
        }
        if body.is_empty() {
            rendered.push_str(marker.trim_end());
        }
        lines.push(rendered);
    }
    lines.join("\n")
}

fn inlines(children: &[Node]) -> String {
    children.iter().map(inline_markdown).collect()
}

/// Serialize one inline node, without a trailing newline.
pub fn inline_markdown(node: &Node) -> String {
    match node {
        Node::Text(text) => escape(text),
        Node::Code(code) => code_span(&code.value),
        Node::Raw(raw) => raw.markup.clone(),
        Node::Link(link) => {
            let href = if link.href.contains(' ') {
                format!("<{}>", link.href)
            } else {
                link.href.clone()
            };
            let title = link
                .title
                .as_ref()
                .map(|t| format!(" \"{}\"", t.replace('\\', "\\\\").replace('"', "\\\"")))
                .unwrap_or_default();
            format!("[{}]({href}{title})", inlines(&link.children))
        }
        Node::ReferenceError(error) => format!(
            "<span class=\"symref-error\" title=\"{}\">{}</span>",
            escape_html(&error.message),
            code_span(&error.reference)
        ),
        Node::Directive(directive) => directive_markdown(directive),
        Node::Container(container) => {
            let inner = inlines(&container.children);
            match container.kind {
                ContainerKind::Emphasis => format!("*{inner}*"),
                ContainerKind::Strong => format!("**{inner}**"),
                ContainerKind::Strikethrough => format!("~~{inner}~~"),
                _ => inner,
            }
        }
    }
}

fn directive_markdown(directive: &Directive) -> String {
    let mut info = directive.name.clone();
    for (key, value) in &directive.attributes {
        if value.is_empty() || value.contains(char::is_whitespace) {
            info.push_str(&format!(" {key}=\"{value}\""));
        } else {
            info.push_str(&format!(" {key}={value}"));
        }
    }
    fenced(&info, directive.payload.as_deref().unwrap_or(""))
}

fn fenced(info: &str, body: &str) -> String {
    let fence = "`".repeat(longest_backtick_run(body).max(2) + 1);
    if body.is_empty() {
        format!("{fence}{info}\n{fence}")
    } else {
        format!("{fence}{info}\n{body}\n{fence}")
    }
}

fn code_span(value: &str) -> String {
    let ticks = "`".repeat(longest_backtick_run(value) + 1);
    if value.starts_with('`') || value.ends_with('`') {
        format!("{ticks} {value} {ticks}")
    } else {
        format!("{ticks}{value}{ticks}")
    }
}

fn longest_backtick_run(value: &str) -> usize {
    value
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0)
}

fn prefix_lines(text: &str, prefix: &str, empty: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                empty.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Backslash-escapes inline markup, and block markers at the start of a line
/// (`#`, `>`, `-`, `+`, `=` and the `.` or `)` of `1.`).
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut line_start = true;
    let mut ordinal = false;
    for c in text.chars() {
        let marker = line_start && matches!(c, '#' | '>' | '-' | '+' | '=');
        let numbered = ordinal && matches!(c, '.' | ')');
        if marker || numbered || matches!(c, '\\' | '`' | '*' | '_' | '[' | ']' | '<') {
            out.push('\\');
        }
        out.push(c);
        ordinal = (line_start || ordinal) && c.is_ascii_digit();
        line_start = c == '\n';
    }
    out
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
