//! Document tree handed to the reference transform.
//!
//! A closed set of node variants. The transform only ever splices children
//! of a container and replaces directives in place.
use std::collections::BTreeMap;

pub mod markdown;

/// Name of the block directive carrying a symbol reference.
pub const SYMBOL_DIRECTIVE: &str = "symbol";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Code(Code),
    Link(Link),
    Raw(Raw),
    ReferenceError(ReferenceError),
    Directive(Directive),
    Container(Container),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub value: String,
    pub lang: Option<String>,
    pub block: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub href: String,
    pub title: Option<String>,
    pub children: Vec<Node>,
}

/// Markup passed through untouched (HTML, rules, images).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raw {
    pub markup: String,
    pub block: bool,
}

/// Visible marker left where an inline reference failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceError {
    /// The token as written, e.g. `{@Bar}`.
    pub reference: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub payload: Option<String>,
    pub attributes: BTreeMap<String, String>,
    /// 1-based line in the source document, when known.
    pub line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerKind {
    Root,
    Paragraph,
    Heading(u8),
    BlockQuote,
    List { start: Option<u64> },
    Item,
    Emphasis,
    Strong,
    Strikethrough,
    /// Rendered block for one declaration.
    Symbol { id: String },
    /// Any other grouping the source format produced.
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub kind: ContainerKind,
    pub children: Vec<Node>,
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text(value.into())
    }

    pub fn container(kind: ContainerKind, children: Vec<Node>) -> Self {
        Node::Container(Container { kind, children })
    }

    pub fn paragraph(children: Vec<Node>) -> Self {
        Self::container(ContainerKind::Paragraph, children)
    }

    pub fn inline_code(value: impl Into<String>) -> Self {
        Node::Code(Code {
            value: value.into(),
            lang: None,
            block: false,
        })
    }

    pub fn code_block(value: impl Into<String>, lang: Option<&str>) -> Self {
        Node::Code(Code {
            value: value.into(),
            lang: lang.map(str::to_string),
            block: true,
        })
    }

    /// Whether the node starts its own block when serialized.
    pub fn is_block(&self) -> bool {
        match self {
            Node::Text(_) | Node::Link(_) | Node::ReferenceError(_) => false,
            Node::Code(code) => code.block,
            Node::Raw(raw) => raw.block,
            Node::Directive(_) => true,
            Node::Container(c) => !matches!(
                c.kind,
                ContainerKind::Emphasis | ContainerKind::Strong | ContainerKind::Strikethrough
            ),
        }
    }

    /// Concatenated text of the node and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(t),
            Node::Code(c) => out.push_str(&c.value),
            Node::Raw(_) | Node::Directive(_) => {}
            Node::ReferenceError(e) => out.push_str(&e.reference),
            Node::Link(l) => l.children.iter().for_each(|c| c.collect_text(out)),
            Node::Container(c) => c.children.iter().for_each(|c| c.collect_text(out)),
        }
    }

    /// Every directive in document order.
    pub fn directives(&self) -> Vec<&Directive> {
        let mut out = Vec::new();
        self.collect_directives(&mut out);
        out
    }

    fn collect_directives<'a>(&'a self, out: &mut Vec<&'a Directive>) {
        match self {
            Node::Directive(d) => out.push(d),
            Node::Container(c) => c.children.iter().for_each(|n| n.collect_directives(out)),
            _ => {}
        }
    }
}

impl Container {
    /// Replace the child at `index` with `replacement` (possibly several nodes).
    pub fn splice(&mut self, index: usize, replacement: Vec<Node>) {
        self.children.splice(index..=index, replacement);
    }

    /// Replace the child at `index` with exactly one node.
    pub fn replace(&mut self, index: usize, node: Node) -> Node {
        std::mem::replace(&mut self.children[index], node)
    }
}

impl Directive {
    pub fn symbol(payload: Option<&str>) -> Self {
        Self {
            name: SYMBOL_DIRECTIVE.to_string(),
            payload: payload.map(str::to_string),
            attributes: BTreeMap::new(),
            line: None,
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}
