//! Turns resolved declarations into inline links and documentation blocks.
use crate::catalog::{Declaration, DocComment, Member, Param};
use crate::document::{ContainerKind, Link, Node};
use crate::resolver::Resolved;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Section of a rendered symbol block, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockSection {
    Signature,
    Description,
    Parameters,
    Members,
    SourceLink,
}

impl BlockSection {
    pub const ALL: [BlockSection; 5] = [
        BlockSection::Signature,
        BlockSection::Description,
        BlockSection::Parameters,
        BlockSection::Members,
        BlockSection::SourceLink,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockSection::Signature => "signature",
            BlockSection::Description => "description",
            BlockSection::Parameters => "parameters",
            BlockSection::Members => "members",
            BlockSection::SourceLink => "source-link",
        }
    }
}

impl fmt::Display for BlockSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown section {0:?}; expected one of: signature, description, parameters, members, source-link")]
pub struct UnknownSection(pub String);

impl FromStr for BlockSection {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        BlockSection::ALL
            .into_iter()
            .find(|section| section.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownSection(s.to_string()))
    }
}

/// Options for [`Renderer::render_block`]. An empty `show` means every
/// available section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockOptions {
    pub show: BTreeSet<BlockSection>,
}

impl BlockOptions {
    /// Parse a comma-separated `show` list.
    pub fn parse_show(list: &str) -> Result<Self, UnknownSection> {
        let show = list
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(BlockSection::from_str)
            .collect::<Result<_, _>>()?;
        Ok(Self { show })
    }

    pub fn includes(&self, section: BlockSection) -> bool {
        self.show.is_empty() || self.show.contains(&section)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineRender {
    pub display_text: String,
    pub link_target: String,
    pub tooltip: String,
}

/// Fields shared by declarations and members for rendering.
struct View<'a> {
    id: String,
    title: String,
    kind: &'static str,
    signature: &'a str,
    doc: Option<&'a DocComment>,
    params: &'a [Param],
    members: &'a [Member],
    origin: &'a str,
    line: usize,
}

impl<'a> View<'a> {
    fn of_declaration(decl: &'a Declaration) -> Self {
        Self {
            id: decl.id.clone(),
            title: decl.name.clone(),
            kind: decl.kind.as_str(),
            signature: &decl.signature,
            doc: decl.doc.as_ref(),
            params: &decl.params,
            members: &decl.members,
            origin: &decl.origin,
            line: decl.line,
        }
    }

    fn of_resolved(resolved: &Resolved<'a>) -> Self {
        match resolved.member {
            None => Self::of_declaration(resolved.declaration),
            Some(member) => Self {
                id: format!("{}.{}", resolved.declaration.id, member.name),
                title: resolved.display_name(),
                kind: member.kind.as_str(),
                signature: &member.signature,
                doc: member.doc.as_ref(),
                params: &[],
                members: &[],
                origin: &resolved.declaration.origin,
                line: member.line,
            },
        }
    }
}

/// Stateless apart from the link base, so one renderer serves a whole build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Renderer {
    source_link_base: String,
}

impl Renderer {
    pub fn new(source_link_base: impl Into<String>) -> Self {
        Self {
            source_link_base: source_link_base.into(),
        }
    }

    /// `<base><origin>#L<line>`
    pub fn link_target(&self, origin: &str, line: usize) -> String {
        format!("{}{origin}#L{line}", self.source_link_base)
    }

    pub fn render_inline(&self, declaration: &Declaration) -> InlineRender {
        self.inline_view(&View::of_declaration(declaration))
    }

    pub fn render_resolved_inline(&self, resolved: &Resolved<'_>) -> InlineRender {
        self.inline_view(&View::of_resolved(resolved))
    }

    /// Link node spliced in place of an inline reference.
    pub fn inline_node(&self, resolved: &Resolved<'_>) -> Node {
        let inline = self.render_resolved_inline(resolved);
        Node::Link(Link {
            href: inline.link_target,
            title: Some(inline.tooltip),
            children: vec![Node::inline_code(inline.display_text)],
        })
    }

    pub fn render_block(&self, declaration: &Declaration, options: &BlockOptions) -> Node {
        self.block_view(&View::of_declaration(declaration), options)
    }

    pub fn render_resolved_block(&self, resolved: &Resolved<'_>, options: &BlockOptions) -> Node {
        self.block_view(&View::of_resolved(resolved), options)
    }

    fn inline_view(&self, view: &View<'_>) -> InlineRender {
        let tooltip = view
            .doc
            .and_then(DocComment::summary)
            .unwrap_or(view.signature)
            .to_string();
        InlineRender {
            display_text: view.title.clone(),
            link_target: self.link_target(view.origin, view.line),
            tooltip,
        }
    }

    fn block_view(&self, view: &View<'_>, options: &BlockOptions) -> Node {
        let mut children = vec![Node::container(
            ContainerKind::Heading(3),
            vec![
                Node::inline_code(view.title.clone()),
                Node::text(format!(" ({})", view.kind)),
            ],
        )];

        for section in BlockSection::ALL {
            if !options.includes(section) {
                continue;
            }
            match section {
                BlockSection::Signature => {
                    children.push(Node::code_block(view.signature, Some("ts")));
                }
                BlockSection::Description => {
                    if let Some(doc) = view.doc {
                        children.extend(description_nodes(doc));
                    }
                }
                BlockSection::Parameters => {
                    if let Some(list) = parameter_list(view.params, view.doc) {
                        children.push(section_heading("Parameters"));
                        children.push(list);
                    }
                }
                BlockSection::Members => {
                    if !view.members.is_empty() {
                        children.push(section_heading("Members"));
                        children.push(member_list(view.members));
                    }
                }
                BlockSection::SourceLink => {
                    children.push(Node::paragraph(vec![Node::Link(Link {
                        href: self.link_target(view.origin, view.line),
                        title: None,
                        children: vec![Node::text(format!(
                            "Source: {}:{}",
                            view.origin, view.line
                        ))],
                    })]));
                }
            }
        }

        Node::container(ContainerKind::Symbol { id: view.id.clone() }, children)
    }
}

fn section_heading(title: &str) -> Node {
    Node::container(ContainerKind::Heading(4), vec![Node::text(title)])
}

fn description_nodes(doc: &DocComment) -> Vec<Node> {
    let mut nodes: Vec<Node> = doc
        .description
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| Node::paragraph(vec![Node::text(p)]))
        .collect();

    for (tag, label) in [("deprecated", "Deprecated"), ("returns", "Returns")] {
        if let Some(t) = doc.tag(tag) {
            let mut line = vec![Node::container(
                ContainerKind::Strong,
                vec![Node::text(label)],
            )];
            if !t.text.is_empty() {
                line.push(Node::text(format!(": {}", t.text)));
            }
            nodes.push(Node::paragraph(line));
        }
    }

    for example in doc.tags.iter().filter(|t| t.tag == "example") {
        nodes.push(Node::code_block(example.text.clone(), Some("ts")));
    }

    nodes
}

/// Parameters from the signature, annotated with `@param` text. Falls back
/// to the documented names when the signature has none (plain JS).
fn parameter_list(params: &[Param], doc: Option<&DocComment>) -> Option<Node> {
    let mut items = Vec::new();

    if params.is_empty() {
        for p in doc.map(|d| d.params.as_slice()).unwrap_or_default() {
            items.push(list_item(Node::inline_code(p.name.clone()), &p.description));
        }
    } else {
        for p in params {
            let mut label = p.name.clone();
            if p.optional {
                label.push('?');
            }
            if let Some(ty) = &p.ty {
                label.push_str(": ");
                label.push_str(ty);
            }
            let description = doc.and_then(|d| d.param(&p.name)).unwrap_or_default();
            items.push(list_item(Node::inline_code(label), description));
        }
    }

    if items.is_empty() {
        None
    } else {
        Some(Node::container(ContainerKind::List { start: None }, items))
    }
}

fn member_list(members: &[Member]) -> Node {
    let items = members
        .iter()
        .map(|m| {
            let summary = m.doc.as_ref().and_then(DocComment::summary).unwrap_or_default();
            list_item(Node::inline_code(m.signature.clone()), summary)
        })
        .collect();
    Node::container(ContainerKind::List { start: None }, items)
}

fn list_item(label: Node, description: &str) -> Node {
    let mut children = vec![label];
    if !description.is_empty() {
        children.push(Node::text(format!(" - {}", description.replace('\n', " "))));
    }
    Node::container(ContainerKind::Item, vec![Node::paragraph(children)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_support::decl;
    use crate::catalog::{DocTag, MemberKind, ParamDoc};

    fn documented() -> Declaration {
        let mut d = decl("parse", "src/core/parse.ts", 12);
        d.signature = "function parse(input: string, strict?: boolean): Ast".to_string();
        d.params = vec![
            Param {
                name: "input".to_string(),
                ty: Some("string".to_string()),
                optional: false,
            },
            Param {
                name: "strict".to_string(),
                ty: Some("boolean".to_string()),
                optional: true,
            },
        ];
        d.doc = Some(DocComment {
            description: "Parses source text.\n\nReturns a syntax tree.".to_string(),
            params: vec![ParamDoc {
                name: "input".to_string(),
                description: "Text to parse.".to_string(),
            }],
            tags: vec![DocTag {
                tag: "deprecated".to_string(),
                text: "Use parseModule.".to_string(),
            }],
        });
        d
    }

    fn section_count(node: &Node) -> usize {
        match node {
            Node::Container(c) => c.children.len(),
            _ => 0,
        }
    }

    #[test]
    fn test_inline_prefers_doc_summary() {
        let renderer = Renderer::new("https://example.com/blob/main/");
        let inline = renderer.render_inline(&documented());
        assert_eq!(inline.display_text, "parse");
        assert_eq!(
            inline.link_target,
            "https://example.com/blob/main/src/core/parse.ts#L12"
        );
        assert_eq!(inline.tooltip, "Parses source text.");
    }

    #[test]
    fn test_inline_falls_back_to_signature() {
        let inline = Renderer::default().render_inline(&decl("run", "a.ts", 3));
        assert_eq!(inline.tooltip, "function run()");
        assert_eq!(inline.link_target, "a.ts#L3");
    }

    #[test]
    fn test_block_renders_all_sections_by_default() {
        let block = Renderer::default().render_block(&documented(), &BlockOptions::default());
        let Node::Container(container) = &block else {
            panic!("expected container");
        };
        assert_eq!(
            container.kind,
            ContainerKind::Symbol {
                id: "src/core/parse.ts#parse".to_string()
            }
        );
        let text = block.text_content();
        assert!(text.contains("function parse(input: string, strict?: boolean): Ast"));
        assert!(text.contains("Returns a syntax tree."));
        assert!(text.contains("Deprecated: Use parseModule."));
        assert!(text.contains("input: string - Text to parse."));
        assert!(text.contains("strict?: boolean"));
        assert!(text.contains("Source: src/core/parse.ts:12"));
    }

    #[test]
    fn test_block_show_limits_sections() {
        let renderer = Renderer::default();
        let options = BlockOptions::parse_show("signature, source-link").unwrap();
        let block = renderer.render_block(&documented(), &options);
        // heading + signature + link
        assert_eq!(section_count(&block), 3);
        assert!(!block.text_content().contains("Text to parse."));

        let only_description = BlockOptions::parse_show("description").unwrap();
        let bare = renderer.render_block(&decl("run", "a.ts", 3), &only_description);
        // Nothing to describe: only the heading remains.
        assert_eq!(section_count(&bare), 1);
    }

    #[test]
    fn test_parse_show() {
        let options = BlockOptions::parse_show("Parameters,signature,").unwrap();
        assert!(options.includes(BlockSection::Parameters));
        assert!(!options.includes(BlockSection::SourceLink));
        assert!(BlockOptions::parse_show("").unwrap().includes(BlockSection::Members));

        let err = BlockOptions::parse_show("signature,examples").unwrap_err();
        assert_eq!(err, UnknownSection("examples".to_string()));
    }

    #[test]
    fn test_member_rendering() {
        let mut class = decl("Stack", "a.ts", 1);
        class.members.push(Member {
            name: "push".to_string(),
            kind: MemberKind::Method,
            signature: "push(item: T): void".to_string(),
            line: 7,
            doc: Some(DocComment {
                description: "Pushes an item.".to_string(),
                ..Default::default()
            }),
        });

        let renderer = Renderer::default();
        let block = renderer.render_block(&class, &BlockOptions::default());
        assert!(block.text_content().contains("push(item: T): void - Pushes an item."));

        let resolved = Resolved {
            declaration: &class,
            member: class.members.first(),
        };
        let inline = renderer.render_resolved_inline(&resolved);
        assert_eq!(inline.display_text, "Stack.push");
        assert_eq!(inline.link_target, "a.ts#L7");
        assert_eq!(inline.tooltip, "Pushes an item.");
    }
}
