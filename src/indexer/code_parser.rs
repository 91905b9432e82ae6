use super::doc_comment::parse_doc_comment;
use super::languages::LanguageConfig;
use crate::catalog::{Declaration, DeclarationKind, DocComment, Member, MemberKind, Param};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tree_sitter::{Node, Parser, Query, QueryCursor, StreamingIterator};

/// Constant initializers longer than this are left out of the signature.
const MAX_INLINE_VALUE: usize = 60;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("source is not valid UTF-8")]
    NotUtf8,

    #[error("syntax error at line {line}")]
    Syntax { line: usize },

    #[error("tree-sitter: {0}")]
    Language(String),
}

/// Extracts exported declarations from TypeScript and JavaScript sources.
pub struct DeclarationParser {
    queries: HashMap<String, Query>,
}

impl DeclarationParser {
    pub fn new() -> Result<Self, ParseError> {
        let mut queries = HashMap::new();
        for config in LanguageConfig::get_all() {
            let query = Query::new(&config.language, config.export_query)
                .map_err(|e| ParseError::Language(e.to_string()))?;
            queries.insert(config.name.to_string(), query);
        }
        Ok(Self { queries })
    }

    /// Language name for a path, by extension.
    pub fn language_for(path: &Path) -> Option<&'static str> {
        let ext = path.extension().and_then(|e| e.to_str())?;
        LanguageConfig::get_by_extension(ext).map(|c| c.name)
    }

    /// Parse `source` and return its exported declarations in source order.
    ///
    /// `origin` is recorded verbatim on every declaration.
    pub fn parse_code(
        &self,
        source: &[u8],
        lang_name: &str,
        origin: &str,
    ) -> Result<Vec<Declaration>, ParseError> {
        let config = LanguageConfig::get_by_name(lang_name)
            .ok_or_else(|| ParseError::Unsupported(lang_name.to_string()))?;
        let text = std::str::from_utf8(source).map_err(|_| ParseError::NotUtf8)?;

        let mut parser = Parser::new();
        parser
            .set_language(&config.language)
            .map_err(|e| ParseError::Language(e.to_string()))?;
        let tree = parser
            .parse(text, None)
            .ok_or_else(|| ParseError::Language("parser produced no tree".to_string()))?;

        let root = tree.root_node();
        if root.has_error() {
            let line = first_error_line(root).unwrap_or(1);
            return Err(ParseError::Syntax { line });
        }

        self.extract_exports(root, text, lang_name, origin)
    }

    fn extract_exports(
        &self,
        root: Node,
        source: &str,
        lang: &str,
        origin: &str,
    ) -> Result<Vec<Declaration>, ParseError> {
        let query = self
            .queries
            .get(lang)
            .ok_or_else(|| ParseError::Unsupported(lang.to_string()))?;
        let mut cursor = QueryCursor::new();

        let mut declarations = Vec::new();
        let mut seen = HashSet::new();

        let mut matches = cursor.matches(query, root, source.as_bytes());
        while let Some(m) = matches.next() {
            let mut export_node = None;
            let mut decl_node = None;

            for cap in m.captures {
                match query.capture_names()[cap.index as usize] {
                    "export" => export_node = Some(cap.node),
                    "declaration" => decl_node = Some(cap.node),
                    _ => {}
                }
            }

            let (Some(export_node), Some(decl_node)) = (export_node, decl_node) else {
                continue;
            };

            let doc = doc_comment_before(export_node, source);
            let mut extracted = Vec::new();
            collect_declaration(decl_node, source, origin, doc.as_ref(), &mut extracted);

            // Overloads repeat a name; the first signature carries the docs.
            for decl in extracted {
                if seen.insert((decl.name.clone(), decl.kind)) {
                    declarations.push(decl);
                }
            }
        }

        Ok(declarations)
    }
}

fn collect_declaration(
    node: Node,
    source: &str,
    origin: &str,
    doc: Option<&DocComment>,
    out: &mut Vec<Declaration>,
) {
    let kind = match node.kind() {
        "function_declaration" | "generator_function_declaration" | "function_signature" => {
            DeclarationKind::Function
        }
        "class_declaration" | "abstract_class_declaration" => DeclarationKind::Class,
        "interface_declaration" => DeclarationKind::Interface,
        "type_alias_declaration" => DeclarationKind::TypeAlias,
        "enum_declaration" => DeclarationKind::Enum,
        "lexical_declaration" | "variable_declaration" => {
            collect_variables(node, source, origin, doc, out);
            return;
        }
        "ambient_declaration" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_declaration(child, source, origin, doc, out);
            }
            return;
        }
        // namespaces, `import x = require()` and anonymous defaults
        _ => return,
    };

    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = text(name_node, source).to_string();

    let params = node
        .child_by_field_name("parameters")
        .map(|p| extract_params(p, source))
        .unwrap_or_default();

    let members = match kind {
        DeclarationKind::Class | DeclarationKind::Interface | DeclarationKind::Enum => node
            .child_by_field_name("body")
            .map(|b| extract_members(b, source))
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    out.push(Declaration {
        id: Declaration::make_id(origin, &name),
        name,
        kind,
        signature: header_signature(node, "body", source),
        origin: origin.to_string(),
        line: node.start_position().row + 1,
        doc: doc.cloned(),
        params,
        members,
    });
}

/// `export const a = 1, f = () => {}` yields one declaration per binding.
fn collect_variables(
    node: Node,
    source: &str,
    origin: &str,
    doc: Option<&DocComment>,
    out: &mut Vec<Declaration>,
) {
    let keyword = match node.child_by_field_name("kind") {
        Some(k) => text(k, source),
        None => "var",
    };

    let mut cursor = node.walk();
    for declarator in node.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = declarator.child_by_field_name("name") else {
            continue;
        };
        // Destructuring patterns export several names with no single signature.
        if name_node.kind() != "identifier" {
            continue;
        }
        let name = text(name_node, source).to_string();
        let value = declarator.child_by_field_name("value");

        let function_value = value.filter(|v| {
            matches!(
                v.kind(),
                "arrow_function" | "function_expression" | "function" | "generator_function"
            )
        });

        let (kind, signature, params) = match function_value {
            Some(func) => {
                let end = func
                    .child_by_field_name("body")
                    .map_or(func.end_byte(), |b| b.start_byte());
                let head = normalize(&source[declarator.start_byte()..end]);
                let head = head.trim_end().trim_end_matches("=>").trim_end();
                let params = match func.child_by_field_name("parameters") {
                    Some(p) => extract_params(p, source),
                    None => func
                        .child_by_field_name("parameter")
                        .map(|p| {
                            vec![Param {
                                name: text(p, source).to_string(),
                                ty: None,
                                optional: false,
                            }]
                        })
                        .unwrap_or_default(),
                };
                (
                    DeclarationKind::Function,
                    format!("{keyword} {head}"),
                    params,
                )
            }
            None => (
                DeclarationKind::Constant,
                constant_signature(keyword, &name, declarator, source),
                Vec::new(),
            ),
        };

        out.push(Declaration {
            id: Declaration::make_id(origin, &name),
            name,
            kind,
            signature,
            origin: origin.to_string(),
            line: declarator.start_position().row + 1,
            doc: doc.cloned(),
            params,
            members: Vec::new(),
        });
    }
}

fn constant_signature(keyword: &str, name: &str, declarator: Node, source: &str) -> String {
    if let Some(ty) = declarator.child_by_field_name("type") {
        return format!("{keyword} {name}{}", normalize(text(ty, source)));
    }
    match declarator.child_by_field_name("value") {
        Some(value) => {
            let value = text(value, source);
            if value.len() <= MAX_INLINE_VALUE && !value.contains('\n') {
                format!("{keyword} {name} = {value}")
            } else {
                format!("{keyword} {name}")
            }
        }
        None => format!("{keyword} {name}"),
    }
}

fn extract_params(node: Node, source: &str) -> Vec<Param> {
    let mut params = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let param = match child.kind() {
            "comment" => continue,
            "required_parameter" | "optional_parameter" => {
                let name = child
                    .child_by_field_name("pattern")
                    .map_or_else(|| text(child, source), |p| text(p, source));
                let ty = child.child_by_field_name("type").map(|t| {
                    normalize(text(t, source).trim_start_matches(':'))
                });
                Param {
                    name: name.to_string(),
                    ty,
                    optional: child.kind() == "optional_parameter"
                        || child.child_by_field_name("value").is_some(),
                }
            }
            "assignment_pattern" => Param {
                name: child
                    .child_by_field_name("left")
                    .map_or_else(|| text(child, source), |l| text(l, source))
                    .to_string(),
                ty: None,
                optional: true,
            },
            _ => Param {
                name: text(child, source).to_string(),
                ty: None,
                optional: false,
            },
        };
        if param.name != "this" {
            params.push(param);
        }
    }
    params
}

fn extract_members(body: Node, source: &str) -> Vec<Member> {
    let mut members: Vec<Member> = Vec::new();
    let mut cursor = body.walk();

    for child in body.named_children(&mut cursor) {
        let (kind, name_node) = match child.kind() {
            "method_definition" | "method_signature" | "abstract_method_signature" => {
                (MemberKind::Method, child.child_by_field_name("name"))
            }
            "public_field_definition" | "property_signature" => {
                (MemberKind::Property, child.child_by_field_name("name"))
            }
            "field_definition" => (MemberKind::Property, child.child_by_field_name("property")),
            "enum_assignment" => (MemberKind::EnumMember, child.child_by_field_name("name")),
            "property_identifier" | "string" => (MemberKind::EnumMember, Some(child)),
            _ => continue,
        };

        let Some(name_node) = name_node else {
            continue;
        };
        if name_node.kind() == "private_property_identifier" || !is_public(child, source) {
            continue;
        }

        let name = text(name_node, source)
            .trim_matches(|c| c == '"' || c == '\'')
            .to_string();
        if members.iter().any(|m| m.name == name) {
            continue;
        }

        let signature = match (kind, child.child_by_field_name("value")) {
            (MemberKind::Property, Some(value)) => {
                let head = normalize(&source[child.start_byte()..value.start_byte()]);
                head.trim_end_matches('=').trim_end().to_string()
            }
            (MemberKind::EnumMember, _) => normalize(text(child, source)),
            _ => header_signature(child, "body", source),
        };

        members.push(Member {
            name,
            kind,
            signature,
            line: child.start_position().row + 1,
            doc: doc_comment_before(child, source),
        });
    }

    members
}

fn is_public(member: Node, source: &str) -> bool {
    let mut cursor = member.walk();
    let hidden = member
        .children(&mut cursor)
        .filter(|c| c.kind() == "accessibility_modifier")
        .any(|c| text(c, source) != "public");
    !hidden
}

/// Text of `node` up to its body (or all of it), whitespace-collapsed.
fn header_signature(node: Node, body_field: &str, source: &str) -> String {
    let head = match node.child_by_field_name(body_field) {
        Some(body) => &source[node.start_byte()..body.start_byte()],
        None => text(node, source),
    };
    normalize(head)
        .trim_end_matches([';', ','])
        .trim_end()
        .to_string()
}

/// `/** ... */` directly above `node`, with no blank line in between.
fn doc_comment_before(node: Node, source: &str) -> Option<DocComment> {
    let prev = node.prev_sibling()?;
    if prev.kind() != "comment" {
        return None;
    }
    if prev.end_position().row + 1 < node.start_position().row {
        return None;
    }
    parse_doc_comment(text(prev, source))
}

fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(line) = first_error_line(child) {
            return Some(line);
        }
    }
    Some(node.start_position().row + 1)
}

fn text<'s>(node: Node, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str, lang: &str) -> Vec<Declaration> {
        let parser = DeclarationParser::new().expect("Failed to initialize DeclarationParser");
        parser
            .parse_code(source.as_bytes(), lang, "src/lib/x.ts")
            .expect("Failed to parse source")
    }

    fn find<'a>(decls: &'a [Declaration], name: &str) -> &'a Declaration {
        decls
            .iter()
            .find(|d| d.name == name)
            .unwrap_or_else(|| panic!("{name} not extracted"))
    }

    #[test]
    fn test_parse_typescript_exports() {
        let source = r#"
import { helper } from "./helper";

/**
 * Adds two numbers.
 * @param a - First operand.
 */
export function add(a: number, b?: number): number {
    return a + (b ?? 0);
}

function internal() {}

export class Stack<T> extends Base {
    private items: T[] = [];
    /** Pushes an item. */
    push(item: T): void {}
    protected peekInternal(): T {}
    #secret = 1;
}

export interface Options {
    verbose: boolean;
    run(target: string): Promise<void>;
}

export type Id = string | number;

export const LIMIT = 10;
export const greet = (name: string): string => `hi ${name}`;

export enum Color { Red, Green = "green" }
"#;

        let decls = parse(source, "typescript");
        let names: Vec<&str> = decls.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["add", "Stack", "Options", "Id", "LIMIT", "greet", "Color"]
        );

        let add = find(&decls, "add");
        assert_eq!(add.kind, DeclarationKind::Function);
        assert_eq!(add.signature, "function add(a: number, b?: number): number");
        assert_eq!(add.line, 8);
        assert_eq!(add.id, "src/lib/x.ts#add");
        let doc = add.doc.as_ref().expect("doc comment");
        assert_eq!(doc.summary(), Some("Adds two numbers."));
        assert_eq!(doc.param("a"), Some("First operand."));
        assert_eq!(add.params.len(), 2);
        assert_eq!(add.params[0].ty.as_deref(), Some("number"));
        assert!(add.params[1].optional);

        let stack = find(&decls, "Stack");
        assert_eq!(stack.kind, DeclarationKind::Class);
        assert_eq!(stack.signature, "class Stack<T> extends Base");
        let member_names: Vec<&str> = stack.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(member_names, vec!["push"]);
        assert_eq!(
            stack.members[0].doc.as_ref().and_then(|d| d.summary()),
            Some("Pushes an item.")
        );

        let options = find(&decls, "Options");
        assert_eq!(options.kind, DeclarationKind::Interface);
        assert_eq!(options.members.len(), 2);
        assert_eq!(options.members[1].kind, MemberKind::Method);

        assert_eq!(find(&decls, "Id").signature, "type Id = string | number");
        assert_eq!(find(&decls, "LIMIT").signature, "const LIMIT = 10");
        assert_eq!(find(&decls, "LIMIT").kind, DeclarationKind::Constant);

        let greet = find(&decls, "greet");
        assert_eq!(greet.kind, DeclarationKind::Function);
        assert_eq!(greet.signature, "const greet = (name: string): string");

        let color = find(&decls, "Color");
        let variants: Vec<&str> = color.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(variants, vec!["Red", "Green"]);
    }

    #[test]
    fn test_doc_comment_must_be_adjacent() {
        let source = "/** Detached. */\n\nexport const a = 1;\n/** Attached. */\nexport const b = 2;\n";
        let decls = parse(source, "typescript");
        assert!(find(&decls, "a").doc.is_none());
        assert_eq!(
            find(&decls, "b").doc.as_ref().and_then(|d| d.summary()),
            Some("Attached.")
        );
    }

    #[test]
    fn test_overloads_collapse_to_first() {
        let source = r#"
/** Formats a value. */
export function format(v: string): string;
export function format(v: number): string;
export function format(v: any): string { return String(v); }
"#;
        let decls = parse(source, "typescript");
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].signature, "function format(v: string): string");
        assert!(decls[0].doc.is_some());
    }

    #[test]
    fn test_ambient_and_default_exports() {
        let source = r#"
export declare function load(path: string): void;
export declare const VERSION: string;
export default class App {}
export { add as plus } from "./math";
"#;
        let decls = parse(source, "typescript");
        assert_eq!(find(&decls, "load").kind, DeclarationKind::Function);
        assert_eq!(find(&decls, "VERSION").signature, "const VERSION: string");
        assert_eq!(find(&decls, "App").kind, DeclarationKind::Class);
        assert_eq!(decls.len(), 3);
    }

    #[test]
    fn test_parse_javascript_exports() {
        let source = r#"
export function run(target, retries = 3) {}
export class Runner { start() {} }
export let counter = 0;
"#;
        let decls = parse(source, "javascript");
        let run = find(&decls, "run");
        assert_eq!(run.params.len(), 2);
        assert!(run.params[1].optional);
        assert_eq!(run.params[1].name, "retries");
        assert_eq!(find(&decls, "Runner").members[0].name, "start");
        assert_eq!(find(&decls, "counter").signature, "let counter = 0");
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let parser = DeclarationParser::new().unwrap();
        let err = parser
            .parse_code(b"export const a = 1;\nexport function ( {\n", "typescript", "a.ts")
            .unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }

    #[test]
    fn test_invalid_utf8() {
        let parser = DeclarationParser::new().unwrap();
        let err = parser
            .parse_code(&[0xff, 0xfe, 0x00], "typescript", "a.ts")
            .unwrap_err();
        assert!(matches!(err, ParseError::NotUtf8));
    }

    #[test]
    fn test_language_for_path() {
        assert_eq!(
            DeclarationParser::language_for(Path::new("src/a.tsx")),
            Some("tsx")
        );
        assert_eq!(DeclarationParser::language_for(Path::new("README.md")), None);
    }
}
