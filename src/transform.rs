//! Expands symbol references in a document tree.
//!
//! Directives are validated up front, then resolved into blocks; any failure
//! there aborts the document. Inline `{@...}` references are resolved
//! afterwards and degrade to a visible marker plus a warning.
//!
//! Markdown is rewritten in place: only the directives and references are
//! replaced, everything else is kept byte for byte.
use crate::catalog::Catalog;
use crate::document::markdown::{self, Span};
use crate::document::{Container, ContainerKind, Directive, Node, ReferenceError, SYMBOL_DIRECTIVE};
use crate::render::{BlockOptions, Renderer};
use crate::resolver::{DEFAULT_MAX_SUGGESTIONS, ReferenceToken, ResolveError, Resolver};
use regex::Regex;
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

static INLINE_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{@([^{}\s]+)\}").expect("inline reference regex is valid"));

/// Where in which document something happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub path: Option<PathBuf>,
    pub line: Option<usize>,
}

impl Location {
    fn new(path: Option<&Path>, line: Option<usize>) -> Self {
        Self {
            path: path.map(Path::to_path_buf),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.path, self.line) {
            (Some(path), Some(line)) => write!(f, "{}:{line}", path.display()),
            (Some(path), None) => write!(f, "{}", path.display()),
            (None, Some(line)) => write!(f, "line {line}"),
            (None, None) => f.write_str("<document>"),
        }
    }
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("symbol directive at {location} has no symbol name")]
    MissingReferencePayload { location: Location },

    #[error("symbol directive at {location} must name exactly one symbol, got {payload:?}")]
    InvalidReferencePayload { location: Location, payload: String },

    #[error("symbol directive at {location} has an invalid show option: {message}")]
    InvalidShowOption { location: Location, message: String },

    #[error("cannot resolve {reference:?} at {location}: {source}")]
    Unresolved {
        reference: String,
        location: Location,
        #[source]
        source: ResolveError,
    },
}

/// One inline reference that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineDiagnostic {
    /// The token as written, e.g. `{@Bar}`.
    pub reference: String,
    pub error: ResolveError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub blocks_resolved: usize,
    pub inline_resolved: usize,
    pub diagnostics: Vec<InlineDiagnostic>,
    /// No catalog was available; the tree was left untouched.
    pub skipped: bool,
}

/// A validated `symbol` directive.
struct BlockRequest {
    token: ReferenceToken,
    reference: String,
    options: BlockOptions,
    location: Location,
}

pub struct ReferenceTransform<'a> {
    catalog: Option<&'a Catalog>,
    renderer: &'a Renderer,
    max_suggestions: usize,
}

impl<'a> ReferenceTransform<'a> {
    /// `catalog` is `None` when loading failed; every call is then a no-op.
    pub fn new(catalog: Option<&'a Catalog>, renderer: &'a Renderer) -> Self {
        Self {
            catalog,
            renderer,
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
        }
    }

    pub fn with_max_suggestions(mut self, max_suggestions: usize) -> Self {
        self.max_suggestions = max_suggestions;
        self
    }

    /// Expand every directive and inline reference in `tree`.
    ///
    /// `source` is only used in messages.
    pub fn apply(
        &self,
        tree: &mut Node,
        source: Option<&Path>,
    ) -> Result<TransformReport, TransformError> {
        let mut report = TransformReport::default();
        let Some(catalog) = self.catalog else {
            debug!(
                "No catalog loaded, leaving {} untouched",
                Location::new(source, None)
            );
            report.skipped = true;
            return Ok(report);
        };

        for directive in tree.directives() {
            if directive.name == SYMBOL_DIRECTIVE {
                validate(directive, source)?;
            }
        }

        let resolver = Resolver::new(catalog).with_max_suggestions(self.max_suggestions);
        self.block_pass(&resolver, tree, source, &mut report)?;
        self.inline_pass(&resolver, tree, source, &mut report);

        debug!(
            "{}: {} blocks, {} inline references, {} unresolved",
            Location::new(source, None),
            report.blocks_resolved,
            report.inline_resolved,
            report.diagnostics.len()
        );
        Ok(report)
    }

    /// Expand a Markdown document. Directives and inline references are
    /// spliced into `text`; without a catalog it comes back unchanged.
    pub fn apply_markdown(
        &self,
        text: &str,
        source: Option<&Path>,
    ) -> Result<(String, TransformReport), TransformError> {
        let Some(catalog) = self.catalog else {
            return self.apply(&mut Node::text(""), source).map(|r| (text.to_string(), r));
        };

        let spans = markdown::scan(text);
        let mut requests = Vec::new();
        for span in &spans {
            if let Span::Directive { range, directive } = span {
                requests.push((range.clone(), validate(directive, source)?));
            }
        }

        let resolver = Resolver::new(catalog).with_max_suggestions(self.max_suggestions);
        let mut report = TransformReport::default();
        let mut edits: Vec<(Range<usize>, String)> = Vec::new();

        for (range, request) in requests {
            let block = self.resolve_block(&resolver, &request)?;
            let rendered = fit_block(text, &range, &markdown::to_markdown(&block));
            edits.push((range, rendered));
            report.blocks_resolved += 1;
        }

        for span in &spans {
            let Span::Text(range) = span else {
                continue;
            };
            for m in INLINE_REFERENCE.find_iter(&text[range.clone()]) {
                let node = self.resolve_inline(&resolver, m.as_str(), source, &mut report);
                edits.push((
                    range.start + m.start()..range.start + m.end(),
                    markdown::inline_markdown(&node),
                ));
            }
        }

        edits.sort_by_key(|(range, _)| range.start);
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for (range, replacement) in edits {
            out.push_str(&text[last..range.start]);
            out.push_str(&replacement);
            last = range.end;
        }
        out.push_str(&text[last..]);

        debug!(
            "{}: {} blocks, {} inline references, {} unresolved",
            Location::new(source, None),
            report.blocks_resolved,
            report.inline_resolved,
            report.diagnostics.len()
        );
        Ok((out, report))
    }

    fn resolve_block(
        &self,
        resolver: &Resolver<'_>,
        request: &BlockRequest,
    ) -> Result<Node, TransformError> {
        let resolved = resolver
            .resolve(&request.token)
            .map_err(|e| TransformError::Unresolved {
                reference: request.reference.clone(),
                location: request.location.clone(),
                source: e,
            })?;
        Ok(self.renderer.render_resolved_block(&resolved, &request.options))
    }

    /// The link for `reference`, or an error marker when it does not resolve.
    fn resolve_inline(
        &self,
        resolver: &Resolver<'_>,
        reference: &str,
        source: Option<&Path>,
        report: &mut TransformReport,
    ) -> Node {
        match resolver.resolve_str(reference) {
            Ok(resolved) => {
                report.inline_resolved += 1;
                self.renderer.inline_node(&resolved)
            }
            Err(error) => {
                warn!("{}: {reference}: {error}", Location::new(source, None));
                let marker = Node::ReferenceError(ReferenceError {
                    reference: reference.to_string(),
                    message: error.to_string(),
                });
                report.diagnostics.push(InlineDiagnostic {
                    reference: reference.to_string(),
                    error,
                });
                marker
            }
        }
    }

    fn block_pass(
        &self,
        resolver: &Resolver<'_>,
        node: &mut Node,
        source: Option<&Path>,
        report: &mut TransformReport,
    ) -> Result<(), TransformError> {
        let Node::Container(container) = node else {
            return Ok(());
        };

        for i in 0..container.children.len() {
            if matches!(container.children[i], Node::Container(_)) {
                self.block_pass(resolver, &mut container.children[i], source, report)?;
                continue;
            }
            let request = match &container.children[i] {
                Node::Directive(directive) if directive.name == SYMBOL_DIRECTIVE => {
                    validate(directive, source)?
                }
                _ => continue,
            };

            let block = self.resolve_block(resolver, &request)?;
            container.replace(i, block);
            report.blocks_resolved += 1;
        }
        Ok(())
    }

    fn inline_pass(
        &self,
        resolver: &Resolver<'_>,
        node: &mut Node,
        source: Option<&Path>,
        report: &mut TransformReport,
    ) {
        let Node::Container(container) = node else {
            return;
        };
        // Rendered blocks are final.
        if matches!(container.kind, ContainerKind::Symbol { .. }) {
            return;
        }
        self.inline_children(resolver, container, source, report);
    }

    fn inline_children(
        &self,
        resolver: &Resolver<'_>,
        container: &mut Container,
        source: Option<&Path>,
        report: &mut TransformReport,
    ) {
        let mut i = 0;
        while i < container.children.len() {
            if let Node::Text(text) = &container.children[i] {
                if let Some(replacement) = self.expand_text(resolver, text, source, report) {
                    let count = replacement.len();
                    container.splice(i, replacement);
                    i += count;
                    continue;
                }
            } else {
                self.inline_pass(resolver, &mut container.children[i], source, report);
            }
            i += 1;
        }
    }

    /// Replacement nodes for `text`, or `None` when it has no references.
    fn expand_text(
        &self,
        resolver: &Resolver<'_>,
        text: &str,
        source: Option<&Path>,
        report: &mut TransformReport,
    ) -> Option<Vec<Node>> {
        let mut nodes = Vec::new();
        let mut last = 0;

        for m in INLINE_REFERENCE.find_iter(text) {
            if m.start() > last {
                nodes.push(Node::text(&text[last..m.start()]));
            }
            last = m.end();
            nodes.push(self.resolve_inline(resolver, m.as_str(), source, report));
        }

        if nodes.is_empty() {
            return None;
        }
        if last < text.len() {
            nodes.push(Node::text(&text[last..]));
        }
        Some(nodes)
    }
}

/// Rendered block Markdown shaped to replace `text[range]`: continuation lines
/// repeat the quote markers in front of the fence and indent past list markers.
fn fit_block(text: &str, range: &Range<usize>, rendered: &str) -> String {
    let line_start = text[..range.start].rfind('\n').map_or(0, |i| i + 1);
    let prefix: String = text[line_start..range.start]
        .chars()
        .map(|c| if matches!(c, '>' | '\t') { c } else { ' ' })
        .collect();
    let separator = format!("\n{prefix}");
    let mut out = rendered.lines().collect::<Vec<_>>().join(separator.as_str());
    if text[..range.end].ends_with('\n') {
        out.push('\n');
    }
    out
}

fn validate(directive: &Directive, source: Option<&Path>) -> Result<BlockRequest, TransformError> {
    let location = Location::new(source, directive.line);
    let payload = directive.payload.as_deref().map(str::trim).unwrap_or_default();

    let names: Vec<&str> = payload
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .collect();
    let reference = match names.as_slice() {
        [] => return Err(TransformError::MissingReferencePayload { location }),
        [one] => *one,
        _ => {
            return Err(TransformError::InvalidReferencePayload {
                location,
                payload: payload.to_string(),
            });
        }
    };

    let options = match directive.attribute("show") {
        Some(show) => BlockOptions::parse_show(show).map_err(|e| {
            TransformError::InvalidShowOption {
                location: location.clone(),
                message: e.to_string(),
            }
        })?,
        None => BlockOptions::default(),
    };

    let token = ReferenceToken::parse(reference).map_err(|e| TransformError::Unresolved {
        reference: reference.to_string(),
        location: location.clone(),
        source: e,
    })?;

    Ok(BlockRequest {
        token,
        reference: reference.to_string(),
        options,
        location,
    })
}
