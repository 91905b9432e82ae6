//! Symbol resolution against a loaded catalog.
//!
//! Lookup order is fixed: exact name, then cardinality, then the path hint,
//! then cardinality again. Which error a caller sees depends on it.
use crate::catalog::{Catalog, Declaration, Member};
use thiserror::Error;

pub mod disambiguate;
pub mod suggest;
pub mod token;

pub use token::ReferenceToken;

/// Default number of name suggestions attached to `NotFound`.
pub const DEFAULT_MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbiguityReason {
    /// Several declarations share the name and no hint was given.
    NoHint,
    /// The hint excluded every candidate.
    HintMatchedNothing,
    /// The hint left more than one candidate.
    HintNotSpecific,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("symbol \"{name}\" not found{}", did_you_mean(.suggestions))]
    NotFound {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("{}", ambiguous_message(.name, .hint, .reason, .candidates))]
    Ambiguous {
        name: String,
        hint: Option<String>,
        reason: AmbiguityReason,
        candidates: Vec<String>,
    },

    #[error("\"{name}\" has no member \"{member}\"{}", did_you_mean(.suggestions))]
    MemberNotFound {
        name: String,
        member: String,
        suggestions: Vec<String>,
    },

    #[error("invalid reference {raw:?}")]
    InvalidToken { raw: String },
}

fn did_you_mean(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!("; did you mean: {}?", suggestions.join(", "))
    }
}

fn ambiguous_message(
    name: &str,
    hint: &Option<String>,
    reason: &AmbiguityReason,
    candidates: &[String],
) -> String {
    let list = candidates.join(", ");
    let hint = hint.as_deref().unwrap_or_default();
    match reason {
        AmbiguityReason::NoHint => {
            format!("symbol \"{name}\" is ambiguous; qualify it with one of: {list}")
        }
        AmbiguityReason::HintMatchedNothing => format!(
            "path hint \"{hint}\" matched none of the declarations named \"{name}\"; candidates: {list}"
        ),
        AmbiguityReason::HintNotSpecific => format!(
            "path hint \"{hint}\" for symbol \"{name}\" is not specific enough; still matching: {list}"
        ),
    }
}

/// A resolved reference: the declaration and, for `Name.member`, the member.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved<'c> {
    pub declaration: &'c Declaration,
    pub member: Option<&'c Member>,
}

impl Resolved<'_> {
    /// `Name` or `Name.member`.
    pub fn display_name(&self) -> String {
        match self.member {
            Some(m) => format!("{}.{}", self.declaration.name, m.name),
            None => self.declaration.name.clone(),
        }
    }
}

/// Resolves reference tokens against one immutable catalog.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'c> {
    catalog: &'c Catalog,
    max_suggestions: usize,
}

impl<'c> Resolver<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self {
            catalog,
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
        }
    }

    pub fn with_max_suggestions(mut self, max_suggestions: usize) -> Self {
        self.max_suggestions = max_suggestions;
        self
    }

    /// Parse `raw` (`a/Foo`, `{@Foo.bar}`, ...) and resolve it.
    pub fn resolve_str(&self, raw: &str) -> Result<Resolved<'c>, ResolveError> {
        self.resolve(&ReferenceToken::parse(raw)?)
    }

    /// Resolve the declaration, then the member suffix if any.
    pub fn resolve(&self, token: &ReferenceToken) -> Result<Resolved<'c>, ResolveError> {
        let declaration = self.lookup(token)?;

        let member = match &token.member {
            None => None,
            Some(member) => match declaration.member(member) {
                Some(m) => Some(m),
                None => {
                    return Err(ResolveError::MemberNotFound {
                        name: declaration.name.clone(),
                        member: member.clone(),
                        suggestions: suggest::suggestions(
                            member,
                            declaration.members.iter().map(|m| m.name.as_str()),
                            self.max_suggestions,
                        ),
                    });
                }
            },
        };

        Ok(Resolved {
            declaration,
            member,
        })
    }

    /// The declaration named by `token`, ignoring any member suffix.
    pub fn lookup(&self, token: &ReferenceToken) -> Result<&'c Declaration, ResolveError> {
        let candidates = self.catalog.get(&token.name);

        match candidates {
            [] => Err(ResolveError::NotFound {
                name: token.name.clone(),
                suggestions: suggest::suggestions(
                    &token.name,
                    self.catalog.names(),
                    self.max_suggestions,
                ),
            }),
            // A hint on an unambiguous name is accepted as is.
            [only] => Ok(only),
            _ => {
                if token.hint.is_none() && token.kind.is_none() {
                    return Err(ResolveError::Ambiguous {
                        name: token.name.clone(),
                        hint: None,
                        reason: AmbiguityReason::NoHint,
                        candidates: disambiguate::candidate_labels(candidates),
                    });
                }

                let mut survivors = match token.hint.as_deref() {
                    Some(hint) => disambiguate::filter_by_hint(hint, candidates),
                    None => candidates.iter().collect(),
                };
                if let Some(kind) = token.kind {
                    survivors.retain(|d| d.kind == kind);
                }

                let qualifier = qualifier(token);
                match survivors.as_slice() {
                    [one] => Ok(*one),
                    [] => Err(ResolveError::Ambiguous {
                        name: token.name.clone(),
                        hint: Some(qualifier),
                        reason: AmbiguityReason::HintMatchedNothing,
                        candidates: disambiguate::candidate_labels(candidates),
                    }),
                    tied => {
                        // Labels stay minimal relative to every same-named sibling.
                        let labels = disambiguate::candidate_labels(candidates);
                        let still: Vec<String> = candidates
                            .iter()
                            .zip(labels)
                            .filter(|(c, _)| tied.iter().any(|t| std::ptr::eq(*t, *c)))
                            .map(|(_, label)| label)
                            .collect();
                        Err(ResolveError::Ambiguous {
                            name: token.name.clone(),
                            hint: Some(qualifier),
                            reason: AmbiguityReason::HintNotSpecific,
                            candidates: still,
                        })
                    }
                }
            }
        }
    }
}

/// The hint and kind as written in the reference: `a/x.ts`, `:class`, `a/x.ts:class`.
fn qualifier(token: &ReferenceToken) -> String {
    let hint = token.hint.as_deref().unwrap_or_default();
    match token.kind {
        Some(kind) => format!("{hint}:{kind}"),
        None => hint.to_string(),
    }
}

/// Resolve `token` against `catalog` with default settings.
pub fn resolve<'c>(
    token: &ReferenceToken,
    catalog: &'c Catalog,
) -> Result<&'c Declaration, ResolveError> {
    Resolver::new(catalog).lookup(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_support::decl;
    use crate::catalog::{DeclarationKind, Member, MemberKind};

    fn foo_catalog() -> Catalog {
        Catalog::from_declarations(vec![decl("Foo", "b/x.ts", 4), decl("Foo", "a/x.ts", 2)])
    }

    #[test]
    fn test_ambiguous_without_hint() {
        let catalog = foo_catalog();
        let err = resolve(&ReferenceToken::new("Foo"), &catalog).unwrap_err();
        match &err {
            ResolveError::Ambiguous {
                reason, candidates, ..
            } => {
                assert_eq!(*reason, AmbiguityReason::NoHint);
                assert_eq!(candidates, &vec!["a/x.ts#Foo", "b/x.ts#Foo"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "symbol \"Foo\" is ambiguous; qualify it with one of: a/x.ts#Foo, b/x.ts#Foo"
        );
    }

    #[test]
    fn test_hint_selects_candidate() {
        let catalog = foo_catalog();
        let decl = Resolver::new(&catalog).resolve_str("{@a/Foo}").unwrap().declaration;
        assert_eq!(decl.origin, "a/x.ts");

        // The labels printed in errors are valid references.
        let decl = resolve(&ReferenceToken::parse("b/x.ts#Foo").unwrap(), &catalog).unwrap();
        assert_eq!(decl.origin, "b/x.ts");
    }

    #[test]
    fn test_hint_matching_nothing() {
        let catalog = foo_catalog();
        let err = resolve(&ReferenceToken::new("Foo").with_hint("c"), &catalog).unwrap_err();
        assert_eq!(
            err.to_string(),
            "path hint \"c\" matched none of the declarations named \"Foo\"; candidates: a/x.ts#Foo, b/x.ts#Foo"
        );
    }

    #[test]
    fn test_hint_not_specific() {
        let catalog = Catalog::from_declarations(vec![
            decl("Foo", "lib/a/x.ts", 1),
            decl("Foo", "lib/b/x.ts", 1),
            decl("Foo", "app/y.ts", 1),
        ]);
        let err = resolve(&ReferenceToken::new("Foo").with_hint("lib"), &catalog).unwrap_err();
        match err {
            ResolveError::Ambiguous {
                reason, candidates, ..
            } => {
                assert_eq!(reason, AmbiguityReason::HintNotSpecific);
                assert_eq!(candidates, vec!["a/x.ts#Foo", "b/x.ts#Foo"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_single_match_ignores_hint() {
        let catalog = Catalog::from_declarations(vec![decl("Solo", "a/x.ts", 1)]);
        let decl = resolve(&ReferenceToken::new("Solo").with_hint("nowhere"), &catalog).unwrap();
        assert_eq!(decl.origin, "a/x.ts");
    }

    #[test]
    fn test_not_found_suggestions() {
        let catalog = Catalog::from_declarations(vec![decl("Baz", "a.ts", 1)]);
        let err = resolve(&ReferenceToken::new("Bar"), &catalog).unwrap_err();
        assert_eq!(
            err,
            ResolveError::NotFound {
                name: "Bar".to_string(),
                suggestions: vec!["Baz".to_string()],
            }
        );
        assert_eq!(err.to_string(), "symbol \"Bar\" not found; did you mean: Baz?");

        let empty = Catalog::new();
        let err = resolve(&ReferenceToken::new("Bar"), &empty).unwrap_err();
        assert_eq!(err.to_string(), "symbol \"Bar\" not found");
    }

    #[test]
    fn test_suggestion_limit() {
        let names = ["Aa", "Ab", "Ac", "Ad"];
        let catalog = Catalog::from_declarations(names.iter().map(|n| decl(n, "a.ts", 1)));
        let err = Resolver::new(&catalog)
            .with_max_suggestions(2)
            .resolve_str("Ax")
            .unwrap_err();
        match err {
            ResolveError::NotFound { suggestions, .. } => assert_eq!(suggestions, vec!["Aa", "Ab"]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_member_access() {
        let mut stack = decl("Stack", "a.ts", 1);
        stack.members.push(Member {
            name: "push".to_string(),
            kind: MemberKind::Method,
            signature: "push(item: T): void".to_string(),
            line: 3,
            doc: None,
        });
        let catalog = Catalog::from_declarations(vec![stack]);
        let resolver = Resolver::new(&catalog);

        let resolved = resolver.resolve_str("Stack.push").unwrap();
        assert_eq!(resolved.member.unwrap().line, 3);
        assert_eq!(resolved.display_name(), "Stack.push");

        let err = resolver.resolve_str("Stack.pish").unwrap_err();
        assert_eq!(
            err.to_string(),
            "\"Stack\" has no member \"pish\"; did you mean: push?"
        );
    }

    #[test]
    fn test_every_unique_substring_resolves() {
        let catalog = Catalog::from_declarations(vec![
            decl("Foo", "src/core/parse.ts", 1),
            decl("Foo", "src/cli/main.ts", 1),
            decl("Foo", "vendor/core/parse.ts", 1),
        ]);
        let all = catalog.get("Foo");
        for target in all {
            let origin = &target.origin;
            for start in 0..origin.len() {
                for end in start + 1..=origin.len() {
                    let hint = &origin[start..end];
                    let unique = all.iter().filter(|d| d.origin.contains(hint)).count() == 1;
                    if !unique {
                        continue;
                    }
                    let found = resolve(&ReferenceToken::new("Foo").with_hint(hint), &catalog)
                        .unwrap_or_else(|e| panic!("hint {hint:?}: {e}"));
                    assert_eq!(&found.origin, origin, "hint {hint:?}");
                }
            }
        }
    }

    fn user_catalog() -> Catalog {
        let mut class = decl("User", "src/admin/user.ts", 1);
        class.kind = DeclarationKind::Class;
        let mut constant = decl("User", "src/user.ts", 1);
        constant.kind = DeclarationKind::Constant;
        let mut alias = decl("User", "src/user.ts", 2);
        alias.kind = DeclarationKind::TypeAlias;
        Catalog::from_declarations(vec![class, constant, alias])
    }

    #[test]
    fn test_same_file_declarations_resolve_by_kind() {
        let catalog = user_catalog();
        let resolver = Resolver::new(&catalog);

        let err = resolver.resolve_str("User").unwrap_err();
        let ResolveError::Ambiguous { candidates, .. } = &err else {
            panic!("unexpected: {err:?}");
        };
        assert_eq!(
            candidates,
            &vec![
                "admin/user.ts#User",
                "src/user.ts#User:constant",
                "src/user.ts#User:type-alias",
            ]
        );

        // Every printed label is a reference that selects its own declaration.
        for (label, expected) in candidates.iter().zip(catalog.get("User")) {
            let found = resolver
                .resolve_str(label)
                .unwrap_or_else(|e| panic!("{label}: {e}"))
                .declaration;
            assert_eq!(found, expected, "{label}");
        }

        let found = resolver.resolve_str("User:type-alias").unwrap().declaration;
        assert_eq!(found.line, 2);
    }

    #[test]
    fn test_path_alone_cannot_split_a_file() {
        let catalog = user_catalog();
        let err = Resolver::new(&catalog)
            .resolve_str("src/user.ts#User")
            .unwrap_err();
        match err {
            ResolveError::Ambiguous {
                reason, candidates, ..
            } => {
                assert_eq!(reason, AmbiguityReason::HintNotSpecific);
                assert_eq!(
                    candidates,
                    vec!["src/user.ts#User:constant", "src/user.ts#User:type-alias"]
                );
            }
            other => panic!("unexpected: {other:?}"),
        }

        let err = Resolver::new(&catalog)
            .resolve_str("admin/user.ts#User:constant")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "path hint \"admin/user.ts:constant\" matched none of the declarations named \"User\"; candidates: admin/user.ts#User, src/user.ts#User:constant, src/user.ts#User:type-alias"
        );
    }

    #[test]
    fn test_edge_slashes_are_part_of_the_hint() {
        let catalog =
            Catalog::from_declarations(vec![decl("Foo", "x/ab.ts", 1), decl("Foo", "ya.ts", 1)]);
        let found = Resolver::new(&catalog).resolve_str("{@/a/Foo}").unwrap();
        assert_eq!(found.declaration.origin, "x/ab.ts");

        let catalog =
            Catalog::from_declarations(vec![decl("Foo", "xya/b.ts", 1), decl("Foo", "ya.ts", 1)]);
        let found = Resolver::new(&catalog).resolve_str("{@ya//Foo}").unwrap();
        assert_eq!(found.declaration.origin, "xya/b.ts");
    }
}
