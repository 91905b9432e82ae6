use super::ResolveError;
use crate::catalog::DeclarationKind;
use std::fmt;

/// Parsed reference query: `name`, `hint/name`, `hint#name`, with an
/// optional `:kind` qualifier and `.member` suffix on the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceToken {
    pub name: String,
    /// Kept as written; edge slashes anchor the hint to segment boundaries.
    pub hint: Option<String>,
    /// Selects between same-named declarations of one file (`User:type-alias`).
    pub kind: Option<DeclarationKind>,
    pub member: Option<String>,
}

impl ReferenceToken {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hint: None,
            kind: None,
            member: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_kind(mut self, kind: DeclarationKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Accepts the bare body (`a/Foo`) or the full inline form (`{@a/Foo}`).
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        let invalid = || ResolveError::InvalidToken {
            raw: raw.to_string(),
        };

        let body = raw.trim();
        let body = body
            .strip_prefix("{@")
            .and_then(|b| b.strip_suffix('}'))
            .unwrap_or(body)
            .trim();

        let (hint, rest) = match body.rfind('#').or_else(|| body.rfind('/')) {
            Some(idx) => (&body[..idx], &body[idx + 1..]),
            None => ("", body),
        };

        let (qualified, member) = match rest.split_once('.') {
            Some((name, member)) => (name, Some(member)),
            None => (rest, None),
        };
        let (name, kind) = match qualified.split_once(':') {
            Some((name, kind)) => (name, Some(kind.parse().map_err(|_| invalid())?)),
            None => (qualified, None),
        };

        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(invalid());
        }
        if member.is_some_and(str::is_empty) {
            return Err(invalid());
        }

        Ok(Self {
            name: name.to_string(),
            hint: (!hint.is_empty()).then(|| hint.to_string()),
            kind,
            member: member.map(str::to_string),
        })
    }
}

impl fmt::Display for ReferenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(hint) = &self.hint {
            write!(f, "{hint}/")?;
        }
        f.write_str(&self.name)?;
        if let Some(kind) = &self.kind {
            write!(f, ":{kind}")?;
        }
        if let Some(member) = &self.member {
            write!(f, ".{member}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(ReferenceToken::parse("Foo").unwrap(), ReferenceToken::new("Foo"));
        assert_eq!(
            ReferenceToken::parse("{@a/Foo}").unwrap(),
            ReferenceToken::new("Foo").with_hint("a")
        );
        assert_eq!(
            ReferenceToken::parse("src/a/x.ts#Foo").unwrap(),
            ReferenceToken::new("Foo").with_hint("src/a/x.ts")
        );

        let token = ReferenceToken::parse("lib/x.ts/Stack.push").unwrap();
        assert_eq!(token.hint.as_deref(), Some("lib/x.ts"));
        assert_eq!(token.name, "Stack");
        assert_eq!(token.member.as_deref(), Some("push"));
        assert_eq!(token.to_string(), "lib/x.ts/Stack.push");
    }

    #[test]
    fn test_leading_slash_is_not_a_hint() {
        let token = ReferenceToken::parse("/Foo").unwrap();
        assert_eq!(token.hint, None);
    }

    #[test]
    fn test_hint_slashes_are_kept() {
        let token = ReferenceToken::parse("{@/a/Foo}").unwrap();
        assert_eq!(token.hint.as_deref(), Some("/a"));
        let token = ReferenceToken::parse("ya//Foo").unwrap();
        assert_eq!(token.hint.as_deref(), Some("ya/"));
        assert_eq!(ReferenceToken::parse(&token.to_string()).unwrap(), token);
    }

    #[test]
    fn test_kind_qualifier() {
        let token = ReferenceToken::parse("src/user.ts#User:type-alias").unwrap();
        assert_eq!(
            token,
            ReferenceToken::new("User")
                .with_hint("src/user.ts")
                .with_kind(DeclarationKind::TypeAlias)
        );
        assert_eq!(token.to_string(), "src/user.ts/User:type-alias");

        let token = ReferenceToken::parse("Stack:class.push").unwrap();
        assert_eq!(token.kind, Some(DeclarationKind::Class));
        assert_eq!(token.member.as_deref(), Some("push"));

        assert!(ReferenceToken::parse("User:type").is_err());
        assert!(ReferenceToken::parse("User:").is_err());
    }

    #[test]
    fn test_invalid_tokens() {
        for raw in ["", "{@}", "a/", "Foo.", "a/#", "two words"] {
            assert!(
                matches!(
                    ReferenceToken::parse(raw),
                    Err(ResolveError::InvalidToken { .. })
                ),
                "{raw:?} should be rejected"
            );
        }
    }
}
