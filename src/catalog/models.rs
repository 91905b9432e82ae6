use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of an exported declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeclarationKind {
    Function,
    Class,
    TypeAlias,
    Interface,
    Constant,
    Enum,
}

impl DeclarationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Function => "function",
            DeclarationKind::Class => "class",
            DeclarationKind::TypeAlias => "type-alias",
            DeclarationKind::Interface => "interface",
            DeclarationKind::Constant => "constant",
            DeclarationKind::Enum => "enum",
        }
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeclarationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "function" => Ok(DeclarationKind::Function),
            "class" => Ok(DeclarationKind::Class),
            "type-alias" => Ok(DeclarationKind::TypeAlias),
            "interface" => Ok(DeclarationKind::Interface),
            "constant" => Ok(DeclarationKind::Constant),
            "enum" => Ok(DeclarationKind::Enum),
            other => Err(format!("unknown declaration kind {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemberKind {
    Method,
    Property,
    EnumMember,
}

impl MemberKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberKind::Method => "method",
            MemberKind::Property => "property",
            MemberKind::EnumMember => "enum-member",
        }
    }
}

/// A `@tag text` line of a doc comment other than `@param`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocTag {
    pub tag: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDoc {
    pub name: String,
    pub description: String,
}

/// Structured `/** ... */` block attached to a declaration or member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocComment {
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<DocTag>,
}

impl DocComment {
    /// First non-empty line of the description.
    pub fn summary(&self) -> Option<&str> {
        self.description
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.description.as_str())
    }

    pub fn tag(&self, tag: &str) -> Option<&DocTag> {
        self.tags.iter().find(|t| t.tag == tag)
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_empty() && self.params.is_empty() && self.tags.is_empty()
    }
}

/// A parameter as written in the source signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

/// Public member of a class, interface or enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
    pub signature: String,
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<DocComment>,
}

/// One exported source symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    /// `<origin>#<name>`
    pub id: String,
    pub name: String,
    pub kind: DeclarationKind,
    pub signature: String,
    /// Path relative to the generation root, always `/`-separated.
    pub origin: String,
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<DocComment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Member>,
}

impl Declaration {
    pub fn make_id(origin: &str, name: &str) -> String {
        format!("{origin}#{name}")
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }
}
