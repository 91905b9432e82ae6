//! Catalog of exported declarations and its on-disk artifact.
//!
//! The catalog is written once per build by the generator and loaded
//! wholesale by consumers. It is never patched in place.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub mod cache;
pub mod models;

pub use models::{Declaration, DeclarationKind, DocComment, DocTag, Member, MemberKind, Param, ParamDoc};

/// Schema version shared by the catalog and cache artifacts.
pub const CATALOG_VERSION: u32 = 1;

/// Errors raised while reading or writing catalog and cache artifacts.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("corrupt artifact {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("artifact {} has schema version {found}, expected {expected}", path.display())]
    VersionMismatch {
        path: PathBuf,
        found: u64,
        expected: u32,
    },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Serialize)]
struct ArtifactOut<'a, T> {
    version: u32,
    #[serde(flatten)]
    body: &'a T,
}

/// Name → every declaration sharing that name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    declarations: BTreeMap<String, Vec<Declaration>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from declarations in any order.
    ///
    /// Each name bucket is sorted by origin path then line so that
    /// everything derived from it is deterministic.
    pub fn from_declarations<I>(declarations: I) -> Self
    where
        I: IntoIterator<Item = Declaration>,
    {
        let mut map: BTreeMap<String, Vec<Declaration>> = BTreeMap::new();
        for decl in declarations {
            map.entry(decl.name.clone()).or_default().push(decl);
        }
        for bucket in map.values_mut() {
            bucket.sort_by(|a, b| a.origin.cmp(&b.origin).then(a.line.cmp(&b.line)));
        }
        Self { declarations: map }
    }

    /// All declarations named `name`. Empty when unknown.
    pub fn get(&self, name: &str) -> &[Declaration] {
        self.declarations
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.declarations.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.values().flatten()
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn declaration_count(&self) -> usize {
        self.iter().count()
    }

    /// Load a catalog artifact, rejecting any schema version but ours.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        read_artifact(path.as_ref())
    }

    /// Persist atomically: a crash mid-write leaves the previous file intact.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CatalogError> {
        write_artifact(path.as_ref(), self)
    }
}

/// Load the catalog for a build, logging a single warning on failure.
///
/// `None` means references are left untouched for the rest of the build.
pub fn load_shared<P: AsRef<Path>>(path: P) -> Option<Arc<Catalog>> {
    let path = path.as_ref();
    match Catalog::load(path) {
        Ok(catalog) => {
            info!(
                "Loaded catalog {} ({} names, {} declarations)",
                path.display(),
                catalog.len(),
                catalog.declaration_count()
            );
            Some(Arc::new(catalog))
        }
        Err(e) => {
            warn!("Symbol references will not be resolved: {e}");
            None
        }
    }
}

pub(crate) fn read_artifact<T>(path: &Path) -> Result<T, CatalogError>
where
    T: for<'de> Deserialize<'de>,
{
    let data = match fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(CatalogError::Missing(path.to_path_buf()));
        }
        Err(source) => {
            return Err(CatalogError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let corrupt = |reason: String| CatalogError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    let mut value: serde_json::Value =
        serde_json::from_str(&data).map_err(|e| corrupt(e.to_string()))?;

    // Check the tag before touching anything else in the document.
    let found = value
        .get("version")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| corrupt("missing version tag".to_string()))?;
    if found != u64::from(CATALOG_VERSION) {
        return Err(CatalogError::VersionMismatch {
            path: path.to_path_buf(),
            found,
            expected: CATALOG_VERSION,
        });
    }

    if let Some(obj) = value.as_object_mut() {
        obj.remove("version");
    }
    serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))
}

pub(crate) fn write_artifact<T: Serialize>(path: &Path, body: &T) -> Result<(), CatalogError> {
    let data = serde_json::to_vec_pretty(&ArtifactOut {
        version: CATALOG_VERSION,
        body,
    })
    .map_err(|e| CatalogError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    write_atomic(path, &data).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

    fs::write(&temp_path, data)?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}
