//! Path policy: optional confinement of file tools.
//!
//! With no roots and no forbidden prefixes every path is passed through
//! untouched. Otherwise paths are made absolute and walked component by
//! component, following every symlink (dangling ones included), so the path
//! that is checked is the path the tool will touch.

use std::path::{Component, Path, PathBuf};

/// Error returned when a path is refused.
#[derive(Debug, thiserror::Error)]
pub enum PathPolicyError {
    #[error("Path '{path}' is outside the allowed roots")]
    OutsideAllowedRoots { path: String },

    #[error("Path '{path}' is under forbidden prefix '{prefix}'")]
    Forbidden { path: String, prefix: String },

    #[error("Cannot resolve path '{path}': {reason}")]
    Unresolvable { path: String, reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct PathPolicy {
    allowed_roots: Vec<PathBuf>,
    forbidden: Vec<(String, PathBuf)>,
}

impl PathPolicy {
    /// Accept every path.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Build a policy from config strings. `~` expands to the home directory.
    pub fn new(allowed_roots: &[String], forbidden_paths: &[String]) -> Self {
        let allowed_roots = allowed_roots
            .iter()
            .filter_map(|r| resolve(Path::new(&expand_tilde(r))).ok())
            .collect();
        let forbidden = forbidden_paths
            .iter()
            .filter_map(|f| {
                resolve(Path::new(&expand_tilde(f)))
                    .ok()
                    .map(|p| (f.clone(), p))
            })
            .collect();
        Self {
            allowed_roots,
            forbidden,
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.allowed_roots.is_empty() && self.forbidden.is_empty()
    }

    /// Return the path to operate on, or why it is refused.
    pub fn check(&self, path: &str) -> Result<PathBuf, PathPolicyError> {
        if self.is_unrestricted() {
            return Ok(PathBuf::from(path));
        }

        let resolved =
            resolve(Path::new(path)).map_err(|e| PathPolicyError::Unresolvable {
                path: path.into(),
                reason: e.to_string(),
            })?;

        if let Some((prefix, _)) = self.forbidden.iter().find(|(_, p)| resolved.starts_with(p)) {
            return Err(PathPolicyError::Forbidden {
                path: path.into(),
                prefix: prefix.clone(),
            });
        }

        if !self.allowed_roots.is_empty()
            && !self.allowed_roots.iter().any(|root| resolved.starts_with(root))
        {
            return Err(PathPolicyError::OutsideAllowedRoots { path: path.into() });
        }

        Ok(resolved)
    }
}

/// Symlink hops allowed while resolving one path.
const MAX_SYMLINK_HOPS: usize = 40;

/// Absolute path with `.`/`..` applied and every existing symlink followed.
///
/// Each component is looked up with `symlink_metadata`, so a dangling link
/// resolves to its target instead of passing as a not-yet-created file.
fn resolve(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut hops = 0;
    walk(PathBuf::new(), &absolute, &mut hops)
}

fn walk(mut resolved: PathBuf, path: &Path, hops: &mut usize) -> std::io::Result<PathBuf> {
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => {
                resolved.push(name);
                let is_link = std::fs::symlink_metadata(&resolved)
                    .is_ok_and(|meta| meta.file_type().is_symlink());
                if is_link {
                    *hops += 1;
                    if *hops > MAX_SYMLINK_HOPS {
                        return Err(std::io::Error::other("too many levels of symbolic links"));
                    }
                    let target = std::fs::read_link(&resolved)?;
                    resolved.pop();
                    // an absolute target replaces `resolved` on push
                    resolved = walk(resolved, &target, hops)?;
                }
            }
        }
    }
    Ok(resolved)
}

fn expand_tilde(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"));
        if let Ok(home) = home {
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
