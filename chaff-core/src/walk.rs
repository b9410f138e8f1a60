use anyhow::{anyhow, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Compile include/exclude globs. An empty include list matches everything.
/// Globs match the slash-normalized path relative to the scan root.
pub fn build_globset(includes: &[String], excludes: &[String]) -> Result<(GlobSet, GlobSet)> {
    let mut incb = GlobSetBuilder::new();
    let mut excb = GlobSetBuilder::new();
    if includes.is_empty() {
        incb.add(Glob::new("**/*")?);
    }
    for g in includes {
        incb.add(Glob::new(g)?);
    }
    for g in excludes {
        excb.add(Glob::new(g)?);
    }
    Ok((incb.build()?, excb.build()?))
}

/// Lazy recursive enumeration of the regular files under a root.
///
/// Directory entries are skipped; symlinks and any walk error abort the
/// whole run (there is no partial-success mode). Traversal order is
/// whatever the filesystem yields.
pub struct TreeWalk {
    root: PathBuf,
    inner: walkdir::IntoIter,
    include: GlobSet,
    exclude: GlobSet,
}

impl TreeWalk {
    pub fn new(root: &Path, include: GlobSet, exclude: GlobSet) -> Self {
        Self {
            root: root.to_path_buf(),
            inner: WalkDir::new(root).min_depth(1).into_iter(),
            include,
            exclude,
        }
    }
}

impl Iterator for TreeWalk {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let ent = match self.inner.next()? {
                Ok(e) => e,
                Err(e) => {
                    return Some(Err(e).context("walk aborted"));
                }
            };
            let path = ent.path();
            if ent.path_is_symlink() {
                return Some(Err(anyhow!(
                    "symlink encountered (not following): {}",
                    path.display()
                )));
            }
            if !ent.file_type().is_file() {
                continue;
            }
            let rel = match path.strip_prefix(&self.root) {
                Ok(r) => r,
                Err(_) => {
                    return Some(Err(anyhow!(
                        "walked path {} escapes root {}",
                        path.display(),
                        self.root.display()
                    )));
                }
            };
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            if !self.include.is_match(&rel_str) {
                continue;
            }
            if self.exclude.is_match(&rel_str) {
                continue;
            }
            return Some(Ok(path.to_path_buf()));
        }
    }
}
