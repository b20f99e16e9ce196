//! All-or-nothing commits across the image directory and the two mapping
//! documents.
//!
//! Every new file is first staged as an fsynced temporary file next to its
//! target. Nothing visible changes until staging has fully succeeded. Staged
//! files are then moved into place with atomic renames, and every step records
//! how to undo itself. If a later step fails, the applied steps are undone in
//! reverse order. Files that get overwritten or removed are kept as hidden
//! `.bak` files until the commit finishes.

use facereg_core::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, warn};

/// Change to the image directory carried by a transaction.
#[derive(Debug, Clone)]
pub(crate) enum ImageOp {
    Write { name: String, bytes: Vec<u8> },
    Remove { name: String },
    Move { from: String, to: String },
}

enum Undo {
    /// Put the saved copy back over `target`.
    Restore { backup: TempPath, target: PathBuf },
    /// `target` did not exist before the commit.
    Remove { target: PathBuf },
    /// Move `from` back to `to`.
    MoveBack { from: PathBuf, to: PathBuf },
}

pub(crate) struct Transaction<'a> {
    images_dir: &'a Path,
    image_op: Option<ImageOp>,
    documents: Vec<(PathBuf, Vec<u8>)>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(images_dir: &'a Path) -> Self {
        Self {
            images_dir,
            image_op: None,
            documents: Vec::new(),
        }
    }

    pub(crate) fn image(mut self, op: ImageOp) -> Self {
        self.image_op = Some(op);
        self
    }

    /// Replace the whole file at `path` with `contents`.
    pub(crate) fn document(mut self, path: &Path, contents: Vec<u8>) -> Self {
        self.documents.push((path.to_path_buf(), contents));
        self
    }

    pub(crate) fn commit(self) -> Result<()> {
        let staged_image = match &self.image_op {
            Some(ImageOp::Write { bytes, .. }) => Some(stage(self.images_dir, bytes)?),
            _ => None,
        };
        let mut staged_documents = Vec::with_capacity(self.documents.len());
        for (target, contents) in &self.documents {
            staged_documents.push((stage(parent_dir(target), contents)?, target.clone()));
        }

        let mut undo = Vec::new();
        let applied = self
            .apply_image(staged_image, &mut undo)
            .and_then(|()| apply_documents(staged_documents, &mut undo));

        if let Err(e) = applied {
            warn!("Commit failed, rolling back {} step(s): {}", undo.len(), e);
            rollback(undo);
            return Err(e);
        }
        Ok(())
    }

    fn apply_image(&self, staged: Option<NamedTempFile>, undo: &mut Vec<Undo>) -> Result<()> {
        match &self.image_op {
            None => {}
            Some(ImageOp::Write { name, .. }) => {
                let target = self.images_dir.join(name);
                if let Some(staged) = staged {
                    replace(staged, target, undo)?;
                }
            }
            Some(ImageOp::Remove { name }) => {
                let target = self.images_dir.join(name);
                if target.exists() {
                    let backup = backup_path(&target)?;
                    fs::rename(&target, &backup)?;
                    undo.push(Undo::Restore { backup, target });
                } else {
                    debug!("Image not found, nothing to remove: {:?}", target);
                }
            }
            Some(ImageOp::Move { from, to }) => {
                let from = self.images_dir.join(from);
                let to = self.images_dir.join(to);
                if from.exists() {
                    if let Some(backup) = backup_copy(&to)? {
                        undo.push(Undo::Restore { backup, target: to.clone() });
                    }
                    fs::rename(&from, &to)?;
                    undo.push(Undo::MoveBack { from: to, to: from });
                } else {
                    debug!("Image not found, nothing to rename: {:?}", from);
                }
            }
        }
        Ok(())
    }
}

fn apply_documents(staged: Vec<(NamedTempFile, PathBuf)>, undo: &mut Vec<Undo>) -> Result<()> {
    for (file, target) in staged {
        replace(file, target, undo)?;
    }
    Ok(())
}

/// Atomically move `staged` over `target`, saving the previous contents.
fn replace(staged: NamedTempFile, target: PathBuf, undo: &mut Vec<Undo>) -> Result<()> {
    let previous = backup_copy(&target)?;
    staged.persist(&target).map_err(|e| Error::Io(e.error))?;
    undo.push(match previous {
        Some(backup) => Undo::Restore { backup, target },
        None => Undo::Remove { target },
    });
    Ok(())
}

fn stage(dir: &Path, contents: &[u8]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    Ok(file)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn backup_path(target: &Path) -> Result<TempPath> {
    let path = tempfile::Builder::new()
        .prefix(".facereg-")
        .suffix(".bak")
        .tempfile_in(parent_dir(target))?
        .into_temp_path();
    Ok(path)
}

fn backup_copy(target: &Path) -> Result<Option<TempPath>> {
    if !target.exists() {
        return Ok(None);
    }
    let backup = backup_path(target)?;
    fs::copy(target, &backup)?;
    Ok(Some(backup))
}

fn rollback(undo: Vec<Undo>) {
    for step in undo.into_iter().rev() {
        match step {
            Undo::Restore { backup, target } => {
                if let Err(e) = fs::rename(&backup, &target) {
                    warn!("Rollback could not restore {:?}: {}", target, e);
                    if let Ok(kept) = backup.keep() {
                        warn!("Previous contents kept at {:?}", kept);
                    }
                }
            }
            Undo::Remove { target } => {
                if let Err(e) = fs::remove_file(&target) {
                    warn!("Rollback could not remove {:?}: {}", target, e);
                }
            }
            Undo::MoveBack { from, to } => {
                if let Err(e) = fs::rename(&from, &to) {
                    warn!("Rollback could not move {:?} back to {:?}: {}", from, to, e);
                }
            }
        }
    }
}
