//! Archive stage - moves a file out of the watched directory.
//!
//! The move is the commit point of the pipeline. Within one filesystem it is
//! a single `rename`, so other processes listing either directory never see
//! the file in both places or half-written. Across filesystems the content is
//! copied to a hidden temporary next to the destination, renamed into place,
//! and only then is the source removed.

use std::{
  fs, io,
  path::{Path, PathBuf},
};

use tracing::{debug, warn};

/// Move `src` into `dest_dir` under the same file name, replacing any
/// existing file of that name. Returns the new path.
pub fn move_into(src: &Path, dest_dir: &Path) -> io::Result<PathBuf> {
  let name = src
    .file_name()
    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"))?;
  fs::create_dir_all(dest_dir)?;
  let dest = dest_dir.join(name);

  match fs::rename(src, &dest) {
    Ok(()) => Ok(dest),
    Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
      debug!(file = %src.display(), dest = %dest.display(), "Cross-device move, copying");
      copy_then_swap(src, &dest)?;
      Ok(dest)
    }
    Err(e) => Err(e),
  }
}

fn copy_then_swap(src: &Path, dest: &Path) -> io::Result<()> {
  let dir = dest.parent().unwrap_or_else(|| Path::new("."));
  let name = dest.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
  let tmp = dir.join(format!(".{}.{}.partial", name, std::process::id()));

  if let Err(e) = fs::copy(src, &tmp).and_then(|_| fs::rename(&tmp, dest)) {
    let _ = fs::remove_file(&tmp);
    return Err(e);
  }
  release_source(src, dest)
}

/// Remove `src` once its copy sits at `dest`. If the source cannot be
/// removed the copy is withdrawn, so the file keeps exactly one location.
fn release_source(src: &Path, dest: &Path) -> io::Result<()> {
  match fs::remove_file(src) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => {
      if let Err(undo) = fs::remove_file(dest) {
        warn!(
          file = %src.display(),
          dest = %dest.display(),
          error = %undo,
          "Archive copy left behind after failed source removal"
        );
      }
      Err(e)
    }
  }
}
