use crate::error::AppError;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Filesystem side of filing a letter. Kept behind a trait so the pipeline
/// can be driven against a fake.
pub trait FileRelocator: Send {
    fn folder_exists(&self, path: &Path) -> bool;
    fn file_exists(&self, path: &Path) -> bool;
    /// Move `source` to `destination`. Fails if the source is missing or the
    /// destination is already taken.
    fn move_file(&self, source: &Path, destination: &Path) -> Result<(), AppError>;
}

pub struct LocalFiles;

impl FileRelocator for LocalFiles {
    fn folder_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn move_file(&self, source: &Path, destination: &Path) -> Result<(), AppError> {
        move_file(source, destination)
    }
}

pub fn move_file(source: &Path, destination: &Path) -> Result<(), AppError> {
    if !source.is_file() {
        return Err(AppError::General(format!(
            "source does not exist: {}",
            source.display()
        )));
    }
    if destination.exists() {
        return Err(AppError::General(format!(
            "destination already exists: {}",
            destination.display()
        )));
    }

    if let Err(rename_err) = fs::rename(source, destination) {
        // Synced folders can sit on another volume; fall back to copy.
        warn!(
            source = %source.display(),
            error = %rename_err,
            "rename failed, copying instead"
        );
        copy_then_remove(source, destination, |from, to| fs::copy(from, to))?;
    }
    Ok(())
}

/// Copy, then drop the source. Any failure removes whatever reached the
/// destination so a retry does not see a collision.
fn copy_then_remove<F>(source: &Path, destination: &Path, copy: F) -> std::io::Result<()>
where
    F: FnOnce(&Path, &Path) -> std::io::Result<u64>,
{
    let result = copy(source, destination).and_then(|_| fs::remove_file(source));
    if result.is_err() {
        let _ = fs::remove_file(destination);
    }
    result
}

/// A single plain path component: no separators, no `.`/`..`.
fn is_plain_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

/// `{clients_root}/{Last, First}/{letters_subfolder}`. The client name comes
/// from OCR, so it must not be able to climb out of `clients_root`.
pub fn client_folder(
    clients_root: &Path,
    formatted_name: &str,
    letters_subfolder: &str,
) -> Result<PathBuf, AppError> {
    if !is_plain_component(formatted_name) {
        return Err(AppError::General(format!(
            "client name is not a plain folder name: {formatted_name}"
        )));
    }
    Ok(clients_root.join(formatted_name).join(letters_subfolder))
}

/// Same directory, new file name.
pub fn sibling_path(path: &Path, file_name: &str) -> PathBuf {
    match path.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}

pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}
