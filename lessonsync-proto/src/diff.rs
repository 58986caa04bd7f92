//! State differencer: the minimal [`UserChanges`] turning one file state into another.

use crate::change::{Change, FileState, UserChanges};

/// Returns the changes that convert `baseline` into `current`.
///
/// Paths of `current` come first in path order (`AddFile` when new,
/// `ChangeFile` when the text differs), followed by a `RemoveFile` for every
/// baseline path missing from `current`.
#[must_use]
pub fn calculate_changes(baseline: &FileState, current: &FileState) -> UserChanges {
    let mut changes = UserChanges::empty();

    for (path, text) in current {
        match baseline.get(path) {
            None => changes.push(Change::AddFile {
                path: path.clone(),
                text: text.clone(),
            }),
            Some(old) if old != text => changes.push(Change::ChangeFile {
                path: path.clone(),
                text: text.clone(),
            }),
            Some(_) => {}
        }
    }

    changes.extend(
        baseline
            .keys()
            .filter(|path| !current.contains_key(*path))
            .map(|path| Change::RemoveFile { path: path.clone() }),
    );

    changes
}
