/* This file is part of DarkFi (https://dark.fi)
 *
 * Copyright (C) 2020-2026 Dyne.org foundation
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::{
    fs::{rename, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

/// Stage contents into a fsynced temp sibling of `path`, ready to be
/// renamed into place with [`commit_staged`]. Nothing at `path` changes
/// until then, so multi-file transitions can stage every file before
/// renaming any of them.
pub fn write_staged(path: &Path, contents: &[u8]) -> io::Result<PathBuf> {
    let tmp = tmp_sibling(path);

    let mut file = File::create(&tmp)?;
    file.write_all(contents)?;
    file.sync_all()?;

    Ok(tmp)
}

/// Rename a staged temp file over its target.
pub fn commit_staged(tmp: &Path, path: &Path) -> io::Result<()> {
    rename(tmp, path)
}

/// Flush directory metadata so completed renames survive a crash.
pub fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

/// Write a single file through a temp sibling, fsync, then rename over
/// the target. A crash leaves either the old contents or the new ones.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp = write_staged(path, contents)?;
    commit_staged(&tmp, path)
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::read;

    #[test]
    fn atomic_write_replaces_contents() {
        let dir = tempdir::TempDir::new("atomic_write").unwrap();
        let path = dir.path().join("data");

        atomic_write(&path, b"one").unwrap();
        assert_eq!(read(&path).unwrap(), b"one");

        atomic_write(&path, b"two").unwrap();
        assert_eq!(read(&path).unwrap(), b"two");

        assert!(!dir.path().join("data.tmp").exists());
    }

    #[test]
    fn staged_writes_leave_targets_alone_until_committed() {
        let dir = tempdir::TempDir::new("staged_write").unwrap();
        let path = dir.path().join("data");
        atomic_write(&path, b"old").unwrap();

        let tmp = write_staged(&path, b"new").unwrap();
        assert_eq!(read(&path).unwrap(), b"old");
        assert_eq!(read(&tmp).unwrap(), b"new");

        commit_staged(&tmp, &path).unwrap();
        sync_dir(dir.path()).unwrap();
        assert_eq!(read(&path).unwrap(), b"new");
        assert!(!tmp.exists());
    }
}
