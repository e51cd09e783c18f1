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

/// Comma-separated line quoting and parsing
pub mod csv;

/// Filesystem helpers
pub mod file;

/// Path utilities
pub mod path;

use crate::{Error, Result};

/// Validate a dataset identifier at the boundary. The core treats names
/// as opaque afterwards, so everything that could reach the filesystem
/// is rejected here: empty names, characters outside `[A-Za-z0-9_.-]`,
/// and the dot-only names that traverse paths.
pub fn validate_dataset_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::InvalidDatasetName(name.to_string()))
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
        return Err(Error::InvalidDatasetName(name.to_string()))
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_name_validation() {
        assert!(validate_dataset_name("ds1").is_ok());
        assert!(validate_dataset_name("feed.prod-2_a").is_ok());

        assert!(validate_dataset_name("").is_err());
        assert!(validate_dataset_name(".").is_err());
        assert!(validate_dataset_name("..").is_err());
        assert!(validate_dataset_name("a/b").is_err());
        assert!(validate_dataset_name("a\\b").is_err());
        assert!(validate_dataset_name("sp ace").is_err());
    }
}
