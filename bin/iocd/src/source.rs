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

use std::{fs, path::Path};

use darkioc::{util::csv, Error, Result};

/// Parse a source file of `IOC,METADATA_JSON` lines. The IOC field uses
/// the same quoting rule as `index.csv`; the metadata is everything past
/// the separating comma, taken verbatim (JSON carries its own commas).
/// Blank lines and `#` comments are skipped.
pub fn read_source_file(path: &Path) -> Result<Vec<Result<(String, Vec<u8>)>>> {
    let text = fs::read_to_string(path)?;

    let mut pairs = vec![];
    for line in text.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue
        }

        pairs.push(parse_line(line));
    }

    Ok(pairs)
}

fn parse_line(line: &str) -> Result<(String, Vec<u8>)> {
    let (ioc, rest) = csv::next_field(line)?;
    let metadata = rest.ok_or(Error::MalformedLine("source", line.to_string()))?;

    if ioc.is_empty() {
        return Err(Error::MalformedLine("source", line.to_string()))
    }

    Ok((ioc, metadata.as_bytes().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_commas_stay_in_the_metadata() {
        let (ioc, meta) = parse_line("1.2.3.4,{\"as\":\"AS64500\",\"type\":\"ip\"}").unwrap();
        assert_eq!(ioc, "1.2.3.4");
        assert_eq!(meta, b"{\"as\":\"AS64500\",\"type\":\"ip\"}");
    }

    #[test]
    fn quoted_iocs_parse() {
        let (ioc, meta) = parse_line("\"http://x/?a=1,b=2\",{}").unwrap();
        assert_eq!(ioc, "http://x/?a=1,b=2");
        assert_eq!(meta, b"{}");
    }

    #[test]
    fn missing_metadata_is_malformed() {
        assert!(parse_line("evil.com").is_err());
        assert!(parse_line(",{}").is_err());
    }
}
