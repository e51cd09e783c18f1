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

//! Strict quoting for the IOC field of `index.csv` and source files.
//! IOCs are arbitrary strings (URLs with commas, quoted substrings), so
//! a field containing `,`, `"`, CR or LF is wrapped in double quotes
//! with inner quotes doubled. The remaining fields on those lines are
//! hex or JSON and are taken verbatim past the first field.

use crate::{Error, Result};

/// Quote a field if it needs quoting, otherwise return it unchanged.
pub fn quote(field: &str) -> String {
    if !field.contains(['"', ',', '\r', '\n']) {
        return field.to_string()
    }

    let mut out = String::with_capacity(field.len() + 2);
    out.push('"');
    for c in field.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Parse the first (possibly quoted) field of a line. Returns the
/// unescaped field and the remainder after the separating comma, or
/// `None` if the field ended the line.
pub fn next_field(line: &str) -> Result<(String, Option<&str>)> {
    if !line.starts_with('"') {
        return match line.split_once(',') {
            Some((field, rest)) => Ok((field.to_string(), Some(rest))),
            None => Ok((line.to_string(), None)),
        }
    }

    let mut field = String::new();
    let mut chars = line[1..].char_indices();

    while let Some((_, c)) = chars.next() {
        if c != '"' {
            field.push(c);
            continue
        }

        match chars.next() {
            // Doubled quote is a literal quote
            Some((_, '"')) => field.push('"'),
            // Closing quote at end of line or before a comma
            None => return Ok((field, None)),
            Some((j, ',')) => return Ok((field, Some(&line[1 + j + 1..]))),
            Some(_) => return Err(Error::MalformedLine("csv", line.to_string())),
        }
    }

    // Unterminated quote
    Err(Error::MalformedLine("csv", line.to_string()))
}
