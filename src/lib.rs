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

/// Client-side orchestration of sync and queries
pub mod client;

/// Crypto primitives, OPRF engine and metadata cipher
pub mod crypto;

/// Error handling
pub mod error;

/// Client mirror of a server change log
pub mod mirror;

/// JSON-RPC client/server plumbing
pub mod rpc;

/// Server-side dataset state engine
pub mod store;

/// Utility functions
pub mod util;

pub use error::{Error, Result};
