// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest (48 bits)
pub const EPISODE_ID_LENGTH: usize = 12;

/// Derive the stable identifier of an episode
///
/// The id is the first 12 lowercase hex characters of
/// `sha256("{feed_id}:{file_name}:{file_size}")`. Re-adding byte-identical content to
/// the same feed under the same name always yields the same id, which keeps uploads
/// idempotent and listener state keyed by guid intact.
pub fn derive_episode_id(feed_id: &str, file_name: &str, file_size: u64) -> String {
    let digest = Sha256::digest(format!("{feed_id}:{file_name}:{file_size}").as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(EPISODE_ID_LENGTH);
    hex
}
