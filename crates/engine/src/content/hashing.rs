use std::fs;

use sha2::{Digest, Sha256};

use super::discovery::{collect_xml_files_sorted, ModSource};
use super::types::ContentDiscoveryError;

/// SHA-256 over every pack id and its XML inputs in load order.
pub(crate) fn hash_content_sources(sources: &[ModSource]) -> Result<String, ContentDiscoveryError> {
    let mut hasher = Sha256::new();
    for source in sources {
        hasher.update(source.mod_id.as_bytes());
        hasher.update([0u8]);
        for (normalized_rel, abs_path) in collect_xml_files_sorted(&source.source_dir)? {
            let bytes = fs::read(&abs_path).map_err(|source| ContentDiscoveryError::ReadFile {
                path: abs_path.clone(),
                source,
            })?;
            hasher.update(normalized_rel.as_bytes());
            hasher.update([0u8]);
            hasher.update(&bytes);
        }
        hasher.update([0xffu8]);
    }
    Ok(to_hex_lower(&hasher.finalize()))
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}
