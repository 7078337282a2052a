//! Backend paths of item data files

use cairn_core::{OBJECTS_DIR, OBJECT_EXTENSION};
use sha2::{Digest, Sha256};

/// Hex SHA-256 of an item id
pub fn hash_id(id: &str) -> String {
    hex::encode(Sha256::digest(id.as_bytes()))
}

/// `objects/<ab>/<hash>.cmg`, sharded on the first two hex digits
pub fn data_path(id: &str) -> String {
    let hash = hash_id(id);
    format!("{OBJECTS_DIR}/{}/{hash}.{OBJECT_EXTENSION}", &hash[..2])
}
