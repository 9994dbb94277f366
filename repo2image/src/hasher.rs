use std::hash::{Hash, Hasher};

use crate::models::Recipe;

/// Routes `Hash` output into blake3, so anything hashable can be digested.
struct Blake3Writer(blake3::Hasher);

impl Hasher for Blake3Writer {
    fn write(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn finish(&self) -> u64 {
        let mut head = [0u8; 8];
        head.copy_from_slice(&self.0.finalize().as_bytes()[..8]);
        u64::from_le_bytes(head)
    }
}

pub fn digest<T: Hash + ?Sized>(value: &T) -> blake3::Hash {
    let mut writer = Blake3Writer(blake3::Hasher::new());
    value.hash(&mut writer);
    writer.0.finalize()
}

/// Hex encoded digest identifying a recipe, used as an image label.
pub fn recipe_digest(recipe: &Recipe) -> String {
    digest(recipe).to_hex().to_string()
}
