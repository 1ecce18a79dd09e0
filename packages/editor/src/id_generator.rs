//! Component id generation
//!
//! Inserted and duplicated components get fresh ids of the form
//! `"<Type>-<suffix>"`. Interactive sessions use random uuids; scripted
//! sessions and tests use [`SequentialIds`], which is deterministic per
//! document.

use uuid::Uuid;

pub trait IdGenerator: Send {
    fn next_id(&mut self, component_type: &str) -> String;
}

/// `"<Type>-<uuid v4>"`
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&mut self, component_type: &str) -> String {
        format!("{}-{}", component_type, Uuid::new_v4())
    }
}

/// `"<Type>-<seed>-<n>"`, where the seed is a CRC32 of a document key
#[derive(Debug, Clone)]
pub struct SequentialIds {
    seed: String,
    count: u32,
}

impl SequentialIds {
    pub fn new(document_key: &str) -> Self {
        Self {
            seed: document_seed(document_key),
            count: 0,
        }
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self, component_type: &str) -> String {
        self.count += 1;
        format!("{}-{}-{}", component_type, self.seed, self.count)
    }
}

/// Stable short hex seed for a document key
pub fn document_seed(document_key: &str) -> String {
    format!("{:08x}", crc32fast::hash(document_key.as_bytes()))
}
