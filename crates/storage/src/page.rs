use crate::types::{DocId, Document};
use serde::{Deserialize, Serialize};

pub const PAGE_SIZE: usize = 4096;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub entries: Vec<(DocId, Document)>,
}

impl Page {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends the entry if the encoded page still fits in `PAGE_SIZE`.
    /// Returns the entry back when it does not.
    pub fn try_add(
        &mut self,
        id: DocId,
        doc: Document,
    ) -> Result<Result<(), (DocId, Document)>, bincode::Error> {
        self.entries.push((id, doc));
        if bincode::serialized_size(self)? as usize > PAGE_SIZE {
            if let Some(entry) = self.entries.pop() {
                return Ok(Err(entry));
            }
        }
        Ok(Ok(()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        let mut bytes = bincode::serialize(self)?;
        bytes.resize(PAGE_SIZE, 0);
        Ok(bytes)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}
