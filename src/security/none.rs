use anyhow::Result;
use async_trait::async_trait;

use super::SecurityHandler;
use crate::wire::{DynReadHalf, WireReader, WireWriter};

/// Security type 1: no authentication at all.
pub struct NoneHandler;

#[async_trait]
impl SecurityHandler for NoneHandler {
    fn code(&self) -> i32 {
        1
    }

    async fn authenticate(
        &self,
        _reader: &mut WireReader<DynReadHalf>,
        _writer: &WireWriter,
    ) -> Result<bool> {
        Ok(true)
    }
}
