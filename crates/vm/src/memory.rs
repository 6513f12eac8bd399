use crate::error::{VmError, VmResult};
use serde::Serialize;
use std::collections::HashMap;

/// Cells addressable per data page.
pub const CELLS_PER_PAGE: usize = 32;

/// One named 64-bit variable. Padding cells created by indexed writes have
/// an empty name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryCell {
    pub name: String,
    pub value: u64,
}

/// Contract variables in declaration order. A cell's address is its
/// position in that order.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    cells: Vec<MemoryCell>,
    index: HashMap<String, usize>,
    limit: usize,
}

impl Memory {
    pub fn new(data_pages: usize) -> Self {
        Self {
            cells: Vec::new(),
            index: HashMap::new(),
            limit: data_pages.saturating_mul(CELLS_PER_PAGE),
        }
    }

    /// Materializes `name` if it is new and returns its address.
    pub fn declare(&mut self, name: &str) -> usize {
        if let Some(&address) = self.index.get(name) {
            return address;
        }
        let address = self.cells.len();
        self.cells.push(MemoryCell {
            name: name.to_string(),
            value: 0,
        });
        self.index.insert(name.to_string(), address);
        address
    }

    /// Unknown names read as zero and stay unmaterialized.
    pub fn read(&self, name: &str) -> u64 {
        self.index
            .get(name)
            .map(|&address| self.cells[address].value)
            .unwrap_or(0)
    }

    pub fn write(&mut self, name: &str, value: u64) {
        let address = self.declare(name);
        self.cells[address].value = value;
    }

    pub fn read_at(&self, address: u64) -> VmResult<u64> {
        let address = self.check_address(address)?;
        Ok(self.cells.get(address).map(|cell| cell.value).unwrap_or(0))
    }

    pub fn write_at(&mut self, address: u64, value: u64) -> VmResult<()> {
        let address = self.check_address(address)?;
        while self.cells.len() <= address {
            self.cells.push(MemoryCell {
                name: String::new(),
                value: 0,
            });
        }
        self.cells[address].value = value;
        Ok(())
    }

    fn check_address(&self, address: u64) -> VmResult<usize> {
        match usize::try_from(address) {
            Ok(index) if index < self.limit => Ok(index),
            _ => Err(VmError::InvalidAddress(address)),
        }
    }

    pub fn cells(&self) -> &[MemoryCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Highest valid address plus one.
    pub fn limit(&self) -> usize {
        self.limit
    }
}
