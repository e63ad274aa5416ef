// crates/pdo-exchange/src/pdo/layout.rs
use crate::types::{Direction, RegisterAddress, RegisterId};

/// A mapped register placed in a process-data image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEntry {
    pub register: RegisterId,
    /// Byte offset from the start of the image.
    pub offset: usize,
    /// Width in bytes.
    pub size: usize,
}

impl LayoutEntry {
    /// Byte range of the register inside its image.
    pub fn range(&self) -> core::ops::Range<usize> {
        self.offset..self.offset + self.size
    }

    /// Encodes the entry as a CANopen-style mapping object value.
    ///
    /// Only registers addressed by index/sub-index have such a representation.
    pub fn mapping_entry(&self) -> Option<PdoMappingEntry> {
        match self.register.address {
            RegisterAddress::Object { index, sub_index } => Some(PdoMappingEntry {
                index,
                sub_index,
                offset_bits: u16::try_from(self.offset * 8).ok()?,
                length_bits: u16::try_from(self.size * 8).ok()?,
            }),
            RegisterAddress::Named(_) => None,
        }
    }
}

/// Immutable snapshot of the input and output images derived from a
/// [`MappingTable`](super::MappingTable).
///
/// Entries keep mapping order. Offsets are cumulative, so entries never
/// overlap and each image is exactly as long as the sum of its entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameLayout {
    inputs: Vec<LayoutEntry>,
    outputs: Vec<LayoutEntry>,
    input_bytes: usize,
    output_bytes: usize,
}

impl FrameLayout {
    pub(crate) fn push(&mut self, register: RegisterId, size: usize, direction: Direction) {
        let (entries, total) = match direction {
            Direction::Input => (&mut self.inputs, &mut self.input_bytes),
            Direction::Output => (&mut self.outputs, &mut self.output_bytes),
        };
        entries.push(LayoutEntry {
            register,
            offset: *total,
            size,
        });
        *total += size;
    }

    pub fn inputs(&self) -> &[LayoutEntry] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[LayoutEntry] {
        &self.outputs
    }

    pub fn entries(&self, direction: Direction) -> &[LayoutEntry] {
        match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        }
    }

    pub fn input_bytes(&self) -> usize {
        self.input_bytes
    }

    pub fn output_bytes(&self) -> usize {
        self.output_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    /// Position of an input register in every [`Sample`](crate::Sample) produced with this layout.
    pub fn input_position(&self, register: &RegisterId) -> Option<usize> {
        self.inputs.iter().position(|entry| &entry.register == register)
    }

    pub fn output_entry(&self, register: &RegisterId) -> Option<&LayoutEntry> {
        self.outputs.iter().find(|entry| &entry.register == register)
    }

    /// Mapping object values for `direction`, in frame order.
    ///
    /// Returns `None` if any register is only known by name; the transport
    /// has to resolve those itself.
    pub fn mapping_entries(&self, direction: Direction) -> Option<Vec<PdoMappingEntry>> {
        self.entries(direction)
            .iter()
            .map(LayoutEntry::mapping_entry)
            .collect()
    }
}

/// Value of one CiA 301 mapping object: where a register sits in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdoMappingEntry {
    pub index: u16,
    pub sub_index: u8,
    pub offset_bits: u16,
    pub length_bits: u16,
}

impl PdoMappingEntry {
    /// Packs the entry as `length:16 | offset:16 | reserved:8 | sub-index:8 | index:16`,
    /// most significant field first.
    pub fn to_u64(self) -> u64 {
        u64::from(self.length_bits) << 48
            | u64::from(self.offset_bits) << 32
            | u64::from(self.sub_index) << 16
            | u64::from(self.index)
    }
}
