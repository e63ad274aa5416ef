// crates/pdo-exchange/src/pdo/mapping.rs
use super::error::PdoError;
use super::layout::FrameLayout;
use crate::od::Dictionary;
use crate::types::{Direction, RegisterId};
use log::debug;

/// Maximum image sizes accepted by the transport, per direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    pub max_input_bytes: usize,
    pub max_output_bytes: usize,
}

impl FrameLimits {
    pub fn new(max_input_bytes: usize, max_output_bytes: usize) -> Self {
        Self {
            max_input_bytes,
            max_output_bytes,
        }
    }

    pub fn max(&self, direction: Direction) -> usize {
        match direction {
            Direction::Input => self.max_input_bytes,
            Direction::Output => self.max_output_bytes,
        }
    }
}

/// A register accepted into the mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRegister {
    pub register: RegisterId,
    /// Width in bytes, as reported by the dictionary.
    pub size: usize,
    pub direction: Direction,
}

/// Ordered list of registers that make up the cyclic frame.
///
/// Insertion order is wire order. The table is locked by the engine while
/// an exchange is active; every mutation then fails with
/// [`PdoError::AlreadyRunning`].
#[derive(Debug, Clone)]
pub struct MappingTable {
    entries: Vec<MappedRegister>,
    limits: FrameLimits,
    input_bytes: usize,
    output_bytes: usize,
    locked: bool,
}

impl MappingTable {
    pub fn new(limits: FrameLimits) -> Self {
        Self {
            entries: Vec::new(),
            limits,
            input_bytes: 0,
            output_bytes: 0,
            locked: false,
        }
    }

    /// Appends `register` to the `direction` image.
    ///
    /// The qualifier checks run first, so a non-cyclic register is always
    /// reported as such whatever the state of the table.
    pub fn add_register<D: Dictionary + ?Sized>(
        &mut self,
        dictionary: &D,
        register: RegisterId,
        direction: Direction,
    ) -> Result<(), PdoError> {
        if !dictionary.is_cyclic_capable(&register) {
            return Err(PdoError::NotCyclicCapable { register });
        }
        if !dictionary.allows_direction(&register, direction) {
            return Err(PdoError::DirectionNotAllowed {
                register,
                direction,
            });
        }
        if self.locked {
            return Err(PdoError::AlreadyRunning);
        }
        let Some(size) = dictionary.byte_width(&register) else {
            return Err(PdoError::UnknownRegister { register });
        };

        let max = self.limits.max(direction);
        let required = self.bytes(direction) + size;
        if required > max {
            return Err(PdoError::FrameOverflow {
                direction,
                required,
                max,
            });
        }

        debug!(
            "Mapped {} as {} ({} bytes, {} bytes used of {})",
            register, direction, size, required, max
        );
        match direction {
            Direction::Input => self.input_bytes = required,
            Direction::Output => self.output_bytes = required,
        }
        self.entries.push(MappedRegister {
            register,
            size,
            direction,
        });
        Ok(())
    }

    /// Removes every entry.
    pub fn clear(&mut self) -> Result<(), PdoError> {
        if self.locked {
            return Err(PdoError::AlreadyRunning);
        }
        self.entries.clear();
        self.input_bytes = 0;
        self.output_bytes = 0;
        Ok(())
    }

    /// Derives the frame layout from the current entries.
    pub fn build_layout(&self) -> FrameLayout {
        let mut layout = FrameLayout::default();
        for entry in &self.entries {
            layout.push(entry.register.clone(), entry.size, entry.direction);
        }
        layout
    }

    pub fn entries(&self) -> &[MappedRegister] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limits(&self) -> FrameLimits {
        self.limits
    }

    /// Bytes currently used in the `direction` image.
    pub fn bytes(&self, direction: Direction) -> usize {
        match direction {
            Direction::Input => self.input_bytes,
            Direction::Output => self.output_bytes,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub(crate) fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }
}
