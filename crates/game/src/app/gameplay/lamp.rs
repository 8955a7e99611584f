use engine::{Electrifiable, EntityId};
use tracing::debug;

/// A street lamp: a shock lights it, the switch toggles it.
#[derive(Debug, Default)]
pub(crate) struct Lamp {
    lit: bool,
}

impl Electrifiable for Lamp {
    fn electrify(&mut self, source: EntityId) {
        if !self.lit {
            debug!(source = %source, "lamp_lit");
        }
        self.lit = true;
    }

    fn interact(&mut self, source: EntityId) -> bool {
        self.lit = !self.lit;
        debug!(source = %source, lit = self.lit, "lamp_switched");
        true
    }

    fn is_powered(&self) -> bool {
        self.lit
    }
}
