use std::collections::BTreeMap;

use engine::{DialogBoxId, PresentationError, PresentationSurface, Vec3};
use tracing::info;

#[derive(Debug, Clone)]
struct ConsoleBox {
    anchor: Vec3,
    text: String,
    revealed: usize,
}

impl ConsoleBox {
    fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    fn is_done(&self) -> bool {
        self.revealed >= self.char_count()
    }
}

/// Dialog boxes printed to the log, revealing a few characters per tick.
#[derive(Debug)]
pub(crate) struct ConsoleSurface {
    boxes: BTreeMap<DialogBoxId, ConsoleBox>,
    next_id: u64,
    chars_per_tick: usize,
    canvas_ready: bool,
}

impl ConsoleSurface {
    pub(crate) fn new(chars_per_tick: usize) -> Self {
        Self {
            boxes: BTreeMap::new(),
            next_id: 1,
            chars_per_tick: chars_per_tick.max(1),
            canvas_ready: true,
        }
    }

    /// Without a canvas every box creation fails.
    pub(crate) fn set_canvas_ready(&mut self, ready: bool) {
        self.canvas_ready = ready;
    }

    pub(crate) fn tick_reveal(&mut self) {
        for dialog_box in self.boxes.values_mut() {
            dialog_box.revealed = (dialog_box.revealed + self.chars_per_tick)
                .min(dialog_box.char_count());
        }
    }

    #[cfg(test)]
    pub(crate) fn open_boxes(&self) -> usize {
        self.boxes.len()
    }

    #[cfg(test)]
    pub(crate) fn text_of(&self, id: DialogBoxId) -> Option<&str> {
        self.boxes.get(&id).map(|dialog_box| dialog_box.text.as_str())
    }

    /// Drops every box, as a scene teardown would.
    pub(crate) fn clear(&mut self) {
        self.boxes.clear();
    }
}

impl PresentationSurface for ConsoleSurface {
    fn create_dialog_box(
        &mut self,
        anchor: Vec3,
        text: &str,
    ) -> Result<DialogBoxId, PresentationError> {
        if !self.canvas_ready {
            return Err(PresentationError::NoCanvas);
        }
        let id = DialogBoxId(self.next_id);
        self.next_id += 1;
        info!(
            dialog_box = id.0,
            x = anchor.x,
            y = anchor.y,
            z = anchor.z,
            text,
            "dialog_box_opened"
        );
        self.boxes.insert(
            id,
            ConsoleBox {
                anchor,
                text: text.to_string(),
                revealed: 0,
            },
        );
        Ok(id)
    }

    fn is_done(&self, id: DialogBoxId) -> Option<bool> {
        self.boxes.get(&id).map(ConsoleBox::is_done)
    }

    fn skip_reveal(&mut self, id: DialogBoxId) {
        if let Some(dialog_box) = self.boxes.get_mut(&id) {
            dialog_box.revealed = dialog_box.char_count();
        }
    }

    fn set_message(&mut self, id: DialogBoxId, text: &str) -> bool {
        let Some(dialog_box) = self.boxes.get_mut(&id) else {
            return false;
        };
        info!(dialog_box = id.0, x = dialog_box.anchor.x, text, "dialog_box_text");
        dialog_box.text = text.to_string();
        dialog_box.revealed = 0;
        true
    }

    fn destroy(&mut self, id: DialogBoxId) {
        if self.boxes.remove(&id).is_some() {
            info!(dialog_box = id.0, "dialog_box_closed");
        }
    }
}
