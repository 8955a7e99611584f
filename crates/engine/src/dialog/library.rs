use rand::Rng;

use super::script::{DialogScript, Message};
use super::shuffle::ShuffleBag;

/// One NPC's scripts, their cursors and the shuffle bag for repeatables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialogLibrary {
    scripts: Vec<DialogScript>,
    bag: ShuffleBag,
    active: Option<usize>,
    version_id: i32,
}

impl DialogLibrary {
    pub fn new(scripts: Vec<DialogScript>, version_id: i32) -> Self {
        Self {
            scripts,
            bag: ShuffleBag::default(),
            active: None,
            version_id,
        }
    }

    /// Rebuilds an idle library from stored parts.
    pub fn from_parts(scripts: Vec<DialogScript>, bag: ShuffleBag, version_id: i32) -> Self {
        Self {
            scripts,
            bag,
            active: None,
            version_id,
        }
    }

    /// Marks `index` as the script being spoken. Refused for unknown or
    /// exhausted scripts.
    pub fn resume(&mut self, index: usize) -> bool {
        let speakable = self
            .scripts
            .get(index)
            .is_some_and(|script| !script.is_exhausted());
        if speakable {
            self.active = Some(index);
        }
        speakable
    }

    /// Drops the active script without touching any cursor.
    pub fn end_conversation(&mut self) {
        self.active = None;
    }

    pub fn scripts(&self) -> &[DialogScript] {
        &self.scripts
    }

    pub fn bag(&self) -> &ShuffleBag {
        &self.bag
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn version_id(&self) -> i32 {
        self.version_id
    }

    pub fn is_talking(&self) -> bool {
        self.active.is_some()
    }

    /// The line last shown by the active script, if any.
    pub fn active_message(&self) -> Option<&Message> {
        self.active
            .and_then(|index| self.scripts.get(index))
            .and_then(DialogScript::current_message)
    }

    /// Picks a script if none is active and reads its next line.
    ///
    /// Play-once scripts that still have lines win in stored order. Otherwise
    /// a repeatable script is drawn from the bag, refilling it first when it
    /// is empty. Any call that yields no line ends the conversation.
    pub fn select_and_advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<String> {
        if self.active.is_none() {
            self.active = self
                .scripts
                .iter()
                .position(|script| script.play_once() && !script.is_exhausted());
        }

        if self.active.is_none() {
            if self.bag.is_empty() {
                self.bag.refill(&self.scripts, rng);
            }
            self.active = self.bag.pop();
        }

        let index = self.active?;
        let line = self
            .scripts
            .get_mut(index)
            .and_then(|script| script.advance().map(str::to_owned));
        if line.is_none() {
            self.active = None;
        }
        line
    }

    /// Swaps in a new script set unless `version_id` is already applied.
    ///
    /// Returns whether anything changed.
    pub fn override_with(&mut self, scripts: &[DialogScript], version_id: i32) -> bool {
        if version_id == self.version_id {
            return false;
        }
        self.scripts = scripts.iter().map(DialogScript::fresh_copy).collect();
        self.active = None;
        self.bag.clear();
        self.version_id = version_id;
        true
    }
}
