use std::collections::HashMap;

use crate::dialog::{DialogLibrary, DialogScript};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DialogDefId(pub u32);

/// Authored dialog for one speaker: scripts with fresh cursors.
#[derive(Debug, Clone)]
pub struct DialogDef {
    pub id: DialogDefId,
    pub def_name: String,
    pub version_id: i32,
    pub scripts: Vec<DialogScript>,
}

impl DialogDef {
    /// A new runtime library seeded from this definition.
    pub fn library(&self) -> DialogLibrary {
        DialogLibrary::new(
            self.scripts.iter().map(DialogScript::fresh_copy).collect(),
            self.version_id,
        )
    }
}

#[derive(Debug, Default, Clone)]
pub struct DialogDatabase {
    dialog_defs: Vec<DialogDef>,
    dialog_ids_by_name: HashMap<String, DialogDefId>,
}

impl DialogDatabase {
    pub(crate) fn from_dialog_defs(mut dialog_defs: Vec<DialogDef>) -> Self {
        let mut dialog_ids_by_name = HashMap::with_capacity(dialog_defs.len());
        for (idx, def) in dialog_defs.iter_mut().enumerate() {
            let id = DialogDefId(idx as u32);
            def.id = id;
            dialog_ids_by_name.insert(def.def_name.clone(), id);
        }
        Self {
            dialog_defs,
            dialog_ids_by_name,
        }
    }

    pub fn dialog_def_id_by_name(&self, name: &str) -> Option<DialogDefId> {
        self.dialog_ids_by_name.get(name).copied()
    }

    pub fn dialog_def(&self, id: DialogDefId) -> Option<&DialogDef> {
        self.dialog_defs.get(id.0 as usize)
    }

    pub fn dialog_def_by_name(&self, name: &str) -> Option<&DialogDef> {
        self.dialog_def_id_by_name(name)
            .and_then(|id| self.dialog_def(id))
    }

    pub fn dialog_defs(&self) -> &[DialogDef] {
        &self.dialog_defs
    }
}
