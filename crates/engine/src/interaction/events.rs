use crate::app::EntityId;

#[derive(Debug, Clone, PartialEq)]
pub enum InteractionEvent {
    ConversationStarted {
        player_id: EntityId,
        npc_id: EntityId,
    },
    ConversationEnded {
        player_id: EntityId,
        npc_id: EntityId,
    },
    DialogShown {
        npc_id: EntityId,
        text: String,
    },
    ItemEquipped {
        player_id: EntityId,
        item_id: EntityId,
    },
    /// A non-core item left the player's hands.
    ItemDropped {
        player_id: EntityId,
        item_id: EntityId,
    },
    /// A core item went back into the radial inventory.
    ItemStowed {
        player_id: EntityId,
        item_id: EntityId,
    },
    Grabbed {
        player_id: EntityId,
        target_id: EntityId,
    },
    GrabReleased {
        player_id: EntityId,
        target_id: EntityId,
    },
    Interacted {
        player_id: EntityId,
        target_id: EntityId,
    },
    Electrified {
        source_id: EntityId,
        target_id: EntityId,
    },
    ArmsRaised {
        player_id: EntityId,
    },
    ArmsLowered {
        player_id: EntityId,
    },
    HoverChanged {
        player_id: EntityId,
        item_id: Option<EntityId>,
    },
    HudToggled {
        player_id: EntityId,
        open: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionEventKind {
    ConversationStarted,
    ConversationEnded,
    DialogShown,
    ItemEquipped,
    ItemDropped,
    ItemStowed,
    Grabbed,
    GrabReleased,
    Interacted,
    Electrified,
    ArmsRaised,
    ArmsLowered,
    HoverChanged,
    HudToggled,
}

impl InteractionEvent {
    pub fn kind(&self) -> InteractionEventKind {
        match self {
            Self::ConversationStarted { .. } => InteractionEventKind::ConversationStarted,
            Self::ConversationEnded { .. } => InteractionEventKind::ConversationEnded,
            Self::DialogShown { .. } => InteractionEventKind::DialogShown,
            Self::ItemEquipped { .. } => InteractionEventKind::ItemEquipped,
            Self::ItemDropped { .. } => InteractionEventKind::ItemDropped,
            Self::ItemStowed { .. } => InteractionEventKind::ItemStowed,
            Self::Grabbed { .. } => InteractionEventKind::Grabbed,
            Self::GrabReleased { .. } => InteractionEventKind::GrabReleased,
            Self::Interacted { .. } => InteractionEventKind::Interacted,
            Self::Electrified { .. } => InteractionEventKind::Electrified,
            Self::ArmsRaised { .. } => InteractionEventKind::ArmsRaised,
            Self::ArmsLowered { .. } => InteractionEventKind::ArmsLowered,
            Self::HoverChanged { .. } => InteractionEventKind::HoverChanged,
            Self::HudToggled { .. } => InteractionEventKind::HudToggled,
        }
    }
}

/// Events emitted during one tick, drained by the scene afterwards.
#[derive(Debug, Default)]
pub struct InteractionEvents {
    current_tick_events: Vec<InteractionEvent>,
}

impl InteractionEvents {
    pub fn emit(&mut self, event: InteractionEvent) {
        self.current_tick_events.push(event);
    }

    pub fn iter(&self) -> impl Iterator<Item = &InteractionEvent> {
        self.current_tick_events.iter()
    }

    pub fn count(&self, kind: InteractionEventKind) -> usize {
        self.current_tick_events
            .iter()
            .filter(|event| event.kind() == kind)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.current_tick_events.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = InteractionEvent> + '_ {
        self.current_tick_events.drain(..)
    }

    pub fn clear(&mut self) {
        self.current_tick_events.clear();
    }
}
