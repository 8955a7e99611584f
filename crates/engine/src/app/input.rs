#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    Interact,
    Inventory,
    Jump,
    Quit,
}

const ACTION_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::Interact => 0,
            InputAction::Inventory => 1,
            InputAction::Jump => 2,
            InputAction::Quit => 3,
        }
    }
}

/// Input consumed by one fixed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputSnapshot {
    quit_requested: bool,
    interact_pressed: bool,
    inventory_pressed: bool,
    inventory_released: bool,
    actions: ActionStates,
    electrify_axis: f32,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn interact_pressed(&self) -> bool {
        self.interact_pressed
    }

    pub fn inventory_pressed(&self) -> bool {
        self.inventory_pressed
    }

    pub fn inventory_released(&self) -> bool {
        self.inventory_released
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn electrify_axis(&self) -> f32 {
        self.electrify_axis
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn with_interact_pressed(mut self, interact_pressed: bool) -> Self {
        self.interact_pressed = interact_pressed;
        self
    }

    pub fn with_inventory_pressed(mut self, inventory_pressed: bool) -> Self {
        self.inventory_pressed = inventory_pressed;
        self
    }

    pub fn with_inventory_released(mut self, inventory_released: bool) -> Self {
        self.inventory_released = inventory_released;
        self
    }

    pub fn with_electrify_axis(mut self, electrify_axis: f32) -> Self {
        self.electrify_axis = electrify_axis;
        self
    }
}

/// Latches button edges between fixed ticks.
///
/// A press while the button is up sets a pending edge; any number of further
/// presses before the next [`InputCollector::snapshot_for_tick`] coalesce into
/// that one edge.
#[derive(Debug, Default)]
pub struct InputCollector {
    quit_requested: bool,
    interact_pressed_edge: bool,
    inventory_pressed_edge: bool,
    inventory_released_edge: bool,
    action_states: ActionStates,
    electrify_axis: f32,
}

impl InputCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_button(&mut self, action: InputAction, state: ButtonState) {
        let was_down = self.action_states.is_down(action);
        let is_pressed = state == ButtonState::Pressed;
        self.action_states.set(action, is_pressed);

        match (action, state) {
            (InputAction::Interact, ButtonState::Pressed) if !was_down => {
                self.interact_pressed_edge = true;
            }
            (InputAction::Inventory, ButtonState::Pressed) if !was_down => {
                self.inventory_pressed_edge = true;
            }
            (InputAction::Inventory, ButtonState::Released) if was_down => {
                self.inventory_released_edge = true;
            }
            (InputAction::Quit, ButtonState::Pressed) => {
                self.quit_requested = true;
            }
            _ => {}
        }
    }

    pub fn set_electrify_axis(&mut self, value: f32) {
        self.electrify_axis = if value.is_finite() { value } else { 0.0 };
    }

    pub fn snapshot_for_tick(&mut self) -> InputSnapshot {
        let snapshot = InputSnapshot {
            quit_requested: self.quit_requested,
            interact_pressed: self.interact_pressed_edge,
            inventory_pressed: self.inventory_pressed_edge,
            inventory_released: self.inventory_released_edge,
            actions: self.action_states,
            electrify_axis: self.electrify_axis,
        };
        self.interact_pressed_edge = false;
        self.inventory_pressed_edge = false;
        self.inventory_released_edge = false;
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interact_press_is_edge_triggered_for_single_tick() {
        let mut input = InputCollector::new();
        input.handle_button(InputAction::Interact, ButtonState::Pressed);

        let first = input.snapshot_for_tick();
        let second = input.snapshot_for_tick();

        assert!(first.interact_pressed());
        assert!(!second.interact_pressed());
    }

    #[test]
    fn two_presses_between_ticks_coalesce_into_one_edge() {
        let mut input = InputCollector::new();
        input.handle_button(InputAction::Interact, ButtonState::Pressed);
        input.handle_button(InputAction::Interact, ButtonState::Released);
        input.handle_button(InputAction::Interact, ButtonState::Pressed);
        input.handle_button(InputAction::Interact, ButtonState::Released);

        let first = input.snapshot_for_tick();
        let second = input.snapshot_for_tick();

        assert!(first.interact_pressed());
        assert!(!second.interact_pressed());
    }

    #[test]
    fn held_interact_does_not_spam_press_edges() {
        let mut input = InputCollector::new();
        input.handle_button(InputAction::Interact, ButtonState::Pressed);
        let _ = input.snapshot_for_tick();

        // OS key repeat
        input.handle_button(InputAction::Interact, ButtonState::Pressed);
        input.handle_button(InputAction::Interact, ButtonState::Pressed);
        let repeated = input.snapshot_for_tick();

        assert!(!repeated.interact_pressed());
        assert!(repeated.is_down(InputAction::Interact));
    }

    #[test]
    fn inventory_release_edge_requires_prior_press() {
        let mut input = InputCollector::new();
        input.handle_button(InputAction::Inventory, ButtonState::Released);
        assert!(!input.snapshot_for_tick().inventory_released());

        input.handle_button(InputAction::Inventory, ButtonState::Pressed);
        let pressed = input.snapshot_for_tick();
        assert!(pressed.inventory_pressed());

        input.handle_button(InputAction::Inventory, ButtonState::Released);
        let released = input.snapshot_for_tick();
        assert!(released.inventory_released());
        assert!(!released.inventory_pressed());
    }

    #[test]
    fn electrify_axis_is_level_sampled_and_rejects_nan() {
        let mut input = InputCollector::new();
        input.set_electrify_axis(1.0);
        assert_eq!(input.snapshot_for_tick().electrify_axis(), 1.0);
        assert_eq!(input.snapshot_for_tick().electrify_axis(), 1.0);

        input.set_electrify_axis(f32::NAN);
        assert_eq!(input.snapshot_for_tick().electrify_axis(), 0.0);
    }
}
