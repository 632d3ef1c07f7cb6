//! Input event routing.
//!
//! Translates raw input events (pointer button edges, selection hotkeys,
//! wheel steps) into motion-controller state changes. Two selection slots
//! each hold a (group, option) pair into the step table; hotkeys 1 and 2
//! activate a slot and apply its step, hotkey 3 deactivates and zeroes the
//! step, and wheel events cycle the active slot through its group's options
//! and re-apply immediately.

use std::sync::Mutex;

use crate::config::{SlotSelection, StepTable};
use crate::motion::MotionController;

/// A raw input event already mapped from platform scancodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    LeftDown,
    LeftUp,
    RightDown,
    RightUp,
    WheelUp,
    WheelDown,
    /// Numeric selection hotkey (1-based).
    Hotkey(u8),
}

struct RouterState {
    table: StepTable,
    slots: [SlotSelection; 2],
    active: Option<usize>,
}

/// Thread-safe router owning the motion controller.
pub struct InputRouter {
    controller: Mutex<MotionController>,
    state: Mutex<RouterState>,
}

impl InputRouter {
    pub fn new(
        controller: MotionController,
        table: StepTable,
        slots: [SlotSelection; 2],
    ) -> Self {
        Self {
            controller: Mutex::new(controller),
            state: Mutex::new(RouterState {
                table,
                slots,
                active: None,
            }),
        }
    }

    pub fn handle(&self, event: InputEvent) {
        match event {
            InputEvent::LeftDown => self.with_controller(|c| c.set_left_held(true)),
            InputEvent::LeftUp => self.with_controller(|c| c.set_left_held(false)),
            InputEvent::RightDown => self.with_controller(|c| c.set_right_held(true)),
            InputEvent::RightUp => self.with_controller(|c| c.set_right_held(false)),
            InputEvent::Hotkey(1) => self.activate(Some(0)),
            InputEvent::Hotkey(2) => self.activate(Some(1)),
            InputEvent::Hotkey(3) => self.activate(None),
            InputEvent::Hotkey(other) => {
                log::debug!("unbound hotkey {other}");
            }
            InputEvent::WheelUp => self.cycle_active_option(1),
            InputEvent::WheelDown => self.cycle_active_option(-1),
        }
    }

    /// Replace a slot's selection. An active slot re-applies its step.
    pub fn set_selection(&self, slot: usize, selection: SlotSelection) {
        let reapply = {
            let mut state = self.lock_state();
            if slot >= state.slots.len() {
                log::warn!("selection slot {slot} out of range");
                return;
            }
            state.slots[slot] = selection;
            state.active == Some(slot)
        };
        if reapply {
            self.apply_active();
        }
    }

    /// Swap in a new step table, re-applying the active selection against it.
    pub fn refresh_table(&self, table: StepTable) {
        let reapply = {
            let mut state = self.lock_state();
            state.table = table;
            state.active.is_some()
        };
        if reapply {
            self.apply_active();
        }
    }

    pub fn selections(&self) -> [SlotSelection; 2] {
        self.lock_state().slots.clone()
    }

    pub fn active_slot(&self) -> Option<usize> {
        self.lock_state().active
    }

    pub fn current_step(&self) -> f64 {
        match self.controller.lock() {
            Ok(controller) => controller.step(),
            Err(_) => 0.0,
        }
    }

    fn activate(&self, slot: Option<usize>) {
        self.lock_state().active = slot;
        self.apply_active();
    }

    /// Move the active slot's option forward or back within its group and
    /// re-apply the step.
    fn cycle_active_option(&self, direction: i32) {
        let changed = {
            let mut state = self.lock_state();
            let Some(slot) = state.active else {
                return;
            };
            let options = state.table.options(&state.slots[slot].group);
            if options.is_empty() {
                return;
            }
            let current = options
                .iter()
                .position(|option| *option == state.slots[slot].option)
                .unwrap_or(0);
            let next = (current as i32 + direction).rem_euclid(options.len() as i32) as usize;
            state.slots[slot].option = options[next].clone();
            log::info!(
                "slot {} option cycled to {}/{}",
                slot + 1,
                state.slots[slot].group,
                state.slots[slot].option
            );
            true
        };
        if changed {
            self.apply_active();
        }
    }

    /// Push the active selection's step (or zero) into the controller. The
    /// state lock is released before the controller lock is taken.
    fn apply_active(&self) {
        let step = {
            let state = self.lock_state();
            match state.active {
                Some(slot) => {
                    let selection = &state.slots[slot];
                    match state.table.lookup(&selection.group, &selection.option) {
                        Some(step) => step,
                        None => {
                            log::warn!(
                                "no step for {}/{}, using 0",
                                selection.group,
                                selection.option
                            );
                            0.0
                        }
                    }
                }
                None => 0.0,
            }
        };
        self.with_controller(|c| c.set_step(step));
    }

    fn with_controller(&self, f: impl FnOnce(&mut MotionController)) {
        match self.controller.lock() {
            Ok(mut controller) => f(&mut controller),
            Err(_) => log::error!("motion controller lock poisoned"),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RouterState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inject::NullInjector;
    use crate::motion::MotionProfile;

    fn router() -> InputRouter {
        let mut table = StepTable::default();
        table.ensure_default();
        InputRouter::new(
            MotionController::new(Box::new(NullInjector), MotionProfile::default()),
            table,
            [
                SlotSelection::new("baseline", "medium"),
                SlotSelection::new("extended", "medium"),
            ],
        )
    }

    #[test]
    fn hotkeys_apply_slot_steps() {
        let router = router();
        assert_eq!(router.current_step(), 0.0);

        router.handle(InputEvent::Hotkey(1));
        assert_eq!(router.active_slot(), Some(0));
        assert_eq!(router.current_step(), 4.0);

        router.handle(InputEvent::Hotkey(2));
        assert_eq!(router.active_slot(), Some(1));
        assert_eq!(router.current_step(), 6.0);

        router.handle(InputEvent::Hotkey(3));
        assert_eq!(router.active_slot(), None);
        assert_eq!(router.current_step(), 0.0);
    }

    #[test]
    fn wheel_cycles_active_slot_and_reapplies() {
        let router = router();
        router.handle(InputEvent::Hotkey(1));
        // Options for "baseline" in stable order: high, low, medium.
        assert_eq!(router.selections()[0].option, "medium");

        router.handle(InputEvent::WheelUp);
        assert_eq!(router.selections()[0].option, "high");
        assert_eq!(router.current_step(), 6.0);

        router.handle(InputEvent::WheelDown);
        assert_eq!(router.selections()[0].option, "medium");
        assert_eq!(router.current_step(), 4.0);
    }

    #[test]
    fn wheel_without_active_slot_is_ignored() {
        let router = router();
        router.handle(InputEvent::WheelUp);
        assert_eq!(router.selections()[0].option, "medium");
        assert_eq!(router.current_step(), 0.0);
    }

    #[test]
    fn missing_table_entry_applies_zero() {
        let router = router();
        router.set_selection(0, SlotSelection::new("baseline", "nonexistent"));
        router.handle(InputEvent::Hotkey(1));
        assert_eq!(router.current_step(), 0.0);
    }

    #[test]
    fn refresh_table_reapplies_active_step() {
        let router = router();
        router.handle(InputEvent::Hotkey(1));
        assert_eq!(router.current_step(), 4.0);

        let mut table = StepTable::default();
        table
            .0
            .entry("baseline".to_string())
            .or_default()
            .insert("medium".to_string(), 7.5);
        router.refresh_table(table);
        assert_eq!(router.current_step(), 7.5);
    }

    #[test]
    fn unbound_hotkey_changes_nothing() {
        let router = router();
        router.handle(InputEvent::Hotkey(9));
        assert_eq!(router.active_slot(), None);
        assert_eq!(router.current_step(), 0.0);
    }
}
