//! Keyboard shortcuts mapped to surface controls.
use bevy::prelude::*;

use crate::core::system::system_order::FluidFrameSet;
use crate::rendering::surface::{FluidControl, SurfaceTarget};

/// Control bound to `key`, applied to every surface.
pub fn control_for_key(key: KeyCode) -> Option<FluidControl> {
    let all = SurfaceTarget::All;
    match key {
        KeyCode::KeyP => Some(FluidControl::TogglePause(all)),
        KeyCode::Space => Some(FluidControl::RandomSplats(all)),
        #[cfg(feature = "debug")]
        KeyCode::KeyV => Some(FluidControl::CycleDisplay(all)),
        _ => None,
    }
}

fn keyboard_controls(keys: Res<ButtonInput<KeyCode>>, mut controls: EventWriter<FluidControl>) {
    for key in keys.get_just_pressed() {
        if let Some(control) = control_for_key(*key) {
            info!(target: "fluid_host", "key {key:?} -> {control:?}");
            controls.write(control);
        }
    }
}

pub struct ControlsPlugin;

impl Plugin for ControlsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, keyboard_controls.before(FluidFrameSet::Input));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_and_splat_keys_target_all_surfaces() {
        assert_eq!(
            control_for_key(KeyCode::KeyP),
            Some(FluidControl::TogglePause(SurfaceTarget::All))
        );
        assert_eq!(
            control_for_key(KeyCode::Space),
            Some(FluidControl::RandomSplats(SurfaceTarget::All))
        );
        assert_eq!(control_for_key(KeyCode::KeyQ), None);
    }

    #[cfg(feature = "debug")]
    #[test]
    fn v_cycles_display_in_debug_builds() {
        assert_eq!(
            control_for_key(KeyCode::KeyV),
            Some(FluidControl::CycleDisplay(SurfaceTarget::All))
        );
    }
}
