use nodescape_base::{CameraConfig, PickingConfig};
use nodescape_geometry::Vec3;
use serde::{Deserialize, Serialize};

use crate::camera::{CameraPose, OrbitCamera};
use crate::picking::PickRequest;

/// Pointer travel in pixels below which a press and release count as a click.
const CLICK_SLOP: f64 = 3.0;
/// Pan distance per pixel, relative to the camera distance.
const PAN_SCALE: f64 = 0.002;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputEvent {
    Resize {
        width: f64,
        height: f64,
    },
    PointerDown {
        x: f64,
        y: f64,
        button: PointerButton,
        modifiers: Modifiers,
    },
    PointerMove {
        x: f64,
        y: f64,
    },
    PointerUp {
        x: f64,
        y: f64,
        button: PointerButton,
    },
    Scroll {
        delta: f64,
    },
    ResetCamera,
    /// Frame every shown node. Needs the node set, so the render procedure
    /// handles it.
    FitView,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Gesture {
    Orbit,
    Roll,
    Pan,
    BoxSelect,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Press {
    origin: (f64, f64),
    last: (f64, f64),
    button: PointerButton,
    gesture: Gesture,
    moved: bool,
}

#[derive(Clone, Debug, Default)]
pub struct InputHandler {
    press: Option<Press>,
}

impl InputHandler {
    pub fn is_dragging(&self) -> bool {
        self.press.is_some_and(|press| press.moved)
    }

    pub fn handle(
        &mut self,
        event: &InputEvent,
        camera: &mut OrbitCamera,
        camera_config: &CameraConfig,
        picking: &PickingConfig,
    ) -> Option<PickRequest> {
        match *event {
            InputEvent::Resize { .. } | InputEvent::FitView => None,
            InputEvent::PointerDown {
                x,
                y,
                button,
                modifiers,
            } => {
                let gesture = match (button, modifiers.shift, modifiers.ctrl) {
                    (PointerButton::Primary, true, _) => Gesture::BoxSelect,
                    (PointerButton::Primary, _, true) => Gesture::Roll,
                    (PointerButton::Primary, _, _) => Gesture::Orbit,
                    (PointerButton::Middle, _, true) => Gesture::Roll,
                    _ => Gesture::Pan,
                };
                self.press = Some(Press {
                    origin: (x, y),
                    last: (x, y),
                    button,
                    gesture,
                    moved: false,
                });
                None
            }
            InputEvent::PointerMove { x, y } => {
                let press = self.press.as_mut()?;
                let dx = x - press.last.0;
                let dy = y - press.last.1;
                press.last = (x, y);
                if (x - press.origin.0).hypot(y - press.origin.1) > CLICK_SLOP {
                    press.moved = true;
                }
                if !press.moved {
                    return None;
                }
                let sensitivity = camera_config.drag_sensitivity;
                match press.gesture {
                    Gesture::Orbit => {
                        camera.orbit_right(-dx * sensitivity);
                        camera.orbit_up(dy * sensitivity);
                    }
                    Gesture::Roll => camera.roll(dx * sensitivity),
                    Gesture::Pan => pan(camera, dx, dy),
                    Gesture::BoxSelect => {}
                }
                None
            }
            InputEvent::PointerUp { x, y, button } => {
                let press = self.press.take()?;
                if press.button != button {
                    return None;
                }
                match (press.gesture, press.moved) {
                    (Gesture::BoxSelect, true) => {
                        Some(PickRequest::rect(press.origin.0, press.origin.1, x, y))
                    }
                    (Gesture::Orbit | Gesture::BoxSelect, false) => {
                        Some(PickRequest::point(x, y, picking.single_pick_box))
                    }
                    _ => None,
                }
            }
            InputEvent::Scroll { delta } => {
                camera.move_forward(delta * camera_config.zoom_speed * camera.distance());
                None
            }
            InputEvent::ResetCamera => {
                camera.reset();
                None
            }
        }
    }
}

fn pan(camera: &mut OrbitCamera, dx: f64, dy: f64) {
    let pose = camera.pose();
    let scale = pose.distance() * PAN_SCALE;
    let offset: Vec3 = -pose.right() * (dx * scale) + pose.true_up() * (dy * scale);
    camera.set_pose(CameraPose {
        position: pose.position + offset,
        target: pose.target + offset,
        up: pose.up,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn down(x: f64, y: f64, button: PointerButton, modifiers: Modifiers) -> InputEvent {
        InputEvent::PointerDown {
            x,
            y,
            button,
            modifiers,
        }
    }

    fn run(events: &[InputEvent], camera: &mut OrbitCamera) -> Vec<PickRequest> {
        let mut handler = InputHandler::default();
        let camera_config = CameraConfig::default();
        let picking = PickingConfig::default();
        events
            .iter()
            .filter_map(|event| handler.handle(event, camera, &camera_config, &picking))
            .collect()
    }

    #[test]
    fn click_requests_single_pick() {
        let mut camera = OrbitCamera::default();
        let picks = run(
            &[
                down(40.0, 30.0, PointerButton::Primary, Modifiers::default()),
                InputEvent::PointerMove { x: 41.0, y: 30.0 },
                InputEvent::PointerUp {
                    x: 41.0,
                    y: 30.0,
                    button: PointerButton::Primary,
                },
            ],
            &mut camera,
        );
        assert_eq!(picks.len(), 1);
        assert!(!picks[0].select_all);
        assert_eq!(picks[0].region.center_x, 41.0);
        assert_eq!(camera.pose(), OrbitCamera::default().pose());
    }

    #[test]
    fn shift_drag_requests_box_pick() {
        let mut camera = OrbitCamera::default();
        let shift = Modifiers {
            shift: true,
            ctrl: false,
        };
        let picks = run(
            &[
                down(10.0, 10.0, PointerButton::Primary, shift),
                InputEvent::PointerMove { x: 60.0, y: 40.0 },
                InputEvent::PointerUp {
                    x: 60.0,
                    y: 40.0,
                    button: PointerButton::Primary,
                },
            ],
            &mut camera,
        );
        assert_eq!(picks.len(), 1);
        assert!(picks[0].select_all);
        assert_eq!(picks[0].region.width, 50.0);
        assert_eq!(picks[0].region.height, 30.0);
    }

    #[test]
    fn drag_orbits_and_keeps_distance() {
        let mut camera = OrbitCamera::default();
        let distance = camera.distance();
        let picks = run(
            &[
                down(10.0, 10.0, PointerButton::Primary, Modifiers::default()),
                InputEvent::PointerMove { x: 80.0, y: 50.0 },
                InputEvent::PointerUp {
                    x: 80.0,
                    y: 50.0,
                    button: PointerButton::Primary,
                },
            ],
            &mut camera,
        );
        assert!(picks.is_empty());
        assert!(camera.position().distance(OrbitCamera::default().position()) > 0.1);
        assert!((camera.distance() - distance).abs() < 1.0e-9);
    }

    #[test]
    fn pan_moves_target_with_camera() {
        let mut camera = OrbitCamera::default();
        run(
            &[
                down(10.0, 10.0, PointerButton::Secondary, Modifiers::default()),
                InputEvent::PointerMove { x: 60.0, y: 10.0 },
            ],
            &mut camera,
        );
        assert!(camera.target().x < 0.0);
        assert!((camera.position().x - camera.target().x).abs() < 1.0e-12);
    }

    #[test]
    fn scroll_dollies_and_reset_restores() {
        let mut camera = OrbitCamera::default();
        let distance = camera.distance();
        run(&[InputEvent::Scroll { delta: 4.0 }], &mut camera);
        assert!(camera.distance() < distance);
        run(&[InputEvent::ResetCamera], &mut camera);
        assert_eq!(camera.pose(), OrbitCamera::default().pose());
    }
}
