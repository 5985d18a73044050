//! Host-side input/output state the evaluator exposes to a running program and the
//! "do something outside the process" requests a program can emit.
//!
//! Grounded in the `GETINPUT`/`GAMEPAD`/`KEYS`/`WINDOWSIZE` cases of `runProgram` in
//! `original_source/program.c`, which read directly from SDL globals (`dx`/`dy`/`buttons`/
//! `keys`/`controllers`/...). Here that global mutable state is replaced with a plain struct
//! the host (the binary's windowing/input layer, out of scope for this crate) refreshes once
//! per frame and hands to the evaluator; driving an actual window is an external stage this
//! crate does not implement.

/// Number of scancodes the `keys` step reports, matching `SDL_NUM_SCANCODES`.
pub const NUM_KEYS: usize = 512;

/// Per-gamepad axis/button sample: 21 floats, matching the original's per-controller
/// `joysticks[i * 21]` block (axes followed by button states).
pub const GAMEPAD_FLOATS: usize = 21;

/// Mouse/keyboard/gamepad/window state refreshed by the host once per frame.
#[derive(Debug, Clone)]
pub struct HostInput {
    pub mouse_dx: f32,
    pub mouse_dy: f32,
    pub wheel_delta: f32,
    pub left_button: f32,
    pub right_button: f32,
    pub middle_button: f32,
    pub keys: Vec<f32>,
    pub gamepads: Vec<[f32; GAMEPAD_FLOATS]>,
    pub window_width: f32,
    pub window_height: f32,
    pub time_delta: f32,
    /// The IME composition buffer backing the `textInput` step.
    pub text_input: String,
}

impl Default for HostInput {
    fn default() -> Self {
        Self {
            mouse_dx: 0.0,
            mouse_dy: 0.0,
            wheel_delta: 0.0,
            left_button: 0.0,
            right_button: 0.0,
            middle_button: 0.0,
            keys: vec![0.0; NUM_KEYS],
            gamepads: Vec::new(),
            window_width: 0.0,
            window_height: 0.0,
            time_delta: 0.0,
            text_input: String::new(),
        }
    }
}

/// A request a running program emits for the host to act on outside the evaluator's own
/// stack-machine state. Neither variant has a meaningful effect inside this crate; the
/// binary embedding the evaluator is responsible for actually toggling fullscreen or driving
/// force feedback.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    Fullscreen,
    GamepadRumble { gamepad: u32, left: f32, right: f32 },
}
