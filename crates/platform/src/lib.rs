//! Platform layer: winit window, Vulkan surface and per-frame input state.

mod input;
mod window;

pub use input::{InputState, KeyCode};
pub use window::{Surface, Window};

pub use winit::dpi::PhysicalSize;
pub use winit::event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent};
pub use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
