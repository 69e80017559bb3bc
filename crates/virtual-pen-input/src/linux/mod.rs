//! Linux backend: uinput through evdev.

pub mod emulation;

pub use emulation::UinputEmulation;
