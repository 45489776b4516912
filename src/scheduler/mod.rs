pub mod frame_clock;
pub mod time_interface;
