pub mod arrow;
pub mod strings;
pub mod trampoline;
