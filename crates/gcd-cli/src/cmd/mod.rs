pub mod extract;
pub mod show;
