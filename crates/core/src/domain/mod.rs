pub mod importance;
pub mod item;
