pub mod assets;
pub mod core;
pub mod rendering;
