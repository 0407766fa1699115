pub mod keymap;
pub mod settings;

pub use keymap::KeymapSettings;
pub use settings::UndoSettings;
