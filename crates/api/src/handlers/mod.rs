pub mod history;
pub mod runs;
pub mod scripts;
