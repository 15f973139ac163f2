pub mod draft;
pub mod learned_tone;
pub mod log;
pub mod profile;
