//! Media generation: selfies through an image backend, voice notes as
//! placeholder audio, and the prompt vocabulary behind them.

pub mod box_generator;
pub mod generator;
pub mod prompt;
pub mod service;
pub mod voice;
