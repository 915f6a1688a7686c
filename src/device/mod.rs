//! Hardware collaborator implementations
//!
//! Real camera and microphone sources behind the `devices` feature:
//! nokhwa's threaded callback camera and a cpal input stream bridged to
//! the blocking read contract.

mod camera;
mod microphone;

pub use camera::NokhwaCamera;
pub use microphone::CpalMicrophone;
