//! Avatar rig and model loading
//!
//! [`AvatarRig`] is the loaded avatar: an expression-weight table and a
//! named-bone local-rotation table, parsed from VRM/GLB bytes.
//! [`ModelLoader`] turns a selected file path into a rig.

pub mod loader;
pub mod rig;

pub use loader::ModelLoader;
pub use rig::AvatarRig;
