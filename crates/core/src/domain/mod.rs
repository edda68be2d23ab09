pub mod dialogue;
pub mod intent;
pub mod interaction;
pub mod session;
pub mod workflow;
