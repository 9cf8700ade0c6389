//! # Events Module
//!
//! Progress reporting for walks.
//!
//! ## Design
//! The walker emits events through a channel, so the CLI (or anything else)
//! can follow a run without the core knowing how it is displayed.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         match event {
//!             Event::Walk(WalkEvent::DirectoryStarted { path, files }) => {
//!                 println!("{}: {} files", path.display(), files)
//!             }
//!             Event::File(FileEvent::Processed { path, outcome }) => {
//!                 println!("{}: {}", path.display(), outcome)
//!             }
//!             _ => {}
//!         }
//!     }
//! });
//!
//! walker.run_with_events(&root, &sender)?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
