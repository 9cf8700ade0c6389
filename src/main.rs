//! # mediamanager CLI
//!
//! Command-line interface for the media manager.
//!
//! ## Usage
//! ```bash
//! mediamanager scan ~/Media --move-duplicates
//! mediamanager import /Volumes/CARD/DCIM --verbose
//! ```

mod cli;

use media_manager::Result;

fn main() -> Result<()> {
    cli::run()
}
