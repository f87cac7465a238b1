pub mod photobinner_core;
