pub mod apply;
pub mod init;
pub mod inspect;
pub mod pages;

pub use apply::{apply, ApplyArgs};
pub use init::{init, InitArgs};
pub use inspect::{inspect, InspectArgs};
pub use pages::{pages, PagesCommand};
