mod format;
mod view;

pub use beacon_config::ViewSettings;
pub use format::format_elapsed;
pub use view::{SessionStatusView, StatusSnapshot};
