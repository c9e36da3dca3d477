pub mod footer;
pub mod header;
pub mod utils;

pub use footer::draw_footer;
pub use header::{draw_header, StatsDisplay};
pub use utils::{requisition_color, stock_color, truncate};
