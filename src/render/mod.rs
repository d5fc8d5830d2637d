// HTML rendering: node tree plus the pages built from it

pub mod html;
mod page;

pub use page::{render_error_page, render_page, render_setup_page, PageView};
