pub mod browser;
pub mod js_executor;

pub use browser::{connect_to_browser_and_page, launch_headless_browser, open_scratch_page};
pub use js_executor::JsExecutor;
