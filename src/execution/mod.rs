// Order submission and the session loop
pub mod order_manager;
pub mod session;

pub use order_manager::{build_close_request, build_request, OrderManager};
pub use session::{Clock, LocalClock, SessionController, SessionState};
