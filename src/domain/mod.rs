pub mod category;
pub mod dates;
pub mod state;
pub mod task;

pub use category::Category;
pub use state::TaskState;
pub use task::{Location, Task, TaskId, TaskRecord};
