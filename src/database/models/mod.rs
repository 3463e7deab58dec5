pub mod event;
pub mod note;
pub mod preferences;
pub mod task;
pub mod user;

pub use event::Event;
pub use note::Note;
pub use preferences::UserPreferences;
pub use task::{RecurrenceType, Task, TaskCategory, TaskPriority, TaskStatus};
pub use user::{Role, User, UserProfile};
