//! Domain model (IDs, status, records, failures).

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod operation_type;
pub mod record;
pub mod state;

pub use self::envelope::TaskEnvelope;
pub use self::errors::{FailureKind, TaskFailure};
pub use self::ids::{ParseTaskIdError, TaskId};
pub use self::operation_type::OperationType;
pub use self::record::{NewTask, TaskRecord};
pub use self::state::{StatusCounts, TaskStatus};
