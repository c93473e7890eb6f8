use super::{OperationType, TaskId, TaskRecord};

/// What a work unit receives: the task's identity and its request data.
///
/// Built from a record snapshot at pickup; the unit never sees the record itself.
#[derive(Debug, Clone)]
pub struct TaskEnvelope {
    task_id: TaskId,
    operation_type: OperationType,
    data_source: String,
    parameters: serde_json::Value,
}

impl TaskEnvelope {
    pub fn new(
        task_id: TaskId,
        operation_type: OperationType,
        data_source: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            task_id,
            operation_type,
            data_source: data_source.into(),
            parameters,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn operation_type(&self) -> &OperationType {
        &self.operation_type
    }

    pub fn data_source(&self) -> &str {
        &self.data_source
    }

    pub fn parameters(&self) -> &serde_json::Value {
        &self.parameters
    }
}

impl From<&TaskRecord> for TaskEnvelope {
    fn from(record: &TaskRecord) -> Self {
        Self::new(
            record.id,
            record.operation_type.clone(),
            record.data_source.clone(),
            record.parameters.clone(),
        )
    }
}
