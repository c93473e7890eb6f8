//! OperationRegistry - operation_type -> WorkUnit の対応表
//!
//! 起動時に組み立てて `Arc` で共有する。実行中は読み取りのみ。

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{OperationHandler, TypedHandler, WorkUnit};
use super::operation::Operation;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("a work unit for operation type '{0}' is already registered")]
    AlreadyRegistered(String),
    #[error("operation type must not be blank")]
    BlankType,
}

/// Maps operation type names to the work units that execute them.
///
/// # 使用例
/// ```ignore
/// let mut registry = OperationRegistry::new();
/// registry.register::<Resize, _>(ResizeHandler)?;
/// let unit = registry.get("resize");
/// ```
#[derive(Default, Clone)]
pub struct OperationRegistry {
    units: HashMap<String, Arc<dyn WorkUnit>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed handler under `T::TYPE`.
    pub fn register<T: Operation, H: OperationHandler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        self.register_unit(T::TYPE, Arc::new(TypedHandler::new(handler)))
    }

    /// Register an untyped unit under an explicit name.
    pub fn register_unit(
        &mut self,
        operation_type: impl Into<String>,
        unit: Arc<dyn WorkUnit>,
    ) -> Result<(), RegistryError> {
        let operation_type = operation_type.into();
        if operation_type.trim().is_empty() {
            return Err(RegistryError::BlankType);
        }
        if self.units.contains_key(&operation_type) {
            return Err(RegistryError::AlreadyRegistered(operation_type));
        }
        self.units.insert(operation_type, unit);
        Ok(())
    }

    pub fn get(&self, operation_type: &str) -> Option<Arc<dyn WorkUnit>> {
        self.units.get(operation_type).cloned()
    }

    pub fn contains(&self, operation_type: &str) -> bool {
        self.units.contains_key(operation_type)
    }

    /// Registered names, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.units.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
