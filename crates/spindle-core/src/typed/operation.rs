//! Operation trait - operation_type と引数の型を対応付ける
//!
//! # 学習ポイント
//! - Associated Constants (`const TYPE`)
//! - `DeserializeOwned`: parameters（JSON）からの復元

use serde::de::DeserializeOwned;

/// Typed parameters of one operation type.
///
/// # 使用例
/// ```ignore
/// #[derive(Deserialize)]
/// struct Resize {
///     width: u32,
/// }
///
/// impl Operation for Resize {
///     const TYPE: &'static str = "resize";
/// }
/// ```
pub trait Operation: DeserializeOwned + Send + Sync + 'static {
    /// Name used in `operation_type` on submit.
    const TYPE: &'static str;
}
