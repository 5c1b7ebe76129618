/// Key layout and encoding utilities for Fjall partitions
///
/// Partition structure:
/// - `tasks`: task:{uuid} -> Task (JSON)
use uuid::Uuid;

pub const TASK_KEY_PREFIX: &str = "task:";

/// Encode a task key: task:{task_id}
pub fn encode_task_key(task_id: &Uuid) -> Vec<u8> {
    format!("{}{}", TASK_KEY_PREFIX, task_id).into_bytes()
}

/// Decode a task key: task:{task_id} -> task_id
pub fn decode_task_key(key: &[u8]) -> Option<Uuid> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str.strip_prefix(TASK_KEY_PREFIX)?.parse().ok()
}
