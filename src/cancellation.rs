//! Реестр именованных токенов отмены: операцию можно отменить по ID
//! извне графа задач (обработчик Ctrl-C, другой фронтенд).

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

lazy_static! {
    static ref OPERATIONS: Mutex<HashMap<String, CancellationToken>> = Mutex::new(HashMap::new());
}

fn registry() -> MutexGuard<'static, HashMap<String, CancellationToken>> {
    // Отравленный мьютекс не мешает отмене
    OPERATIONS.lock().unwrap_or_else(|e| e.into_inner())
}

/// Зарегистрированная операция; токен удаляется из реестра вместе с ней
pub struct Operation {
    id: String,
    token: CancellationToken,
}

impl Operation {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for Operation {
    fn drop(&mut self) {
        remove_token(&self.id);
    }
}

/// Регистрирует `operation_id` на время жизни возвращённого хендла
pub fn register(operation_id: &str) -> Operation {
    Operation {
        id: operation_id.to_string(),
        token: create_token(operation_id),
    }
}

pub fn create_token(operation_id: &str) -> CancellationToken {
    let token = CancellationToken::new();
    registry().insert(operation_id.to_string(), token.clone());
    log::debug!("Registered operation {}", operation_id);
    token
}

/// Отменить операцию по ID. false, если такой операции нет
pub fn cancel(operation_id: &str) -> bool {
    match registry().get(operation_id) {
        Some(token) => {
            token.cancel();
            log::info!("Cancelled operation {}", operation_id);
            true
        }
        None => {
            log::warn!("Cannot cancel {}: no such operation", operation_id);
            false
        }
    }
}

/// Отменить все активные операции (Ctrl-C), возвращает их количество
pub fn cancel_all() -> usize {
    let operations = registry();
    for (id, token) in operations.iter().filter(|(_, t)| !t.is_cancelled()) {
        token.cancel();
        log::info!("Cancelled operation {}", id);
    }
    operations.len()
}

pub fn remove_token(operation_id: &str) {
    if registry().remove(operation_id).is_some() {
        log::debug!("Unregistered operation {}", operation_id);
    }
}

pub fn is_cancelled(operation_id: &str) -> bool {
    registry()
        .get(operation_id)
        .is_some_and(CancellationToken::is_cancelled)
}

/// ID зарегистрированных операций, которые ещё не отменены
pub fn list_active_operations() -> Vec<String> {
    registry()
        .iter()
        .filter(|(_, token)| !token.is_cancelled())
        .map(|(id, _)| id.clone())
        .collect()
}
