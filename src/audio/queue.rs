use std::{collections::VecDeque, fmt};
use tracing::{debug, info};

use crate::error::{PlayerError, Result};

/// Cola FIFO de links pendientes de reproducir.
#[derive(Debug, Default)]
pub struct LinkQueue {
    items: VecDeque<String>,
}

impl LinkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega un link al final de la cola. Los links vacíos se rechazan.
    pub fn push(&mut self, link: String) -> Result<()> {
        let link = link.trim();
        if link.is_empty() {
            return Err(PlayerError::EmptyLink);
        }

        info!("➕ Agregado a la cola: {}", link);
        self.items.push_back(link.to_owned());
        Ok(())
    }

    /// Obtiene el siguiente link (FIFO - First In, First Out)
    pub fn pop(&mut self) -> Option<String> {
        let next = self.items.pop_front();
        match &next {
            Some(link) => debug!("➡️ Siguiente en la cola: {}", link),
            None => debug!("📭 La cola está vacía"),
        }
        next
    }

    /// Limpia la cola
    pub fn clear(&mut self) {
        let dropped = self.items.len();
        self.items.clear();
        info!("🗑️ Cola limpiada ({} links eliminados)", dropped);
    }

    /// Copia de la cola en orden de reproducción
    pub fn snapshot(&self) -> QueueListing {
        QueueListing(self.items.iter().cloned().collect())
    }

    /// Obtiene el tamaño de la cola
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Copia de solo lectura de una cola. Se muestra como los links separados
/// por espacios, o `Empty`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueListing(pub Vec<String>);

impl QueueListing {
    pub fn links(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for QueueListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Empty")
        } else {
            f.write_str(&self.0.join(" "))
        }
    }
}
