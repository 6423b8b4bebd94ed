//! # Módulo del Servidor HTTP
//!
//! Este módulo implementa el servidor TCP que:
//! 1. Escucha en un puerto
//! 2. Acepta conexiones entrantes
//! 3. Lee y parsea la cabecera del request
//! 4. Despacha al router, que escribe la respuesta (fija o streaming)
//!
//! Cada conexión se procesa en su propio thread, con el total de threads
//! acotado por `max_connections`.

pub mod tcp;

// Re-exportar para facilitar el uso
pub use tcp::{Server, ShutdownHandle};
