//! # Configuración del Servidor
//!
//! Este módulo define la configuración del servidor de archivos con
//! soporte completo para argumentos CLI y variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./file_server --port 8080 \
//!   --storage-root /srv/share \
//!   --max-connections 32
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 STORAGE_ROOT=/srv/share ./file_server
//! ```

use clap::Parser;

/// Configuración del servidor de transferencia de archivos
///
/// Inmutable después del arranque: se construye una vez y se mueve al
/// servidor.
#[derive(Debug, Clone, Parser)]
#[command(name = "file_server")]
#[command(about = "Servidor HTTP/1.0 embebido para compartir archivos en la red local")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto en el que escucha el servidor
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha (0.0.0.0 = todas las interfaces)
    #[arg(long, default_value = "0.0.0.0", env = "HTTP_HOST")]
    pub host: String,

    /// Directorio raíz que el servidor expone y donde guarda los uploads
    #[arg(long = "storage-root", default_value = "./storage", env = "STORAGE_ROOT")]
    pub storage_root: String,

    /// Máximo de requests procesados concurrentemente
    ///
    /// El accept nunca se bloquea: las conexiones por encima del límite
    /// esperan su turno en su propio thread.
    #[arg(long = "max-connections", default_value = "32", env = "MAX_CONNECTIONS")]
    pub max_connections: usize,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use file_server::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "0.0.0.0:8080");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("Max connections must be >= 1".to_string());
        }

        if self.storage_root.trim().is_empty() {
            return Err("Storage root must not be empty".to_string());
        }

        Ok(())
    }

    /// Imprime un resumen de la configuración
    pub fn print_summary(&self) {
        println!("╔══════════════════════════════════════════════════╗");
        println!("║        File Server HTTP/1.0 Configuration        ║");
        println!("╚══════════════════════════════════════════════════╝");
        println!();
        println!("🌐 Network:");
        println!("   Address:         {}", self.address());
        println!();
        println!("📂 Storage:");
        println!("   Root:            {}", self.storage_root);
        println!();
        println!("👷 Concurrency:");
        println!("   Max connections: {}", self.max_connections);
        println!();
        println!("════════════════════════════════════════════════════");
        println!();
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            storage_root: "./storage".to_string(),
            max_connections: 32,
        }
    }
}
