//! # File Server
//!
//! Servidor HTTP/1.0 embebible que expone un subárbol del filesystem por
//! un único puerto:
//!
//! - `GET` sobre un directorio → listado HTML navegable
//! - `GET` sobre un archivo → descarga en streaming (octet-stream)
//! - `POST` multipart/form-data → cada parte con filename se guarda en el
//!   storage root
//!
//! Todo path resuelto queda confinado al storage root, y un host puede
//! observar las transferencias registrando un [`transfer::StatusObserver`].
//!
//! ## Arquitectura
//!
//! El servidor está dividido en módulos especializados:
//! - `http`: Parsing y manejo del protocolo HTTP/1.0
//! - `server`: Lógica del servidor TCP y manejo de conexiones
//! - `router`: Clasificación de requests (upload / navegación / default)
//! - `storage`: Resolución de paths confinada y listado de directorios
//! - `multipart`: Parser streaming de bodies multipart/form-data
//! - `transfer`: Uploads, downloads y eventos de estado
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use file_server::config::Config;
//! use file_server::server::Server;
//! use file_server::transfer::NullObserver;
//! use std::sync::Arc;
//!
//! let config = Config::default();
//! let mut server = Server::new(config, Arc::new(NullObserver))
//!     .expect("storage root inválido");
//! server.run().expect("Error al iniciar servidor");
//! ```

pub mod config;
pub mod http;
pub mod multipart;
pub mod router;
pub mod server;
pub mod storage;
pub mod transfer;
