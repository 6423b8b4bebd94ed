//! # Módulo de Storage
//!
//! Este módulo contiene todo lo que toca el filesystem del lado de
//! lectura y navegación:
//!
//! - `resolver`: mapea paths de requests a paths absolutos confinados al
//!   storage root (la única frontera de seguridad del servidor)
//! - `listing`: lista directorios y genera la página HTML de navegación

pub mod listing;
pub mod resolver;

// Re-exportar para facilitar el uso
pub use listing::{list_directory, render};
pub use resolver::{PathResolver, ResolveError};
