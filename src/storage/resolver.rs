//! # Resolución de Paths
//!
//! Este módulo convierte el path de un request HTTP en un path absoluto
//! del filesystem, confinado al directorio raíz configurado.
//!
//! La regla de seguridad es una sola: **ningún path resuelto puede quedar
//! fuera del storage root**. Un request que intente escapar (con `..` o
//! con un symlink) falla con `OutsideRoot` y no toca el disco.
//!
//! ## Compatibilidad con clientes legacy
//!
//! El cliente original navegaba con links que contenían el path absoluto
//! del dispositivo (ej: `GET /srv/share/docs` con root `/srv/share`). Por
//! eso, si el path del request empieza con el root, ese prefijo se
//! descarta antes de resolver. Un `GET /docs` equivale a
//! `GET /srv/share/docs`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Errores de resolución de paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// El path resuelto no existe en disco
    NotFound(String),

    /// El path intenta escapar del storage root (path traversal)
    OutsideRoot(String),
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::NotFound(p) => write!(f, "No such file or directory: {}", p),
            ResolveError::OutsideRoot(p) => {
                write!(f, "Path escapes the storage root: {}", p)
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Resuelve paths de requests contra el storage root
#[derive(Debug, Clone)]
pub struct PathResolver {
    /// Raíz canonicalizada; todo path resuelto debe colgar de aquí
    root: PathBuf,
}

impl PathResolver {
    /// Crea un resolver sobre el directorio raíz dado
    ///
    /// El root se canonicaliza una sola vez acá; debe existir.
    pub fn new(root: &Path) -> io::Result<Self> {
        Ok(Self {
            root: fs::canonicalize(root)?,
        })
    }

    /// Obtiene el storage root canonicalizado
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resuelve el path de un request a un path absoluto bajo el root
    ///
    /// Pasos:
    /// 1. Decodificar percent-encoding (`%20` → espacio)
    /// 2. Descartar el prefijo del root si viene en el path (estilo legacy)
    /// 3. Normalizar `.` y `..` lexicalmente; un `..` que subiría por
    ///    encima del root falla `OutsideRoot` **antes** de tocar el disco
    /// 4. Canonicalizar; si no existe, `NotFound`
    /// 5. Verificar que el resultado sigue bajo el root; si un symlink
    ///    escapó, `OutsideRoot`
    pub fn resolve(&self, request_path: &str) -> Result<PathBuf, ResolveError> {
        let decoded = Self::decode(request_path);

        // Estilo legacy: links absolutos que incluyen el root
        let root_str = self.root.to_string_lossy();
        let relative = decoded
            .strip_prefix(root_str.as_ref())
            .unwrap_or(&decoded);

        // Normalización lexical de segmentos
        let mut segments: Vec<&str> = Vec::new();
        for segment in relative.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    // Subir por encima del root es un intento de escape
                    if segments.pop().is_none() {
                        return Err(ResolveError::OutsideRoot(request_path.to_string()));
                    }
                }
                other => segments.push(other),
            }
        }

        let mut candidate = self.root.clone();
        for segment in &segments {
            candidate.push(segment);
        }

        // Canonicalizar resuelve symlinks y falla si el path no existe
        let resolved = fs::canonicalize(&candidate)
            .map_err(|_| ResolveError::NotFound(request_path.to_string()))?;

        if !resolved.starts_with(&self.root) {
            return Err(ResolveError::OutsideRoot(request_path.to_string()));
        }

        Ok(resolved)
    }

    /// Decodifica percent-encoding del path ("%20" → espacio)
    fn decode(path: &str) -> String {
        match urlencoding::decode(path) {
            Ok(decoded) => decoded.into_owned(),
            // Secuencias % inválidas: se usa el path tal cual
            Err(_) => path.to_string(),
        }
    }
}
