//! # Descarga de Archivos
//!
//! Este módulo sirve un archivo como body de la respuesta, en streaming:
//! la cabecera sale primero con el `Content-Length` exacto y el archivo se
//! copia al socket en chunks, sin cargarlo en memoria.
//!
//! El observer recibe `Started` antes del primer byte y `Completed`
//! después del último intento de escritura — **también si el cliente se
//! desconectó a mitad de la descarga**. Un corte es un evento terminal,
//! nunca una transferencia colgada desde el punto de vista del observer.
//!
//! Abrir el archivo puede fallar (permisos, carrera con un delete); por
//! eso `open` está separado de `send`: si `open` falla, el router todavía
//! puede responder con su error de texto.

use crate::http::{Response, StatusCode};
use crate::transfer::StatusObserver;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Streamer de un archivo hacia la conexión
pub struct DownloadStreamer {
    path: PathBuf,
    file: File,
    length: u64,
}

impl DownloadStreamer {
    /// Abre el archivo y captura su tamaño
    ///
    /// Falla sin haber escrito nada en la conexión.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let length = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            length,
        })
    }

    /// Tamaño del archivo (lo que va a declarar Content-Length)
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Escribe la respuesta completa (cabecera + body) en la conexión
    ///
    /// Consume el streamer: la secuencia cabecera → body se escribe una
    /// sola vez.
    pub fn send<W: Write>(
        mut self,
        out: &mut W,
        observer: &dyn StatusObserver,
    ) -> io::Result<()> {
        let basename = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let head = Response::new(StatusCode::Ok)
            .with_header("Content-Type", "application/octet-stream")
            .with_header("Content-Length", &self.length.to_string())
            .with_header(
                "Content-Disposition",
                &format!("attachment; filename={}", basename),
            )
            .with_header("Server", "FileBridge-HTTP/1.0")
            .with_header("Connection", "close")
            .head_bytes();

        // Started antes del primer byte
        observer.download_file(&self.path, false);

        let result = out
            .write_all(&head)
            .and_then(|_| io::copy(&mut self.file, out))
            .and_then(|_| out.flush());

        // Terminal siempre, incluso si el cliente cortó a mitad de camino
        observer.download_file(&self.path, true);

        result.map(|_| ())
    }
}
