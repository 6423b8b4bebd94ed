//! # Recepción de Uploads
//!
//! Este módulo consume las partes que produce el parser multipart y las
//! baja a disco bajo el storage root:
//!
//! - Parte con `filename=`: se copia en streaming a un archivo destino
//!   (chunks acotados, nunca el archivo entero en memoria), con evento
//!   `Started` antes del primer byte y `Completed` después del último.
//!   El terminal se emite aunque la copia falle a mitad de camino.
//! - Parte sin `filename=`: es un campo de formulario; su valor decodificado
//!   queda disponible en el resumen.
//!
//! ## Sanitización de filenames
//!
//! El filename lo declara el cliente, así que se valida antes de abrir
//! nada: vacío, separadores de path o `..` se rechazan. Sin esto, un
//! upload podría escribir fuera del storage root.
//!
//! Si ya existe un archivo con el mismo nombre se sobrescribe
//! (last-write-wins, comportamiento heredado de la herramienta original).
//! Una copia interrumpida deja el archivo parcial en disco.

use crate::multipart::{MultipartError, MultipartParser};
use crate::transfer::StatusObserver;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Errores de la recepción de uploads
#[derive(Debug)]
pub enum UploadError {
    /// Filename declarado inválido (vacío, con separadores o `..`)
    InvalidFilename(String),

    /// Body multipart malformado (headers rotos, sin boundary de cierre)
    Malformed(String),

    /// Error de I/O escribiendo a disco o leyendo el socket
    Io(io::Error),
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadError::InvalidFilename(name) => {
                write!(f, "Invalid upload filename: {}", name)
            }
            UploadError::Malformed(detail) => write!(f, "Malformed upload body: {}", detail),
            UploadError::Io(e) => write!(f, "Upload I/O error: {}", e),
        }
    }
}

impl std::error::Error for UploadError {}

impl From<MultipartError> for UploadError {
    fn from(err: MultipartError) -> Self {
        match err {
            MultipartError::Io(e) => UploadError::Io(e),
            other => UploadError::Malformed(other.to_string()),
        }
    }
}

/// Resultado de procesar un body multipart completo
#[derive(Debug, Default)]
pub struct UploadSummary {
    /// Paths absolutos de los archivos guardados, en orden de llegada
    pub saved_files: Vec<PathBuf>,

    /// Campos de formulario (nombre → valor decodificado)
    pub fields: HashMap<String, String>,
}

/// Baja partes multipart a disco y emite eventos de transferencia
pub struct UploadSink<'a> {
    /// Directorio destino (el storage root canonicalizado)
    root: &'a Path,

    /// Observer de eventos; nunca bloquea el path de I/O
    observer: &'a dyn StatusObserver,
}

impl<'a> UploadSink<'a> {
    pub fn new(root: &'a Path, observer: &'a dyn StatusObserver) -> Self {
        Self { root, observer }
    }

    /// Consume todas las partes del parser y las procesa en orden
    ///
    /// Se detiene en el primer error; los archivos ya guardados quedan.
    pub fn receive<R: Read>(
        &self,
        parser: &mut MultipartParser<R>,
    ) -> Result<UploadSummary, UploadError> {
        let mut summary = UploadSummary::default();

        while let Some(mut part) = parser.next_part()? {
            if part.is_file() {
                // part.is_file() garantiza que hay filename
                let filename = part.filename().unwrap_or_default().to_string();
                let destination = self.destination(&filename)?;

                self.observer.upload_file(&destination, false);
                let result = Self::copy_to_disk(&mut part, &destination);
                // Evento terminal siempre, incluso si la copia falló:
                // el observer nunca queda con una transferencia colgada
                self.observer.upload_file(&destination, true);

                match result {
                    Ok(_) => summary.saved_files.push(destination),
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                        // El body terminó sin boundary de cierre: el
                        // archivo parcial queda en disco (comportamiento
                        // heredado), pero el upload se reporta malformado
                        return Err(UploadError::Malformed(e.to_string()));
                    }
                    Err(e) => return Err(UploadError::Io(e)),
                }
            } else {
                let name = part.field_name().to_string();
                let value = part.value()?;
                summary.fields.insert(name, value);
            }
        }

        Ok(summary)
    }

    /// Copia el body de una parte al archivo destino, en streaming
    fn copy_to_disk<R: Read>(part: &mut R, destination: &Path) -> io::Result<u64> {
        let mut file = File::create(destination)?;
        let written = io::copy(part, &mut file)?;
        file.flush()?;
        Ok(written)
    }

    /// Valida el filename declarado y arma el path destino
    ///
    /// Mismo criterio que la validación de nombres del resto del server:
    /// nada de separadores ni `..`.
    fn destination(&self, filename: &str) -> Result<PathBuf, UploadError> {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains("..")
        {
            return Err(UploadError::InvalidFilename(filename.to_string()));
        }

        Ok(self.root.join(filename))
    }
}

/// Reader que cuenta bytes consumidos y reporta progreso de upload
///
/// Envuelve el body del request (ya limitado por Content-Length) y avisa
/// al observer **solo cuando cambia el porcentaje entero**, para no
/// inundarlo con un evento por chunk.
pub struct ProgressReader<'a, R: Read> {
    inner: R,
    observer: &'a dyn StatusObserver,
    consumed: u64,
    total: u64,
    last_percent: Option<u8>,
}

impl<'a, R: Read> ProgressReader<'a, R> {
    /// Crea el contador sobre un body de `total` bytes declarados
    ///
    /// `total` debe ser > 0 (sin Content-Length no hay progreso que
    /// calcular; en ese caso no se construye este wrapper).
    pub fn new(inner: R, total: u64, observer: &'a dyn StatusObserver) -> Self {
        Self {
            inner,
            observer,
            consumed: 0,
            total: total.max(1),
            last_percent: None,
        }
    }
}

impl<R: Read> Read for ProgressReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed += n as u64;

        let percent = ((self.consumed * 100) / self.total).min(100) as u8;
        if self.last_percent != Some(percent) {
            self.last_percent = Some(percent);
            self.observer.upload_progress(percent);
        }

        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::events::{EventSender, TransferKind, TransferPhase};
    use std::fs;
    use std::sync::mpsc;
    use tempfile::TempDir;

    /// Helper: body multipart con una parte de archivo
    fn file_body(boundary: &str, filename: &str, content: &str) -> Vec<u8> {
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"{f}\"\r\n\r\n{c}\r\n--{b}--\r\n",
            b = boundary,
            f = filename,
            c = content
        )
        .into_bytes()
    }

    #[test]
    fn test_receive_saves_file_with_events_in_order() {
        let dir = TempDir::new().unwrap();
        let (tx, rx) = mpsc::channel();
        let observer = EventSender::new(tx);

        let body = file_body("XYZ", "nota.txt", "hello");
        let mut parser = MultipartParser::new(&body[..], "XYZ");
        let sink = UploadSink::new(dir.path(), &observer);

        let summary = sink.receive(&mut parser).unwrap();

        // El archivo existe con el contenido exacto
        let expected = dir.path().join("nota.txt");
        assert_eq!(summary.saved_files, vec![expected.clone()]);
        assert_eq!(fs::read_to_string(&expected).unwrap(), "hello");

        // Started y después Completed, para el mismo path
        let started = rx.recv().unwrap();
        assert_eq!(started.kind, TransferKind::Upload);
        assert_eq!(started.phase, TransferPhase::Started);
        assert_eq!(started.path, expected);

        let completed = rx.recv().unwrap();
        assert_eq!(completed.phase, TransferPhase::Completed);
        assert_eq!(completed.path, expected);
    }

    #[test]
    fn test_receive_multiple_files() {
        let dir = TempDir::new().unwrap();
        let (tx, rx) = mpsc::channel();
        let observer = EventSender::new(tx);

        let body = "--B\r\nContent-Disposition: form-data; name=\"f1\"; filename=\"a.txt\"\r\n\r\nAAA\r\n\
                    --B\r\nContent-Disposition: form-data; name=\"f2\"; filename=\"b.txt\"\r\n\r\nBBB\r\n\
                    --B--\r\n";
        let mut parser = MultipartParser::new(body.as_bytes(), "B");
        let sink = UploadSink::new(dir.path(), &observer);

        let summary = sink.receive(&mut parser).unwrap();
        assert_eq!(summary.saved_files.len(), 2);
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "AAA");
        assert_eq!(fs::read_to_string(dir.path().join("b.txt")).unwrap(), "BBB");

        // N archivos → N pares Started/Completed en orden
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].phase, TransferPhase::Started);
        assert_eq!(events[1].phase, TransferPhase::Completed);
        assert_eq!(events[0].path, events[1].path);
        assert_eq!(events[2].phase, TransferPhase::Started);
        assert_eq!(events[3].phase, TransferPhase::Completed);
        assert_eq!(events[2].path, events[3].path);
    }

    #[test]
    fn test_receive_form_field() {
        let dir = TempDir::new().unwrap();
        let observer = crate::transfer::NullObserver;

        let body = "--B\r\nContent-Disposition: form-data; name=\"comentario\"\r\n\r\n\
                    un valor\r\n--B--\r\n";
        let mut parser = MultipartParser::new(body.as_bytes(), "B");
        let sink = UploadSink::new(dir.path(), &observer);

        let summary = sink.receive(&mut parser).unwrap();
        assert!(summary.saved_files.is_empty());
        assert_eq!(
            summary.fields.get("comentario"),
            Some(&"un valor".to_string())
        );
    }

    #[test]
    fn test_receive_rejects_traversal_filename() {
        let dir = TempDir::new().unwrap();
        let observer = crate::transfer::NullObserver;

        let body = file_body("B", "../evil.txt", "pwned");
        let mut parser = MultipartParser::new(&body[..], "B");
        let sink = UploadSink::new(dir.path(), &observer);

        let result = sink.receive(&mut parser);
        assert!(matches!(result, Err(UploadError::InvalidFilename(_))));

        // Nada se escribió, ni adentro ni afuera del root
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_receive_rejects_separator_filename() {
        let dir = TempDir::new().unwrap();
        let observer = crate::transfer::NullObserver;

        for bad in ["a/b.txt", "a\\b.txt", ""] {
            let body = file_body("B", bad, "x");
            let mut parser = MultipartParser::new(&body[..], "B");
            let sink = UploadSink::new(dir.path(), &observer);
            let result = sink.receive(&mut parser);
            assert!(
                matches!(result, Err(UploadError::InvalidFilename(_))),
                "filename {:?} debería rechazarse",
                bad
            );
        }
    }

    #[test]
    fn test_receive_overwrites_existing_file() {
        // Last-write-wins: heredado de la herramienta original
        let dir = TempDir::new().unwrap();
        let observer = crate::transfer::NullObserver;
        fs::write(dir.path().join("nota.txt"), "viejo contenido").unwrap();

        let body = file_body("B", "nota.txt", "nuevo");
        let mut parser = MultipartParser::new(&body[..], "B");
        let sink = UploadSink::new(dir.path(), &observer);
        sink.receive(&mut parser).unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("nota.txt")).unwrap(),
            "nuevo"
        );
    }

    #[test]
    fn test_receive_truncated_body_is_malformed_with_terminal_event() {
        let dir = TempDir::new().unwrap();
        let (tx, rx) = mpsc::channel();
        let observer = EventSender::new(tx);

        // Body sin boundary de cierre
        let body = b"--B\r\nContent-Disposition: form-data; name=\"file\"; \
                     filename=\"corte.txt\"\r\n\r\nparcial";
        let mut parser = MultipartParser::new(&body[..], "B");
        let sink = UploadSink::new(dir.path(), &observer);

        let result = sink.receive(&mut parser);
        assert!(matches!(result, Err(UploadError::Malformed(_))));

        // El observer recibió Started y también el terminal
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].phase, TransferPhase::Started);
        assert_eq!(events[1].phase, TransferPhase::Completed);
    }

    #[test]
    fn test_progress_reader_reports_on_change_only() {
        struct CountingObserver {
            reports: std::sync::Mutex<Vec<u8>>,
        }
        impl StatusObserver for CountingObserver {
            fn upload_progress(&self, percent: u8) {
                self.reports.lock().unwrap().push(percent);
            }
        }

        let observer = CountingObserver {
            reports: std::sync::Mutex::new(Vec::new()),
        };

        // 200 bytes leídos de a 1: el porcentaje solo cambia cada 2 bytes
        let data = vec![0u8; 200];
        let mut reader = ProgressReader::new(&data[..], 200, &observer);
        let mut byte = [0u8; 1];
        loop {
            if reader.read(&mut byte).unwrap() == 0 {
                break;
            }
        }

        let reports = observer.reports.lock().unwrap();
        // Sin repetidos consecutivos, y el último reporte es 100
        assert_eq!(*reports.last().unwrap(), 100);
        for pair in reports.windows(2) {
            assert_ne!(pair[0], pair[1], "porcentaje repetido: {:?}", reports);
        }
        assert!(reports.len() <= 101);
    }
}
