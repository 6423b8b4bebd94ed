//! # Eventos de Transferencia
//!
//! Este módulo define la superficie de observación del servidor: la UI (u
//! otro host) se entera del progreso de uploads y downloads sin acoplarse
//! al transporte HTTP.
//!
//! El contrato de orden es estricto **por archivo, por request**: un
//! `Started` (done=false) precede exactamente a un `Completed` (done=true),
//! y el terminal se emite siempre, incluso si el cliente se desconecta a
//! mitad de la transferencia. Entre requests concurrentes no se garantiza
//! ningún orden.
//!
//! Los callbacks son fire-and-forget: no retornan nada y no deben
//! bloquear el path de I/O (si la UI necesita trabajo pesado, salta a su
//! propio thread).

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

/// Tipo de transferencia
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Archivo entrando al storage root (POST multipart)
    Upload,

    /// Archivo saliendo hacia el cliente (GET)
    Download,
}

/// Fase de una transferencia
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    /// Antes del primer byte
    Started,

    /// Después del último byte (o del corte de conexión)
    Completed,

    /// Tick de porcentaje durante un upload; no abre ni cierra nada
    Progress,
}

/// Notificación de estado de una transferencia
///
/// Se emite, no se almacena: la retención es problema del observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    /// Path absoluto resuelto del archivo
    pub path: PathBuf,

    /// Upload o Download
    pub kind: TransferKind,

    /// Started o Completed
    pub phase: TransferPhase,

    /// Porcentaje entero de progreso; presente solo en fase `Progress`
    /// (uploads con Content-Length declarado)
    pub progress_percent: Option<u8>,
}

/// Superficie de callbacks que consume la capa externa
///
/// Los tres métodos tienen implementación vacía por defecto: un observer
/// implementa solo lo que le interesa.
pub trait StatusObserver: Send + Sync {
    /// Progreso de upload: se invoca solo cuando cambia el porcentaje entero
    fn upload_progress(&self, _percent: u8) {}

    /// Un archivo empezó (done=false) o terminó (done=true) de subirse
    fn upload_file(&self, _path: &Path, _done: bool) {}

    /// Un archivo empezó (done=false) o terminó (done=true) de bajarse
    fn download_file(&self, _path: &Path, _done: bool) {}
}

/// Observer que descarta todos los eventos
///
/// Es el default del servidor cuando nadie registró un observer.
pub struct NullObserver;

impl StatusObserver for NullObserver {}

/// Observer que loguea los eventos por stdout
///
/// Lo usa el binario para que las transferencias se vean en la consola.
pub struct LogObserver;

impl StatusObserver for LogObserver {
    fn upload_progress(&self, percent: u8) {
        println!("   ⬆️  Upload {}%", percent);
    }

    fn upload_file(&self, path: &Path, done: bool) {
        if done {
            println!("   ✅ Upload listo: {}", path.display());
        } else {
            println!("   ⬆️  Subiendo: {}", path.display());
        }
    }

    fn download_file(&self, path: &Path, done: bool) {
        if done {
            println!("   ✅ Download listo: {}", path.display());
        } else {
            println!("   ⬇️  Bajando: {}", path.display());
        }
    }
}

/// Adapter: convierte los callbacks en [`TransferEvent`] por un canal
///
/// Es la variante "canal de eventos etiquetados" del contrato: útil para
/// una UI con su propio loop, y para los tests, que revisan el orden de
/// eventos recibiéndolos del canal.
pub struct EventSender {
    sender: Sender<TransferEvent>,
}

impl EventSender {
    pub fn new(sender: Sender<TransferEvent>) -> Self {
        Self { sender }
    }

    fn emit(&self, event: TransferEvent) {
        // Si el receptor se fue, los eventos se descartan en silencio:
        // el observer nunca puede voltear una transferencia
        let _ = self.sender.send(event);
    }
}

impl StatusObserver for EventSender {
    fn upload_progress(&self, percent: u8) {
        // El progreso es global al request, no tiene path propio
        self.emit(TransferEvent {
            path: PathBuf::new(),
            kind: TransferKind::Upload,
            phase: TransferPhase::Progress,
            progress_percent: Some(percent),
        });
    }

    fn upload_file(&self, path: &Path, done: bool) {
        self.emit(TransferEvent {
            path: path.to_path_buf(),
            kind: TransferKind::Upload,
            phase: if done {
                TransferPhase::Completed
            } else {
                TransferPhase::Started
            },
            progress_percent: None,
        });
    }

    fn download_file(&self, path: &Path, done: bool) {
        self.emit(TransferEvent {
            path: path.to_path_buf(),
            kind: TransferKind::Download,
            phase: if done {
                TransferPhase::Completed
            } else {
                TransferPhase::Started
            },
            progress_percent: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_null_observer_does_nothing() {
        // Solo verifica que los defaults no explotan
        let observer = NullObserver;
        observer.upload_progress(50);
        observer.upload_file(Path::new("/tmp/x"), false);
        observer.download_file(Path::new("/tmp/x"), true);
    }

    #[test]
    fn test_event_sender_upload_pair() {
        let (tx, rx) = mpsc::channel();
        let observer = EventSender::new(tx);

        observer.upload_file(Path::new("/srv/nota.txt"), false);
        observer.upload_file(Path::new("/srv/nota.txt"), true);

        let started = rx.recv().unwrap();
        assert_eq!(started.kind, TransferKind::Upload);
        assert_eq!(started.phase, TransferPhase::Started);
        assert_eq!(started.path, PathBuf::from("/srv/nota.txt"));

        let completed = rx.recv().unwrap();
        assert_eq!(completed.phase, TransferPhase::Completed);
    }

    #[test]
    fn test_event_sender_download_event() {
        let (tx, rx) = mpsc::channel();
        let observer = EventSender::new(tx);

        observer.download_file(Path::new("/srv/a.bin"), false);
        let event = rx.recv().unwrap();
        assert_eq!(event.kind, TransferKind::Download);
        assert_eq!(event.phase, TransferPhase::Started);
    }

    #[test]
    fn test_event_sender_progress() {
        let (tx, rx) = mpsc::channel();
        let observer = EventSender::new(tx);

        observer.upload_progress(42);
        let event = rx.recv().unwrap();
        assert_eq!(event.progress_percent, Some(42));
        // Un tick de progreso nunca se confunde con el inicio de un archivo
        assert_eq!(event.phase, TransferPhase::Progress);
        assert_ne!(event.phase, TransferPhase::Started);
    }

    #[test]
    fn test_event_sender_with_dropped_receiver() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let observer = EventSender::new(tx);

        // No debe entrar en pánico aunque nadie escuche
        observer.upload_file(Path::new("/srv/x"), false);
        observer.upload_progress(10);
    }
}
